pub mod chat;
pub mod import;
pub mod init;
pub mod serve;
