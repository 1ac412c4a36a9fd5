//! `souschef serve`: start the HTTP gateway.

use souschef_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🍳 SousChef Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Index: {}  Store: {}", config.index.backend, config.store.backend);
    println!("   Tenants with tokens: {}", config.gateway.tokens.len());

    souschef_gateway::start(config).await?;

    Ok(())
}
