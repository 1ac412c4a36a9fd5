//! `souschef init`: write a default config file.

use souschef_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🍳 SousChef Setup");
    println!("=================\n");

    if !config_dir.exists() {
        tokio::fs::create_dir_all(&config_dir).await?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.\n");
        return Ok(());
    }

    tokio::fs::write(&config_path, AppConfig::default_toml()).await?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set OPENAI_API_KEY (or provider.api_key in the config)");
    println!("   2. Optionally set PINECONE_HOST and PINECONE_API_KEY for a hosted index");
    println!("   3. Add bearer tokens under [gateway.tokens] and run `souschef serve`\n");

    Ok(())
}
