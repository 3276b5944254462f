//! `dirflow serve` — Start the HTTP API server.

use dirflow_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Dirflow Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Default provider: {}", config.default_provider);
    println!("   Sandbox root: {}", config.security.sandbox_root);

    dirflow_gateway::start(config).await?;

    Ok(())
}
