// ABOUTME: HTTP API server entry point for promptforge
use anyhow::Result;
use promptforge_api_server::config::ApiServerConfig;
use promptforge_api_server::server::ApiServer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("starting promptforge API server");

    let config = ApiServerConfig::from_env();
    let server = ApiServer::new(config).await?;

    if let Err(e) = server.run().await {
        error!(error = ?e, "server error");
        std::process::exit(1);
    }

    Ok(())
}
