use tracing_subscriber::EnvFilter;
use tradehand::{ServerConfig, TradehandError, TradehandServer};

#[tokio::main]
async fn main() -> Result<(), TradehandError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    let server = TradehandServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
