use anyhow::Context;
use tracing_subscriber::EnvFilter;

use money_manager_server::{config::Config, database, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let db = database::init_db(&config.data_path)
        .await
        .context("Failed to initialize database")?;
    let key = server::session_key(&config.session_secret)?;

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    server::run(db, key, listener).await?;
    Ok(())
}
