use perpdesk::{api, config::Config, BinancePriceFeed, PriceFeed, SandboxChain, TradingSession, WalletProvider};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let port = config.port;

    let provider: Arc<dyn WalletProvider> = Arc::new(SandboxChain::new(config.sandbox_accounts));
    let feed: Arc<dyn PriceFeed> = Arc::new(BinancePriceFeed::new(config.price_feed_url.clone()));

    let session = Arc::new(TradingSession::new(config, provider, feed));
    if let Err(e) = session.start().await {
        tracing::warn!(error = %e, "Wallet connection failed; continuing without an account");
    }

    let app = api::create_router(api::AppState::new(session.clone()));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    session.stop();
    Ok(())
}
