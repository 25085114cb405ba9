use anyhow::Context;
use fxledger::{api, config::Config, db::init_db, DeskSettings, QuoteSource, Repository};
use fxledger::{LedgerStore, TradingDesk, YahooQuoteSource};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_path))?;

    let store: Arc<dyn LedgerStore> = Arc::new(Repository::new(pool));
    let quotes: Arc<dyn QuoteSource> =
        Arc::new(YahooQuoteSource::new(config.quote_api_url.clone()));
    let desk = TradingDesk::new(store, quotes, DeskSettings::from(&config));

    let app = api::create_router(api::AppState::new(desk));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!(
        %addr,
        instrument = %config.default_instrument,
        leverage = %config.margin.leverage(),
        "Server listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
