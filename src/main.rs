use std::sync::Arc;
use strikeboard::config::Config;
use strikeboard::services::{
    BroadcastNotifier, CompositeNotifier, FillPricer, HttpQuoteProvider, Notifier, QuoteProvider,
    SqliteStore, StaticQuoteProvider, TradeEvent, TradingService, WebhookNotifier,
};
use strikeboard::{api, AppState};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strikeboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Strikeboard server on {}:{}", config.host, config.port);

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    info!("Using database at {}", config.database_path);

    // Quote source for fill verification
    let quotes: Arc<dyn QuoteProvider> = match config.quote_api_url {
        Some(ref url) => {
            info!("Verifying fills against {}", url);
            Arc::new(HttpQuoteProvider::new(url.clone(), config.quote_api_key.clone()))
        }
        None => {
            warn!("QUOTE_API_URL not set; new trades will be rejected and settlements will fail");
            Arc::new(StaticQuoteProvider::new())
        }
    };
    let pricer = FillPricer::new(config.pricing_policy, quotes);

    // Trade event fan-out
    let broadcaster = Arc::new(BroadcastNotifier::default());
    let mut notifier = CompositeNotifier::new().with(broadcaster.clone());
    if let Some(ref url) = config.notify_webhook_url {
        info!("Delivering trade events to webhook {}", url);
        notifier = notifier.with(Arc::new(WebhookNotifier::new(url.clone())));
    }

    let mut events = broadcaster.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TradeEvent::Created { trade }) => debug!("Event: created {}", trade.id),
                Ok(TradeEvent::Settled { trade, fill }) => {
                    debug!("Event: settled {} x{} on {}", fill.id, fill.contracts, trade.id)
                }
                Ok(TradeEvent::Deleted { trade_id, .. }) => debug!("Event: deleted {}", trade_id),
                Err(RecvError::Lagged(n)) => warn!("Event log lagged by {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    let trading_service = Arc::new(TradingService::new(store, pricer, notifier, &config));

    let state = AppState {
        config: config.clone(),
        trading_service,
    };

    // Build router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Strikeboard server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
