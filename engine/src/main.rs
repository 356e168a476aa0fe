use common::logger::init_tracing;
use engine::{EngineConfig, EngineFacade};
use market::feed::{Feed, HttpPoller, WsFeed};
use market::wire::TransportMessage;
use settings::open_store;
use tokio::sync::mpsc;

/// Runs `feed` on its own task and wires its output into the engine.
fn start_feed<F: Feed + 'static>(engine: &EngineFacade, feed: F, name: &'static str, capacity: usize) {
    let (tx, rx) = mpsc::channel::<TransportMessage>(capacity);

    tokio::spawn(async move {
        if let Err(e) = feed.run(tx).await {
            tracing::error!(error = %e, feed = name, "feed stopped");
        }
    });

    engine.connect_feed(rx);
    tracing::info!(feed = name, "feed attached");
}

/// Logs every change of the presented event.
fn start_view_logger(engine: &EngineFacade) {
    let mut rx = engine.subscribe();

    tokio::spawn(async move {
        let mut last = None;
        while rx.changed().await.is_ok() {
            let view = rx.borrow_and_update().clone();
            let id = view.current.as_ref().map(|e| e.id);
            if id == last {
                continue;
            }
            last = id;

            match &view.current {
                Some(event) => tracing::info!(
                    event_id = %event.id,
                    kind = %event.event_type(),
                    ticker = event.subject_ticker().unwrap_or("-"),
                    pending = view.pending,
                    "now presenting"
                ),
                None => tracing::info!("idle"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing("celebration-engine", is_production);

    tracing::info!("Starting celebration engine...");

    let cfg = EngineConfig::from_env();
    let store = open_store(
        cfg.settings_database_url.as_deref(),
        cfg.settings_path.clone(),
        cfg.settings_key.clone(),
    )
    .await;
    let engine = EngineFacade::start(cfg.clone(), store).await;

    start_view_logger(&engine);

    if let Some(url) = &cfg.feed_ws_url {
        start_feed(&engine, WsFeed::new(url.clone()), "ws", cfg.command_queue_capacity);
    }
    if let Some(base) = &cfg.feed_http_url {
        let poller = HttpPoller::new(base.clone(), cfg.feed_poll_interval)?;
        start_feed(&engine, poller, "http", cfg.command_queue_capacity);
    }
    if cfg.feed_ws_url.is_none() && cfg.feed_http_url.is_none() {
        tracing::warn!("no feed configured; set FEED_WS_URL or FEED_HTTP_URL");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    engine.shutdown().await?;
    Ok(())
}
