use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::info;

use intraday_data::{model::MarketTick, sector::StaticSectorMap};
use intraday_engine::{
    config::{AlertConfig, LifecycleConfig},
    event::ChannelEventSink,
    gateway::simulated::{Config as SimConfig, SimulatedGateway},
    position::ExitReason,
    processor::AlertProcessor,
    scheduler::DailyLifecycleScheduler,
    store::in_memory::InMemoryStateStore,
};

/*----- */
// Main
/*----- */
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init
    init_logging();

    // Universe: symbol -> sector
    let lookup = Arc::new(StaticSectorMap::from_iter([
        ("RELIANCE", "ENERGY"),
        ("ONGC", "ENERGY"),
        ("HDFCBANK", "BANK"),
        ("ICICIBANK", "BANK"),
        ("ITC", "FMCG"),
        ("HINDUNILVR", "FMCG"),
        ("TCS", "IT"),
        ("INFY", "IT"),
    ]));

    // Seams: simulated broker, in-memory log, channel sink
    let gateway = Arc::new(SimulatedGateway::new(SimConfig {
        slippage_pct: 0.0005,
        latency_ms: 0,
    }));
    let store = Arc::new(InMemoryStateStore::new());
    let (sink, mut events) = ChannelEventSink::new();
    let sink = Arc::new(sink);

    let processor = Arc::new(
        AlertProcessor::builder()
            .gateway(gateway)
            .store(Arc::clone(&store))
            .sink(sink)
            .sector_lookup(lookup)
            .build()?,
    );

    // Event logger
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(event = ?event, "engine event");
        }
    });

    // Daily lifecycle
    let scheduler = DailyLifecycleScheduler::new(LifecycleConfig::default(), Utc::now());
    tokio::spawn(scheduler.run(Arc::clone(&processor)));

    // Random-walk tick feed over the demo universe
    let symbols = [
        ("RELIANCE", 2900.0),
        ("ONGC", 270.0),
        ("HDFCBANK", 1650.0),
        ("ICICIBANK", 1150.0),
        ("ITC", 440.0),
        ("HINDUNILVR", 2500.0),
        ("TCS", 3900.0),
        ("INFY", 1600.0),
    ];
    let feed_processor = Arc::clone(&processor);
    tokio::spawn(async move {
        let mut prices: Vec<(&str, f64, f64)> =
            symbols.iter().map(|(s, p)| (*s, *p, *p)).collect();
        loop {
            for (symbol, price, close) in prices.iter_mut() {
                let step = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(-0.002..0.002)
                };
                *price *= 1.0 + step;
                feed_processor
                    .on_tick(&MarketTick::new(*symbol, *price, *close))
                    .await;
            }
            sleep(Duration::from_millis(200)).await;
        }
    });

    // Let the ranking warm up, then fire a demo alert batch
    sleep(Duration::from_secs(2)).await;

    let mut cfg = AlertConfig::new("demo-momentum");
    cfg.sector_filter_on = true;
    cfg.top_n_sector = 2;

    let summary = processor
        .handle_batch(
            "demo-momentum",
            &[
                "RELIANCE".to_owned(),
                "ITC".to_owned(),
                "TCS".to_owned(),
                "UNLISTED".to_owned(),
            ],
            &cfg,
        )
        .await;
    info!(?summary, "demo alert batch done");

    // Keep monitoring until interrupted
    tokio::signal::ctrl_c().await?;
    let summary = processor.square_off_all(ExitReason::Manual).await;
    info!(?summary, "shutdown square-off done");
    Ok(())
}

/*----- */
// Logging config
/*----- */
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        // Enable Json formatting
        .json()
        // Install this Tracing subscriber as global default
        .init()
}
