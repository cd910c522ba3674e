use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use intraday_data::{
    model::{Direction, MarketTick},
    sector::StaticSectorMap,
};
use intraday_engine::{
    config::{AlertConfig, Product},
    error::EngineError,
    event::{ChannelEventSink, EngineEvent},
    gateway::simulated::{Config as SimConfig, SimulatedGateway},
    position::{manager::ExitOutcome, ExitReason, PositionStatus},
    processor::{AlertOutcome, AlertProcessor, AlertSignal, RejectCause, SkipCause},
    store::in_memory::InMemoryStateStore,
};

/*----- */
// Harness
/*----- */
struct Harness {
    processor: AlertProcessor<SimulatedGateway, InMemoryStateStore, ChannelEventSink>,
    gateway: Arc<SimulatedGateway>,
    store: Arc<InMemoryStateStore>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Harness {
    fn new(latency_ms: u64) -> Self {
        let gateway = Arc::new(SimulatedGateway::new(SimConfig {
            slippage_pct: 0.0,
            latency_ms,
        }));
        let store = Arc::new(InMemoryStateStore::new());
        let (sink, events) = ChannelEventSink::new();

        let lookup = Arc::new(StaticSectorMap::from_iter([
            ("AAA", "A"),
            ("BBB", "B"),
            ("CCC", "C"),
        ]));

        let processor = AlertProcessor::builder()
            .gateway(Arc::clone(&gateway))
            .store(Arc::clone(&store))
            .sink(Arc::new(sink))
            .sector_lookup(lookup)
            .build()
            .unwrap();

        Self {
            processor,
            gateway,
            store,
            events,
        }
    }

    async fn tick(&self, symbol: &str, ltp: f64, prev_close: f64) {
        self.processor
            .on_tick(&MarketTick::new(symbol, ltp, prev_close))
            .await;
    }

    /// Seed sectors A(+2%), B(+1%), C(-1%), one stock each.
    async fn seed_ranking(&self) {
        self.tick("AAA", 102.0, 100.0).await;
        self.tick("BBB", 101.0, 100.0).await;
        self.tick("CCC", 99.0, 100.0).await;
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    async fn status_of(&self, symbol: &str) -> Option<PositionStatus> {
        self.processor
            .manager()
            .book()
            .live_positions()
            .await
            .into_iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.status)
    }
}

fn cfg(name: &str) -> AlertConfig {
    AlertConfig::new(name)
}

/*----- */
// Entry flow
/*----- */
#[tokio::test]
async fn test_entry_flow_records_open_position() {
    let mut harness = Harness::new(0);
    harness.seed_ranking().await;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    let outcome = harness.processor.handle(&alert, &cfg("scan")).await;

    let AlertOutcome::Entered { quantity, entry_price, .. } = outcome else {
        panic!("expected entry, got {outcome:?}");
    };
    assert_eq!(entry_price, 102.0);
    // CAPITAL mode: 20000 / 102 = 196
    assert_eq!(quantity, 196);
    assert_eq!(
        harness.status_of("AAA").await,
        Some(PositionStatus::Open)
    );

    let events = harness.drain_events();
    assert!(matches!(events.as_slice(), [EngineEvent::PositionOpened { symbol, .. }] if symbol == "AAA"));

    let records = harness.store.alerts();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, "ENTERED");
}

#[tokio::test]
async fn test_concurrent_entries_enter_exactly_once() {
    let harness = Harness::new(20);
    harness.seed_ranking().await;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    let config = cfg("scan");
    let (first, second) = tokio::join!(
        harness.processor.handle(&alert, &config),
        harness.processor.handle(&alert, &config),
    );

    let entered = [&first, &second]
        .iter()
        .filter(|o| matches!(o, AlertOutcome::Entered { .. }))
        .count();
    let duplicates = [&first, &second]
        .iter()
        .filter(|o| matches!(o, AlertOutcome::Rejected(RejectCause::DuplicatePosition)))
        .count();

    assert_eq!(entered, 1);
    assert_eq!(duplicates, 1);
    assert_eq!(harness.gateway.entries_placed(), 1);
}

#[tokio::test]
async fn test_entry_rejected_by_gateway_frees_the_symbol() {
    let mut harness = Harness::new(0);
    harness.seed_ranking().await;
    harness.gateway.fail_symbol("AAA");

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    let outcome = harness.processor.handle(&alert, &cfg("scan")).await;
    assert!(matches!(outcome, AlertOutcome::Errored(_)));
    assert_eq!(harness.status_of("AAA").await, None);

    let events = harness.drain_events();
    assert!(matches!(events.as_slice(), [EngineEvent::OrderFailed { stage, .. }] if stage == "entry"));

    // A fresh alert can claim the symbol again
    harness.gateway.clear_failures();
    let outcome = harness.processor.handle(&alert, &cfg("scan")).await;
    assert!(matches!(outcome, AlertOutcome::Entered { .. }));
}

#[tokio::test]
async fn test_entry_confirmation_after_record_wiped_is_discarded() {
    let mut harness = Harness::new(50);
    harness.seed_ranking().await;

    // While the entry confirmation is in flight, the record vanishes from
    // its slot (the daily reset dropping the index is the realistic path).
    // The confirmation must be discarded, not revived into a position.
    let manager = harness.processor.manager();
    let config = cfg("scan");
    let entry = manager.try_enter("AAA", &config, Direction::Long, Some("A".to_owned()), 102.0);
    let wipe = async {
        sleep(Duration::from_millis(10)).await;
        let slot = manager.book().slot("AAA");
        slot.lock().await.position = None;
    };
    let (result, ()) = tokio::join!(entry, wipe);

    assert!(matches!(result, Err(EngineError::StaleConfirmation(_))));
    assert!(manager.book().live_positions().await.is_empty());

    let events = harness.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::PositionOpened { .. })));
}

/*----- */
// Sector filter gate
/*----- */
#[tokio::test]
async fn test_sector_filter_top_n_gate() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;

    let mut config = cfg("scan");
    config.sector_filter_on = true;
    config.top_n_sector = 1;

    // A's stock passes the top-1 gate
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &config)
        .await;
    assert!(matches!(outcome, AlertOutcome::Entered { .. }));

    // B's stock misses rank
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("BBB", Direction::Long, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::SectorRankMiss));

    // Unmapped symbols never pass an engaged filter
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("ZZZ", Direction::Long, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::UnmappedSector));

    // C's stock is the worst performer: short side passes
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("CCC", Direction::Short, "scan"), &config)
        .await;
    assert!(matches!(outcome, AlertOutcome::Entered { .. }));
}

#[tokio::test]
async fn test_filter_with_no_ticks_reports_no_data() {
    let harness = Harness::new(0);

    let mut config = cfg("scan");
    config.sector_filter_on = true;

    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::NoRankingData));
}

/*----- */
// Processor gates
/*----- */
#[tokio::test]
async fn test_kill_switch_and_disabled_config() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;

    harness.processor.set_kill_switch(true);
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &cfg("scan"))
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::KillSwitch));

    harness.processor.set_kill_switch(false);
    let mut disabled = cfg("scan");
    disabled.enabled = false;
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &disabled)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::ConfigDisabled));
}

#[tokio::test]
async fn test_daily_trade_limit_counts_entries_only() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;

    let mut config = cfg("scan");
    config.trade_limit_per_day = 1;
    config.sector_filter_on = true;
    config.top_n_sector = 1;

    // A rank-missed alert burns no quota
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("BBB", Direction::Long, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::SectorRankMiss));

    // The single unit is still available for the passing symbol
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &config)
        .await;
    assert!(matches!(outcome, AlertOutcome::Entered { .. }));

    // Only the confirmed entry consumed it
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("CCC", Direction::Short, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::TradeLimit));
}

#[tokio::test]
async fn test_rejected_entry_does_not_burn_quota() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;
    harness.gateway.fail_symbol("AAA");

    let mut config = cfg("scan");
    config.trade_limit_per_day = 1;

    // A broker-rejected entry leaves the quota untouched
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &config)
        .await;
    assert!(matches!(outcome, AlertOutcome::Errored(_)));

    let outcome = harness
        .processor
        .handle(&AlertSignal::new("BBB", Direction::Long, "scan"), &config)
        .await;
    assert!(matches!(outcome, AlertOutcome::Entered { .. }));
}

#[tokio::test]
async fn test_cnc_short_rejected_and_no_quote_skip() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;

    let mut config = cfg("scan");
    config.product = Product::Cnc;
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Short, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Rejected(RejectCause::CncShortNotAllowed));

    // No tick seen for this mapped symbol yet
    let fresh = Harness::new(0);
    let outcome = fresh
        .processor
        .handle(&AlertSignal::new("AAA", Direction::Long, "scan"), &cfg("scan"))
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::NoQuoteYet));
}

/*----- */
// Tick-driven exits
/*----- */
#[tokio::test]
async fn test_trailing_stop_exit_end_to_end() {
    let mut harness = Harness::new(0);
    harness.seed_ranking().await;
    harness.tick("AAA", 100.0, 100.0).await;

    // Wide fixed levels so only the trailing stop can fire
    let mut config = cfg("scan");
    config.target_pct = 50.0;
    config.stop_loss_pct = 40.0;
    config.trailing_sl_pct = 2.0;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    let outcome = harness.processor.handle(&alert, &config).await;
    assert!(matches!(outcome, AlertOutcome::Entered { entry_price, .. } if entry_price == 100.0));

    // Ratchet the extreme to 103; trigger becomes 100.94
    for ltp in [101.0, 103.0, 102.0] {
        harness.tick("AAA", ltp, 100.0).await;
        assert_eq!(harness.status_of("AAA").await, Some(PositionStatus::Open));
    }

    harness.tick("AAA", 100.5, 100.0).await;
    assert_eq!(harness.status_of("AAA").await, None);

    let closed = harness.store.closed_positions();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_reason, Some(ExitReason::TrailingStop));
    assert_eq!(closed[0].status, PositionStatus::Closed);
    // Long 196 shares closed at 100.5 after entering at 100
    assert_eq!(closed[0].realised_pnl, Some(0.5 * 200.0));

    let events = harness.drain_events();
    let closes: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::PositionClosed { .. }))
        .collect();
    assert_eq!(closes.len(), 1);
    assert!(
        matches!(closes[0], EngineEvent::PositionClosed { reason, .. } if *reason == ExitReason::TrailingStop)
    );
}

#[tokio::test]
async fn test_target_exit_takes_precedence() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;
    harness.tick("AAA", 100.0, 100.0).await;

    let mut config = cfg("scan");
    config.target_pct = 1.0;
    config.stop_loss_pct = 0.7;
    config.trailing_sl_pct = 0.5;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    harness.processor.handle(&alert, &config).await;

    harness.tick("AAA", 101.2, 100.0).await;

    let closed = harness.store.closed_positions();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_reason, Some(ExitReason::Target));
}

#[tokio::test]
async fn test_cnc_position_not_monitored() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;
    harness.tick("AAA", 100.0, 100.0).await;

    let mut config = cfg("scan");
    config.product = Product::Cnc;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    harness.processor.handle(&alert, &config).await;

    // A crash through every MIS level leaves a CNC position open
    harness.tick("AAA", 50.0, 100.0).await;
    assert_eq!(harness.status_of("AAA").await, Some(PositionStatus::Open));
}

/*----- */
// Exit idempotence
/*----- */
#[tokio::test]
async fn test_concurrent_exits_submit_one_order() {
    let mut harness = Harness::new(20);
    harness.seed_ranking().await;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    harness.processor.handle(&alert, &cfg("scan")).await;
    harness.drain_events();

    let manager = harness.processor.manager();
    let (first, second) = tokio::join!(
        manager.request_exit("AAA", ExitReason::TrailingStop),
        manager.request_exit("AAA", ExitReason::Manual),
    );

    let outcomes = [first.unwrap(), second.unwrap()];
    assert!(outcomes.contains(&ExitOutcome::AlreadyInFlight));
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, ExitOutcome::Closed { .. })));
    assert_eq!(harness.gateway.exits_placed(), 1);

    let closes = harness
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::PositionClosed { .. }))
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_exit_after_close_is_a_noop() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    harness.processor.handle(&alert, &cfg("scan")).await;
    harness.processor.manual_square_off("AAA").await.unwrap();
    assert_eq!(harness.gateway.exits_placed(), 1);

    // Record is gone; a second manual square-off neither errors nor
    // submits another order
    harness.processor.manual_square_off("AAA").await.unwrap();
    assert_eq!(harness.gateway.exits_placed(), 1);
    assert_eq!(harness.store.closed_positions().len(), 1);
}

/*----- */
// Bulk square-off
/*----- */
#[tokio::test]
async fn test_square_off_all_is_best_effort() {
    let mut harness = Harness::new(0);
    harness.seed_ranking().await;

    for symbol in ["AAA", "BBB", "CCC"] {
        let alert = AlertSignal::new(symbol, Direction::Long, "scan");
        let outcome = harness.processor.handle(&alert, &cfg("scan")).await;
        assert!(matches!(outcome, AlertOutcome::Entered { .. }));
    }
    harness.drain_events();

    harness.gateway.fail_symbol("BBB");
    let summary = harness
        .processor
        .square_off_all(ExitReason::AutoSquareOff)
        .await;

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.closed, 2);
    assert_eq!(summary.errored, 1);

    // The failed symbol stays visible in ERROR for manual intervention
    assert_eq!(harness.status_of("BBB").await, Some(PositionStatus::Error));
    assert_eq!(harness.store.closed_positions().len(), 2);

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::SquareOffSummary { attempted: 3, closed: 2, errored: 1, .. }
    )));

    // Operator retry after the broker recovers closes the stragglers
    harness.gateway.clear_failures();
    let outcome = harness
        .processor
        .manager()
        .request_exit("BBB", ExitReason::Manual)
        .await
        .unwrap();
    assert!(matches!(outcome, ExitOutcome::Closed { .. }));
    assert_eq!(harness.status_of("BBB").await, None);
}

/*----- */
// Session reset
/*----- */
#[tokio::test]
async fn test_reset_session_guards_open_positions() {
    let harness = Harness::new(0);
    harness.seed_ranking().await;

    let alert = AlertSignal::new("AAA", Direction::Long, "scan");
    harness.processor.handle(&alert, &cfg("scan")).await;

    // Open position: index survives the reset, session state clears anyway
    harness.processor.set_kill_switch(true);
    harness.processor.reset_session().await;
    assert_eq!(harness.status_of("AAA").await, Some(PositionStatus::Open));
    assert!(!harness.processor.kill_switch());

    // After squaring off, reset clears the index too
    harness
        .processor
        .square_off_all(ExitReason::AutoSquareOff)
        .await;
    harness.processor.reset_session().await;
    assert!(harness.processor.manager().book().is_empty());

    // Sector state was cleared: an engaged filter sees no data again
    let mut config = cfg("scan");
    config.sector_filter_on = true;
    let outcome = harness
        .processor
        .handle(&AlertSignal::new("BBB", Direction::Long, "scan"), &config)
        .await;
    assert_eq!(outcome, AlertOutcome::Skipped(SkipCause::NoRankingData));
}
