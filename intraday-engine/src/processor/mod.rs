use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use intraday_data::{
    model::{Direction, MarketTick, SymbolQuote},
    sector::{
        filter::{FilterReject, FilterVerdict, SectorFilter},
        normalise_symbol,
        ranker::SectorRanker,
        tracker::SectorPerformanceTracker,
        SymbolSectorLookup,
    },
};

use crate::{
    config::{AlertConfig, Product},
    error::EngineError,
    event::{EngineEvent, EventSink},
    gateway::OrderGateway,
    position::{
        manager::{PositionManager, SquareOffSummary},
        ExitReason,
    },
    store::{AlertRecord, StateStore},
};

/*----- */
// Alert signal
/*----- */
/// Normalized inbound alert for a single symbol. Webhook parsing and
/// payload normalization happen upstream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertSignal {
    pub symbol: String,
    pub direction: Direction,
    pub alert_name: String,
    pub time: DateTime<Utc>,
}

impl AlertSignal {
    pub fn new<S>(symbol: S, direction: Direction, alert_name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            direction,
            alert_name: alert_name.into(),
            time: Utc::now(),
        }
    }
}

/*----- */
// Skip / reject causes
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SkipCause {
    KillSwitch,
    ConfigDisabled,
    TradeLimit,
    UnmappedSector,
    NoRankingData,
    SectorRankMiss,
    NoQuoteYet,
}

impl From<FilterReject> for SkipCause {
    fn from(reject: FilterReject) -> Self {
        match reject {
            FilterReject::UnmappedSector => SkipCause::UnmappedSector,
            FilterReject::NoRankingData => SkipCause::NoRankingData,
            FilterReject::SectorRankMiss => SkipCause::SectorRankMiss,
        }
    }
}

impl Display for SkipCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SkipCause::KillSwitch => "KILL_SWITCH",
                SkipCause::ConfigDisabled => "CFG_DISABLED",
                SkipCause::TradeLimit => "TRADE_LIMIT",
                SkipCause::UnmappedSector => "UNMAPPED_SECTOR",
                SkipCause::NoRankingData => "NO_RANKING_DATA",
                SkipCause::SectorRankMiss => "SECTOR_RANK_MISS",
                SkipCause::NoQuoteYet => "NO_LTP_YET",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RejectCause {
    DuplicatePosition,
    BadSymbol,
    BadQuantity,
    CncShortNotAllowed,
}

impl Display for RejectCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RejectCause::DuplicatePosition => "ALREADY_OPEN",
                RejectCause::BadSymbol => "BAD_SYMBOL",
                RejectCause::BadQuantity => "BAD_QTY",
                RejectCause::CncShortNotAllowed => "CNC_SHORT_NOT_ALLOWED",
            }
        )
    }
}

/*----- */
// Alert outcome
/*----- */
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    Entered {
        trade_id: String,
        order_id: String,
        quantity: u32,
        entry_price: f64,
    },
    Skipped(SkipCause),
    Rejected(RejectCause),
    Errored(String),
}

/*----- */
// Batch summary
/*----- */
/// Per-batch counters, the only cross-cutting bookkeeping the processor
/// keeps while handling a webhook delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub entered: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub errored: usize,
}

impl BatchSummary {
    fn tally(&mut self, outcome: &AlertOutcome) {
        match outcome {
            AlertOutcome::Entered { .. } => self.entered += 1,
            AlertOutcome::Skipped(_) => self.skipped += 1,
            AlertOutcome::Rejected(_) => self.rejected += 1,
            AlertOutcome::Errored(_) => self.errored += 1,
        }
    }
}

/*----- */
// Alert processor
/*----- */
/// Top-level coordinator: consumes ticks and alerts, consults the sector
/// filter, drives position entries/exits and owns the session-scoped state
/// (quote cache, kill switch, per-alert daily trade counters).
pub struct AlertProcessor<Gateway, Store, Sink>
where
    Gateway: OrderGateway,
    Store: StateStore,
    Sink: EventSink,
{
    manager: PositionManager<Gateway, Store, Sink>,
    filter: SectorFilter,
    tracker: Arc<RwLock<SectorPerformanceTracker>>,
    lookup: Arc<dyn SymbolSectorLookup>,
    store: Arc<Store>,
    sink: Arc<Sink>,
    quotes: RwLock<HashMap<String, SymbolQuote>>,
    trades_today: Mutex<HashMap<String, u32>>,
    kill_switch: AtomicBool,
}

impl<Gateway, Store, Sink> AlertProcessor<Gateway, Store, Sink>
where
    Gateway: OrderGateway,
    Store: StateStore,
    Sink: EventSink,
{
    pub fn builder() -> AlertProcessorBuilder<Gateway, Store, Sink> {
        AlertProcessorBuilder::new()
    }

    /*----- */
    // Tick path
    /*----- */
    /// Hot path: quote cache + sector aggregation + position monitoring.
    /// In-memory only; no I/O unless an exit triggers.
    pub async fn on_tick(&self, tick: &MarketTick) {
        if tick.ltp <= 0.0 {
            return;
        }

        let mut tick = tick.clone();
        tick.symbol = normalise_symbol(&tick.symbol);

        self.quotes
            .write()
            .insert(tick.symbol.clone(), tick.quote());
        self.tracker
            .write()
            .ingest(&tick.symbol, tick.ltp, tick.prev_close);

        self.manager.on_tick(&tick).await;
    }

    /*----- */
    // Alert path
    /*----- */
    pub async fn handle(&self, alert: &AlertSignal, cfg: &AlertConfig) -> AlertOutcome {
        let symbol = normalise_symbol(&alert.symbol);
        if symbol.is_empty() {
            return self
                .conclude(alert, cfg, AlertOutcome::Rejected(RejectCause::BadSymbol))
                .await;
        }

        if self.kill_switch.load(Ordering::SeqCst) {
            return self
                .conclude(alert, cfg, AlertOutcome::Skipped(SkipCause::KillSwitch))
                .await;
        }

        if !cfg.enabled {
            return self
                .conclude(alert, cfg, AlertOutcome::Skipped(SkipCause::ConfigDisabled))
                .await;
        }

        if self.limit_reached(&cfg.alert_name, cfg.trade_limit_per_day) {
            return self
                .conclude(alert, cfg, AlertOutcome::Skipped(SkipCause::TradeLimit))
                .await;
        }

        if cfg.sector_filter_on {
            if let FilterVerdict::Rejected(reject) =
                self.filter.permits(&symbol, alert.direction, cfg.top_n_sector)
            {
                return self
                    .conclude(alert, cfg, AlertOutcome::Skipped(reject.into()))
                    .await;
            }
        }

        if cfg.product == Product::Cnc && alert.direction == Direction::Short {
            return self
                .conclude(
                    alert,
                    cfg,
                    AlertOutcome::Rejected(RejectCause::CncShortNotAllowed),
                )
                .await;
        }

        let ltp = match self.quotes.read().get(&symbol) {
            Some(quote) if quote.ltp > 0.0 => quote.ltp,
            _ => {
                return self
                    .conclude(alert, cfg, AlertOutcome::Skipped(SkipCause::NoQuoteYet))
                    .await;
            }
        };

        if cfg.quantity_for(ltp) == 0 {
            return self
                .conclude(alert, cfg, AlertOutcome::Rejected(RejectCause::BadQuantity))
                .await;
        }

        // Sector label is captured at entry even when the filter is off
        let sector = self.lookup.sector_of(&symbol).map(str::to_owned);

        let outcome = match self
            .manager
            .try_enter(&symbol, cfg, alert.direction, sector, ltp)
            .await
        {
            Ok(receipt) => {
                self.consume_trade_unit(&cfg.alert_name);
                AlertOutcome::Entered {
                    trade_id: receipt.trade_id,
                    order_id: receipt.order_id,
                    quantity: receipt.quantity,
                    entry_price: receipt.entry_price,
                }
            }
            Err(EngineError::DuplicatePosition(_)) => {
                AlertOutcome::Rejected(RejectCause::DuplicatePosition)
            }
            Err(error) => AlertOutcome::Errored(error.to_string()),
        };

        self.conclude(alert, cfg, outcome).await
    }

    /// One webhook delivery can carry several symbols. Per-symbol isolation:
    /// a failing symbol never aborts the rest of the batch.
    pub async fn handle_batch(
        &self,
        alert_name: &str,
        symbols: &[String],
        cfg: &AlertConfig,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for symbol in symbols {
            if normalise_symbol(symbol).is_empty() {
                continue;
            }
            let alert = AlertSignal::new(symbol.as_str(), cfg.direction, alert_name);
            let outcome = self.handle(&alert, cfg).await;
            summary.tally(&outcome);
        }
        info!(
            alert_name,
            entered = summary.entered,
            skipped = summary.skipped,
            rejected = summary.rejected,
            errored = summary.errored,
            "alert batch processed"
        );
        summary
    }

    /*----- */
    // Exits
    /*----- */
    pub async fn manual_square_off(&self, symbol: &str) -> Result<(), EngineError> {
        let symbol = normalise_symbol(symbol);
        match self.manager.request_exit(&symbol, ExitReason::Manual).await {
            Ok(_) => Ok(()),
            // No live record is a no-op, not a failure
            Err(EngineError::NotFound(_)) => {
                info!(%symbol, "manual square-off for symbol with no live position");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Best-effort close of everything live. Partial failures leave ERROR
    /// records behind and are reported in the summary, never swallowed.
    pub async fn square_off_all(&self, reason: ExitReason) -> SquareOffSummary {
        let summary = self.manager.square_off(reason).await;
        self.sink.send(EngineEvent::SquareOffSummary {
            attempted: summary.attempted,
            closed: summary.closed,
            errored: summary.errored,
            reason,
            time: Utc::now(),
        });
        info!(
            %reason,
            attempted = summary.attempted,
            closed = summary.closed,
            errored = summary.errored,
            "square-off completed"
        );
        summary
    }

    /*----- */
    // Session lifecycle
    /*----- */
    pub fn set_kill_switch(&self, enabled: bool) {
        self.kill_switch.store(enabled, Ordering::SeqCst);
        info!(enabled, "kill switch updated");
    }

    pub fn kill_switch(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    /// Daily reset. Sector tracking, quotes, trade counters and the kill
    /// switch always reset; the position index is only cleared when no open
    /// positions remain.
    pub async fn reset_session(&self) {
        let live = self.manager.book().live_positions().await;
        if live.is_empty() {
            self.manager.book().clear();
        } else {
            warn!(
                open = live.len(),
                "positions still live at daily reset, keeping position index"
            );
        }

        self.tracker.write().reset();
        self.quotes.write().clear();
        self.trades_today.lock().clear();
        self.kill_switch.store(false, Ordering::SeqCst);
        info!("daily session reset completed");
    }

    pub fn manager(&self) -> &PositionManager<Gateway, Store, Sink> {
        &self.manager
    }

    /*----- */
    // Internals
    /*----- */
    /// Read-only check against the per-alert daily counter. A unit is only
    /// consumed when an entry is confirmed, so skipped and rejected alerts
    /// never burn quota.
    fn limit_reached(&self, alert_name: &str, limit: u32) -> bool {
        self.trades_today
            .lock()
            .get(alert_name)
            .map_or(false, |used| *used >= limit)
    }

    fn consume_trade_unit(&self, alert_name: &str) {
        *self.trades_today.lock().entry(alert_name.to_owned()).or_insert(0) += 1;
    }

    /// Emit + persist the outcome, then hand it back to the caller.
    async fn conclude(
        &self,
        alert: &AlertSignal,
        cfg: &AlertConfig,
        outcome: AlertOutcome,
    ) -> AlertOutcome {
        let (label, detail) = match &outcome {
            AlertOutcome::Entered { trade_id, .. } => {
                ("ENTERED".to_owned(), Some(trade_id.clone()))
            }
            AlertOutcome::Skipped(cause) => {
                self.sink.send(EngineEvent::AlertSkipped {
                    symbol: alert.symbol.clone(),
                    cause: cause.to_string(),
                    time: Utc::now(),
                });
                ("SKIPPED".to_owned(), Some(cause.to_string()))
            }
            AlertOutcome::Rejected(cause) => {
                self.sink.send(EngineEvent::AlertSkipped {
                    symbol: alert.symbol.clone(),
                    cause: cause.to_string(),
                    time: Utc::now(),
                });
                ("REJECTED".to_owned(), Some(cause.to_string()))
            }
            AlertOutcome::Errored(detail) => ("ERROR".to_owned(), Some(detail.clone())),
        };

        let record = AlertRecord {
            alert_name: cfg.alert_name.clone(),
            symbol: alert.symbol.clone(),
            direction: alert.direction,
            outcome: label,
            detail,
            time: Utc::now(),
        };
        if let Err(error) = self.store.record_alert(&record).await {
            warn!(symbol = %alert.symbol, %error, "failed to log alert outcome");
        }

        outcome
    }
}

/*----- */
// Alert processor builder
/*----- */
#[derive(Default)]
pub struct AlertProcessorBuilder<Gateway, Store, Sink>
where
    Gateway: OrderGateway,
    Store: StateStore,
    Sink: EventSink,
{
    gateway: Option<Arc<Gateway>>,
    store: Option<Arc<Store>>,
    sink: Option<Arc<Sink>>,
    lookup: Option<Arc<dyn SymbolSectorLookup>>,
}

impl<Gateway, Store, Sink> AlertProcessorBuilder<Gateway, Store, Sink>
where
    Gateway: OrderGateway,
    Store: StateStore,
    Sink: EventSink,
{
    pub fn new() -> Self {
        Self {
            gateway: None,
            store: None,
            sink: None,
            lookup: None,
        }
    }

    pub fn gateway(self, value: Arc<Gateway>) -> Self {
        Self {
            gateway: Some(value),
            ..self
        }
    }

    pub fn store(self, value: Arc<Store>) -> Self {
        Self {
            store: Some(value),
            ..self
        }
    }

    pub fn sink(self, value: Arc<Sink>) -> Self {
        Self {
            sink: Some(value),
            ..self
        }
    }

    pub fn sector_lookup(self, value: Arc<dyn SymbolSectorLookup>) -> Self {
        Self {
            lookup: Some(value),
            ..self
        }
    }

    pub fn build(self) -> Result<AlertProcessor<Gateway, Store, Sink>, EngineError> {
        let gateway = self
            .gateway
            .ok_or(EngineError::BuilderIncomplete("gateway"))?;
        let store = self.store.ok_or(EngineError::BuilderIncomplete("store"))?;
        let sink = self.sink.ok_or(EngineError::BuilderIncomplete("sink"))?;
        let lookup = self
            .lookup
            .ok_or(EngineError::BuilderIncomplete("sector_lookup"))?;

        let tracker = Arc::new(RwLock::new(SectorPerformanceTracker::new(Arc::clone(
            &lookup,
        ))));
        let ranker = SectorRanker::new(Arc::clone(&tracker));
        let filter = SectorFilter::new(ranker, Arc::clone(&lookup));

        Ok(AlertProcessor {
            manager: PositionManager::new(gateway, Arc::clone(&store), Arc::clone(&sink)),
            filter,
            tracker,
            lookup,
            store,
            sink,
            quotes: RwLock::new(HashMap::new()),
            trades_today: Mutex::new(HashMap::new()),
            kill_switch: AtomicBool::new(false),
        })
    }
}
