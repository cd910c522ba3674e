use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    config::LifecycleConfig,
    event::EventSink,
    gateway::OrderGateway,
    position::ExitReason,
    processor::AlertProcessor,
    store::StateStore,
};

/*----- */
// Lifecycle action
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    SquareOff,
    Reset,
}

/*----- */
// Daily lifecycle scheduler
/*----- */
/// Clock-driven component firing the two time-anchored daily events:
/// automatic square-off and full session reset, at configured wall-clock
/// instants in a fixed trading time zone. Polling is coarse (once a
/// minute); last-fired guards make repeated polls within the same minute
/// idempotent.
#[derive(Debug)]
pub struct DailyLifecycleScheduler {
    next_square_off: DateTime<Utc>,
    next_reset: DateTime<Utc>,
    last_square_off: Option<DateTime<Utc>>,
    last_reset: Option<DateTime<Utc>>,
}

impl DailyLifecycleScheduler {
    /// The config is fully resolved into the two next-fire instants here;
    /// advancing by whole days afterwards preserves the wall-clock anchor
    /// and the reset grace.
    pub fn new(config: LifecycleConfig, now: DateTime<Utc>) -> Self {
        let next_square_off = next_occurrence(&config, config.square_off_time, now);
        let next_reset = next_occurrence(&config, config.reset_time, now) + config.reset_grace();
        Self {
            next_square_off,
            next_reset,
            last_square_off: None,
            last_reset: None,
        }
    }

    pub fn next_square_off(&self) -> DateTime<Utc> {
        self.next_square_off
    }

    pub fn next_reset(&self) -> DateTime<Utc> {
        self.next_reset
    }

    /// Compare the clock against both thresholds. Each threshold fires at
    /// most once: the guard is the last-fired instant, not the threshold
    /// alone, so a second poll in the same minute is a no-op.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<LifecycleAction> {
        let mut actions = Vec::new();

        if now >= self.next_square_off
            && self.last_square_off.map_or(true, |t| t < self.next_square_off)
        {
            self.last_square_off = Some(now);
            self.next_square_off = self.next_square_off + Duration::days(1);
            actions.push(LifecycleAction::SquareOff);
        }

        if now >= self.next_reset && self.last_reset.map_or(true, |t| t < self.next_reset) {
            self.last_reset = Some(now);
            self.next_reset = self.next_reset + Duration::days(1);
            actions.push(LifecycleAction::Reset);
        }

        actions
    }

    /// Minute-resolution driver loop.
    pub async fn run<Gateway, Store, Sink>(
        mut self,
        processor: Arc<AlertProcessor<Gateway, Store, Sink>>,
    ) where
        Gateway: OrderGateway,
        Store: StateStore,
        Sink: EventSink,
    {
        info!(
            next_square_off = %self.next_square_off,
            next_reset = %self.next_reset,
            "daily lifecycle scheduler started"
        );

        let mut ticker = interval(std::time::Duration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            for action in self.poll(Utc::now()) {
                match action {
                    LifecycleAction::SquareOff => {
                        let summary = processor.square_off_all(ExitReason::AutoSquareOff).await;
                        info!(
                            attempted = summary.attempted,
                            closed = summary.closed,
                            errored = summary.errored,
                            "auto square-off fired"
                        );
                    }
                    LifecycleAction::Reset => {
                        processor.reset_session().await;
                        info!(next_reset = %self.next_reset, "daily reset fired");
                    }
                }
            }
        }
    }
}

/*----- */
// Next occurrence
/*----- */
/// Next instant at which the given wall-clock time occurs in the configured
/// trading time zone, strictly after `now`.
fn next_occurrence(
    config: &LifecycleConfig,
    wall_clock: NaiveTime,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let offset = config.offset();
    let local_now = now.with_timezone(&offset);

    let mut candidate = local_now
        .date_naive()
        .and_time(wall_clock)
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc));

    if let Some(instant) = candidate {
        if instant > now {
            return instant;
        }
    }

    candidate = (local_now.date_naive() + Duration::days(1))
        .and_time(wall_clock)
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc));

    match candidate {
        Some(instant) => instant,
        None => {
            // Fixed offsets cannot produce ambiguous local times; this arm
            // should be unreachable but a late fire beats a panic.
            warn!("failed to resolve lifecycle wall-clock time, deferring by a day");
            now + Duration::days(1)
        }
    }
}

/*----- */
// Test
/*----- */
