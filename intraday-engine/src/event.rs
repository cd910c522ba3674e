use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use intraday_data::model::Direction;

use crate::position::ExitReason;

/*----- */
// Engine event
/*----- */
/// Domain events emitted for downstream delivery (dashboard push, audit
/// logging). Fire-and-forget: the engine never waits on acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    PositionOpened {
        trade_id: String,
        symbol: String,
        direction: Direction,
        quantity: u32,
        entry_price: f64,
        sector: Option<String>,
        time: DateTime<Utc>,
    },
    PositionClosed {
        trade_id: String,
        symbol: String,
        reason: ExitReason,
        exit_price: f64,
        pnl: f64,
        time: DateTime<Utc>,
    },
    AlertSkipped {
        symbol: String,
        cause: String,
        time: DateTime<Utc>,
    },
    OrderFailed {
        symbol: String,
        stage: String,
        detail: String,
        time: DateTime<Utc>,
    },
    SquareOffSummary {
        attempted: usize,
        closed: usize,
        errored: usize,
        reason: ExitReason,
        time: DateTime<Utc>,
    },
}

/*----- */
// Event sink
/*----- */
pub trait EventSink: Send + Sync {
    fn send(&self, event: EngineEvent);
}

/*----- */
// Channel event sink
/*----- */
/// Pushes events into an unbounded channel whose receiver is owned by the
/// delivery layer. A closed receiver drops events silently.
#[derive(Debug, Clone)]
pub struct ChannelEventSink(mpsc::UnboundedSender<EngineEvent>);

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: EngineEvent) {
        if self.0.send(event).is_err() {
            debug!("event sink receiver dropped, event discarded");
        }
    }
}

/*----- */
// Null event sink
/*----- */
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) {}
}
