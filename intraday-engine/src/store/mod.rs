use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use intraday_data::model::Direction;

use crate::position::Position;

pub mod in_memory;

/*----- */
// Alert record
/*----- */
/// Append-only audit record of how one alerted symbol was handled.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertRecord {
    pub alert_name: String,
    pub symbol: String,
    pub direction: Direction,
    pub outcome: String,
    pub detail: Option<String>,
    pub time: DateTime<Utc>,
}

/*----- */
// Store error
/*----- */
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write record: {0}")]
    WriteFailed(String),
}

/*----- */
// State store
/*----- */
/// Durable log of closed positions and alert outcomes. Write-only from the
/// engine's point of view: live decisions use in-memory state exclusively.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn record_closed_position(&self, position: &Position) -> Result<(), StoreError>;

    async fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError>;
}
