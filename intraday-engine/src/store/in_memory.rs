use async_trait::async_trait;
use parking_lot::Mutex;

use crate::position::Position;

use super::{AlertRecord, StateStore, StoreError};

/*----- */
// In-memory state store
/*----- */
/// Append-only store backed by plain Vecs. Stands in for the durable
/// key/value log in tests and the demo binary.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    closed_positions: Mutex<Vec<Position>>,
    alerts: Mutex<Vec<AlertRecord>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed_positions(&self) -> Vec<Position> {
        self.closed_positions.lock().clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn record_closed_position(&self, position: &Position) -> Result<(), StoreError> {
        self.closed_positions.lock().push(position.clone());
        Ok(())
    }

    async fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        self.alerts.lock().push(record.clone());
        Ok(())
    }
}
