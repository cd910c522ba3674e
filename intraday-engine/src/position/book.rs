use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::Position;

/*----- */
// Symbol slot
/*----- */
/// Per-symbol cell guarded by its own async mutex. Holding the slot lock is
/// the per-symbol exclusive section: entry, tick monitoring and exit for
/// one symbol are serialized through it while unrelated symbols proceed in
/// parallel.
#[derive(Debug, Default)]
pub struct SymbolSlot {
    pub position: Option<Position>,
}

/*----- */
// Position book
/*----- */
/// Live position index. The outer map lock is only held to look up or
/// insert slot Arcs, never across an await; all position mutation happens
/// under the slot mutex.
#[derive(Debug, Default)]
pub struct PositionBook {
    slots: RwLock<HashMap<String, Arc<Mutex<SymbolSlot>>>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for the symbol, created on first use.
    pub fn slot(&self, symbol: &str) -> Arc<Mutex<SymbolSlot>> {
        if let Some(slot) = self.slots.read().get(symbol) {
            return Arc::clone(slot);
        }
        Arc::clone(
            self.slots
                .write()
                .entry(symbol.to_owned())
                .or_default(),
        )
    }

    /// Existing slot only; ticks for symbols never traded stay out of the
    /// index entirely.
    pub fn get(&self, symbol: &str) -> Option<Arc<Mutex<SymbolSlot>>> {
        self.slots.read().get(symbol).map(Arc::clone)
    }

    /// All current slots, for bulk operations. The snapshot is of Arcs, so
    /// iteration locks each symbol individually.
    pub fn slots_snapshot(&self) -> Vec<(String, Arc<Mutex<SymbolSlot>>)> {
        self.slots
            .read()
            .iter()
            .map(|(symbol, slot)| (symbol.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Clone of every live position, for observability and the daily-reset
    /// open-position check.
    pub async fn live_positions(&self) -> Vec<Position> {
        let mut out = Vec::new();
        for (_, slot) in self.slots_snapshot() {
            let guard = slot.lock().await;
            if let Some(position) = &guard.position {
                if position.is_live() {
                    out.push(position.clone());
                }
            }
        }
        out
    }

    /// Drop every slot. Daily-reset only; callers must have confirmed no
    /// open positions remain.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

/*----- */
// Test
/*----- */
