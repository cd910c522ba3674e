use std::collections::HashMap;
use std::sync::Arc;

use super::{SectorSnapshot, SymbolSectorLookup};

/*----- */
// Sector aggregate
/*----- */
#[derive(Debug, Default, Clone, Copy)]
struct SectorAggregate {
    pct_sum: f64,
    count: usize,
}

/*----- */
// Sector performance tracker
/*----- */
/// Maintains a running average percent-change per sector from the latest
/// tick of each constituent. Aggregation is incremental: a re-reporting
/// symbol adjusts its sector's sum by the delta against its previous
/// percent-change instead of recomputing the whole mean.
///
/// Only symbols that have reported at least one tick since the last reset
/// contribute; sectors with zero reporting constituents are absent from the
/// snapshot, never zero-filled.
pub struct SectorPerformanceTracker {
    lookup: Arc<dyn SymbolSectorLookup>,
    symbol_pct: HashMap<String, f64>,
    sectors: HashMap<String, SectorAggregate>,
}

impl SectorPerformanceTracker {
    pub fn new(lookup: Arc<dyn SymbolSectorLookup>) -> Self {
        Self {
            lookup,
            symbol_pct: HashMap::new(),
            sectors: HashMap::new(),
        }
    }

    /// Fold one tick into the per-sector running averages. Ticks for symbols
    /// without a sector mapping, or without a usable price reference, are
    /// ignored.
    pub fn ingest(&mut self, symbol: &str, ltp: f64, prev_close: f64) {
        if ltp <= 0.0 || prev_close <= 0.0 {
            return;
        }

        let sector = match self.lookup.sector_of(symbol) {
            Some(sector) => sector.to_owned(),
            None => return,
        };

        let pct = (ltp - prev_close) / prev_close * 100.0;

        match self.symbol_pct.insert(symbol.to_owned(), pct) {
            Some(old_pct) => {
                // Symbol already counted, adjust the sum by the delta only
                if let Some(aggregate) = self.sectors.get_mut(&sector) {
                    aggregate.pct_sum += pct - old_pct;
                }
            }
            None => {
                let aggregate = self.sectors.entry(sector).or_default();
                aggregate.pct_sum += pct;
                aggregate.count += 1;
            }
        }
    }

    /// Unordered snapshot of every sector with at least one reporting
    /// constituent. Ordering is the ranker's concern.
    pub fn snapshot(&self) -> Vec<SectorSnapshot> {
        self.sectors
            .iter()
            .filter(|(_, aggregate)| aggregate.count > 0)
            .map(|(sector, aggregate)| SectorSnapshot {
                sector: sector.clone(),
                constituents: aggregate.count,
                avg_pct_change: aggregate.pct_sum / aggregate.count as f64,
            })
            .collect()
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    pub fn reporting_symbols(&self) -> usize {
        self.symbol_pct.len()
    }

    /// Daily reset: forget every tick seen this session.
    pub fn reset(&mut self) {
        self.symbol_pct.clear();
        self.sectors.clear();
    }
}

impl std::fmt::Debug for SectorPerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectorPerformanceTracker")
            .field("symbols", &self.symbol_pct.len())
            .field("sectors", &self.sectors.len())
            .finish()
    }
}

/*----- */
// Test
/*----- */
