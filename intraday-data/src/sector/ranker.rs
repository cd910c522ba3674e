use std::cmp::Reverse;
use std::sync::Arc;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;

use super::{tracker::SectorPerformanceTracker, SectorSnapshot};

/*----- */
// Sector ranker
/*----- */
/// Produces an ordered view of sector performance on demand. No caching:
/// every call re-reads the tracker's aggregate, which is cheap because the
/// tracker already holds the per-sector sums.
#[derive(Debug, Clone)]
pub struct SectorRanker {
    tracker: Arc<RwLock<SectorPerformanceTracker>>,
}

impl SectorRanker {
    pub fn new(tracker: Arc<RwLock<SectorPerformanceTracker>>) -> Self {
        Self { tracker }
    }

    /// Sectors in strictly descending order of average percent-change, ties
    /// broken by sector name ascending so the ranking is deterministic.
    pub fn rank(&self) -> Vec<SectorSnapshot> {
        self.tracker
            .read()
            .snapshot()
            .into_iter()
            .sorted_by_key(|snapshot| {
                (
                    Reverse(OrderedFloat(snapshot.avg_pct_change)),
                    snapshot.sector.clone(),
                )
            })
            .collect()
    }
}

/*----- */
// Test
/*----- */
#[cfg(test)]
mod test {
    use super::*;
    use crate::sector::StaticSectorMap;

    fn ranker_with_ticks(ticks: &[(&str, f64, f64)]) -> SectorRanker {
        let lookup = StaticSectorMap::from_iter([
            ("AAA", "AUTO"),
            ("BBB", "BANK"),
            ("CCC", "CEMENT"),
            ("DDD", "DYES"),
        ]);
        let mut tracker = SectorPerformanceTracker::new(Arc::new(lookup));
        for (symbol, ltp, close) in ticks {
            tracker.ingest(symbol, *ltp, *close);
        }
        SectorRanker::new(Arc::new(RwLock::new(tracker)))
    }

    #[test]
    fn test_rank_descending_by_average() {
        let ranker = ranker_with_ticks(&[
            ("AAA", 102.0, 100.0), // +2
            ("BBB", 101.0, 100.0), // +1
            ("CCC", 99.0, 100.0),  // -1
        ]);

        let names: Vec<String> = ranker.rank().into_iter().map(|s| s.sector).collect();
        assert_eq!(names, vec!["AUTO", "BANK", "CEMENT"]);
    }

    #[test]
    fn test_ties_broken_by_name_ascending() {
        let ranker = ranker_with_ticks(&[
            ("DDD", 101.0, 100.0), // DYES +1
            ("BBB", 101.0, 100.0), // BANK +1
        ]);

        let names: Vec<String> = ranker.rank().into_iter().map(|s| s.sector).collect();
        assert_eq!(names, vec!["BANK", "DYES"]);
    }

    #[test]
    fn test_empty_tracker_ranks_empty() {
        let ranker = ranker_with_ticks(&[]);
        assert!(ranker.rank().is_empty());
    }
}
