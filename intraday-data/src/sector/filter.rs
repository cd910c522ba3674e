use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Direction;

use super::{ranker::SectorRanker, SymbolSectorLookup};

/*----- */
// Filter verdict
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Permitted,
    Rejected(FilterReject),
}

impl FilterVerdict {
    pub fn is_permitted(&self) -> bool {
        matches!(self, FilterVerdict::Permitted)
    }
}

/// Why the sector filter turned an alert away. NoRankingData is kept
/// distinct from a rank miss so downstream accounting can tell "no ticks
/// yet" apart from "sector not strong/weak enough".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FilterReject {
    UnmappedSector,
    NoRankingData,
    SectorRankMiss,
}

impl Display for FilterReject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FilterReject::UnmappedSector => "UNMAPPED_SECTOR",
                FilterReject::NoRankingData => "NO_RANKING_DATA",
                FilterReject::SectorRankMiss => "SECTOR_RANK_MISS",
            }
        )
    }
}

/*----- */
// Sector filter
/*----- */
/// Top-N sector gate consulted before an entry commits capital. Strict by
/// construction: a symbol without a sector mapping, or a ranking with no
/// data yet, never passes while the filter is engaged. Bypass for configs
/// with the filter disabled happens upstream.
pub struct SectorFilter {
    ranker: SectorRanker,
    lookup: Arc<dyn SymbolSectorLookup>,
}

impl SectorFilter {
    pub fn new(ranker: SectorRanker, lookup: Arc<dyn SymbolSectorLookup>) -> Self {
        Self { ranker, lookup }
    }

    /// Long: permitted iff the symbol's sector sits in the first `top_n`
    /// entries of the descending ranking. Short: in the last `top_n` (the
    /// worst performers). `top_n` is clamped to [1, sector count].
    pub fn permits(&self, symbol: &str, direction: Direction, top_n: usize) -> FilterVerdict {
        let sector = match self.lookup.sector_of(symbol) {
            Some(sector) => sector.to_owned(),
            None => {
                debug!(symbol, "sector filter rejected unmapped symbol");
                return FilterVerdict::Rejected(FilterReject::UnmappedSector);
            }
        };

        let ranking = self.ranker.rank();
        if ranking.is_empty() {
            debug!(symbol, "sector filter has no ranking data yet");
            return FilterVerdict::Rejected(FilterReject::NoRankingData);
        }

        let top_n = top_n.clamp(1, ranking.len());
        let permitted = match direction {
            Direction::Long => ranking[..top_n].iter().any(|s| s.sector == sector),
            Direction::Short => ranking[ranking.len() - top_n..]
                .iter()
                .any(|s| s.sector == sector),
        };

        if permitted {
            FilterVerdict::Permitted
        } else {
            FilterVerdict::Rejected(FilterReject::SectorRankMiss)
        }
    }
}

impl std::fmt::Debug for SectorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectorFilter").finish()
    }
}

/*----- */
// Test
/*----- */
