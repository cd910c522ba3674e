use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod filter;
pub mod ranker;
pub mod tracker;

/*----- */
// Sector snapshot
/*----- */
/// Point-in-time view of one sector's performance, derived from the latest
/// tick of every constituent that has reported this session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SectorSnapshot {
    pub sector: String,
    pub constituents: usize,
    pub avg_pct_change: f64,
}

/*----- */
// Symbol -> sector lookup
/*----- */
pub trait SymbolSectorLookup: Send + Sync {
    fn sector_of(&self, symbol: &str) -> Option<&str>;
}

/*----- */
// Static sector map
/*----- */
/// In-memory symbol -> sector mapping keyed by normalised trading symbols.
#[derive(Debug, Default, Clone)]
pub struct StaticSectorMap(HashMap<String, String>);

impl StaticSectorMap {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self(
            mapping
                .into_iter()
                .map(|(symbol, sector)| (normalise_symbol(&symbol), sector))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromIterator<(S, S)> for StaticSectorMap
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (S, S)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(symbol, sector)| (symbol.into(), sector.into()))
                .collect(),
        )
    }
}

impl SymbolSectorLookup for StaticSectorMap {
    fn sector_of(&self, symbol: &str) -> Option<&str> {
        self.0.get(&normalise_symbol(symbol)).map(String::as_str)
    }
}

/*----- */
// Symbol normalisation
/*----- */
/// Normalise an inbound trading symbol to match mapping keys, e.g.
/// "NSE:ITC" -> "ITC" and "m&m" -> "M&M". Exchange prefixes are stripped and
/// only NSE-permitted characters are kept.
pub fn normalise_symbol(symbol: &str) -> String {
    let trimmed = symbol.trim().to_uppercase();
    let stripped = match trimmed.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => trimmed.as_str(),
    };

    stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '&')
        .collect()
}

/*----- */
// Test
/*----- */
