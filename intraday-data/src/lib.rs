//! Market-data domain for the intraday trade engine: tick & quote models,
//! per-sector performance aggregation, sector ranking and the top-N sector
//! filter consulted before capital is committed.

pub mod model;
pub mod sector;
