use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/*----- */
// Direction
/*----- */
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Direction {
    #[serde(alias = "long", alias = "LONG", alias = "l")]
    Long,
    #[serde(alias = "short", alias = "SHORT", alias = "s")]
    Short,
}

impl Direction {
    /// Order side that opens a position in this direction.
    pub fn entry_side(&self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Order side that flattens a position in this direction.
    pub fn exit_side(&self) -> Side {
        match self {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Direction::Long => "LONG",
                Direction::Short => "SHORT",
            }
        )
    }
}

/*----- */
// Side
/*----- */
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "s")]
    Sell,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

/*----- */
// Symbol quote
/*----- */
/// Latest known quote for a symbol. Ephemeral, overwritten on every tick and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SymbolQuote {
    pub symbol: String,
    pub ltp: f64,
    pub prev_close: f64,
}

impl SymbolQuote {
    pub fn new<S>(symbol: S, ltp: f64, prev_close: f64) -> Self
    where
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            ltp,
            prev_close,
        }
    }

    /// Percent change of the last traded price against the previous close.
    /// None if there is no usable reference close.
    pub fn pct_change(&self) -> Option<f64> {
        if self.prev_close <= 0.0 || self.ltp <= 0.0 {
            return None;
        }
        Some((self.ltp - self.prev_close) / self.prev_close * 100.0)
    }
}

/*----- */
// Market tick
/*----- */
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketTick {
    pub symbol: String,
    pub ltp: f64,
    pub prev_close: f64,
    pub time: DateTime<Utc>,
}

impl MarketTick {
    pub fn new<S>(symbol: S, ltp: f64, prev_close: f64) -> Self
    where
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            ltp,
            prev_close,
            time: Utc::now(),
        }
    }

    pub fn quote(&self) -> SymbolQuote {
        SymbolQuote {
            symbol: self.symbol.clone(),
            ltp: self.ltp,
            prev_close: self.prev_close,
        }
    }
}

/*----- */
// Test
/*----- */
