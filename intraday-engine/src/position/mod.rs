use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use intraday_data::model::Direction;

use crate::config::{AlertConfig, Product};

pub mod book;
pub mod manager;
pub mod trailing;

/*----- */
// Position status
/*----- */
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum PositionStatus {
    /// Entry order submitted, confirmation pending.
    PendingEntry,
    /// Entry confirmed, monitored on every tick.
    Open,
    /// Exit order submitted, confirmation pending.
    Exiting,
    /// Exit confirmed. Terminal; the record leaves the live index.
    Closed,
    /// A gateway call failed. Entry failures are removed immediately; exit
    /// failures stay visible for operator retry.
    Error,
}

impl PositionStatus {
    /// A live record blocks any further entry for its symbol. Error is
    /// deliberately live: an exit that failed at the broker may still have
    /// executed, so the symbol stays claimed until an operator resolves it.
    pub fn is_live(&self) -> bool {
        !matches!(self, PositionStatus::Closed)
    }
}

impl Display for PositionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PositionStatus::PendingEntry => "PENDING_ENTRY",
                PositionStatus::Open => "OPEN",
                PositionStatus::Exiting => "EXITING",
                PositionStatus::Closed => "CLOSED",
                PositionStatus::Error => "ERROR",
            }
        )
    }
}

/*----- */
// Exit reason
/*----- */
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum ExitReason {
    Target,
    StopLoss,
    TrailingStop,
    Manual,
    AutoSquareOff,
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ExitReason::Target => "TARGET",
                ExitReason::StopLoss => "STOP_LOSS",
                ExitReason::TrailingStop => "TRAILING_STOP",
                ExitReason::Manual => "MANUAL",
                ExitReason::AutoSquareOff => "AUTO_SQUAREOFF",
            }
        )
    }
}

/*----- */
// Position
/*----- */
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    /// Unique id for the whole trade, stable across entry and exit.
    pub trade_id: String,

    /// Symbol; unique key in the live index while the record is live.
    pub symbol: String,

    pub direction: Direction,
    pub product: Product,
    pub quantity: u32,

    pub entry_price: f64,
    pub entry_order_id: String,

    /// Price levels derived from the entry fill; 0.0 disables the check.
    pub target_price: f64,
    pub stop_price: f64,

    /// Trailing stop percentage; 0.0 disables trailing.
    pub trail_pct: f64,

    /// Highest price seen since entry for Long, lowest for Short.
    /// Monotonic in the favorable direction while Open.
    pub extreme_price: f64,

    /// Current trailing-stop trigger. Only ever ratchets risk-reducing.
    pub tsl_trigger: f64,

    /// Sector label captured at entry time, immutable thereafter.
    pub sector: Option<String>,

    pub status: PositionStatus,
    pub exit_reason: Option<ExitReason>,
    pub exit_order_id: String,

    pub ltp: f64,
    pub unrealised_pnl: f64,
    pub realised_pnl: Option<f64>,

    /// Correlation id for the in-flight gateway request. A confirmation
    /// whose attempt id no longer matches is stale and gets discarded.
    pub attempt_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// New PENDING_ENTRY record, inserted before the entry order goes out.
    pub fn pending_entry(
        symbol: &str,
        cfg: &AlertConfig,
        direction: Direction,
        quantity: u32,
        sector: Option<String>,
        attempt_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            trade_id: Uuid::new_v4().simple().to_string()[..12].to_owned(),
            symbol: symbol.to_owned(),
            direction,
            product: cfg.product,
            quantity,
            entry_price: 0.0,
            entry_order_id: String::new(),
            target_price: 0.0,
            stop_price: 0.0,
            trail_pct: cfg.trailing_sl_pct,
            extreme_price: 0.0,
            tsl_trigger: 0.0,
            sector,
            status: PositionStatus::PendingEntry,
            exit_reason: None,
            exit_order_id: String::new(),
            ltp: 0.0,
            unrealised_pnl: 0.0,
            realised_pnl: None,
            attempt_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Entry confirmed: record the fill and derive the monitoring levels.
    /// CNC positions carry no levels, they are entered and left alone.
    pub fn confirm_entry(&mut self, cfg: &AlertConfig, order_id: String, fill_price: f64) {
        self.entry_price = fill_price;
        self.entry_order_id = order_id;
        self.ltp = fill_price;
        self.status = PositionStatus::Open;
        self.updated_at = Utc::now();

        if self.product != Product::Mis {
            return;
        }

        match self.direction {
            Direction::Long => {
                self.target_price = fill_price * (1.0 + cfg.target_pct / 100.0);
                self.stop_price = fill_price * (1.0 - cfg.stop_loss_pct / 100.0);
            }
            Direction::Short => {
                self.target_price = fill_price * (1.0 - cfg.target_pct / 100.0);
                self.stop_price = fill_price * (1.0 + cfg.stop_loss_pct / 100.0);
            }
        }
        self.extreme_price = fill_price;
        self.tsl_trigger = trailing::trigger_price(self.direction, fill_price, self.trail_pct);
    }

    /// Signed PnL of the position against the given price.
    pub fn pnl_at(&self, price: f64) -> f64 {
        let qty = f64::from(self.quantity);
        match self.direction {
            Direction::Long => (price - self.entry_price) * qty,
            Direction::Short => (self.entry_price - price) * qty,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

/*----- */
// Test
/*----- */
