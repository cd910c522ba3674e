use std::fmt::{Display, Formatter};

use chrono::{Duration, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use intraday_data::model::Direction;

/*----- */
// Product
/*----- */
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum Product {
    /// Intraday margin product: monitored for target/stop/TSL and squared
    /// off at end of day.
    #[serde(alias = "mis", alias = "MIS")]
    Mis,
    /// Delivery product: entered but not monitored.
    #[serde(alias = "cnc", alias = "CNC")]
    Cnc,
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Product::Mis => "MIS",
                Product::Cnc => "CNC",
            }
        )
    }
}

/*----- */
// Quantity mode
/*----- */
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum QtyMode {
    #[serde(alias = "qty", alias = "QTY")]
    Qty,
    #[serde(alias = "capital", alias = "CAPITAL")]
    Capital,
}

/*----- */
// Alert config
/*----- */
/// Per-alert trading parameters, owned externally and consumed read-only by
/// the engine. Field defaults mirror the dashboard's stored config shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertConfig {
    pub alert_name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default direction stamped onto signals by the upstream normaliser.
    #[serde(default = "default_direction")]
    pub direction: Direction,

    #[serde(default = "default_product")]
    pub product: Product,

    #[serde(default = "default_qty_mode")]
    pub qty_mode: QtyMode,

    #[serde(default = "default_capital")]
    pub capital: f64,

    #[serde(default = "default_qty")]
    pub qty: u32,

    #[serde(default = "default_target_pct")]
    pub target_pct: f64,

    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,

    #[serde(default = "default_trailing_sl_pct")]
    pub trailing_sl_pct: f64,

    #[serde(default = "default_trade_limit")]
    pub trade_limit_per_day: u32,

    #[serde(default)]
    pub sector_filter_on: bool,

    #[serde(default = "default_top_n")]
    pub top_n_sector: usize,
}

impl AlertConfig {
    pub fn new<S>(alert_name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            alert_name: alert_name.into(),
            enabled: true,
            direction: default_direction(),
            product: default_product(),
            qty_mode: default_qty_mode(),
            capital: default_capital(),
            qty: default_qty(),
            target_pct: default_target_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            trailing_sl_pct: default_trailing_sl_pct(),
            trade_limit_per_day: default_trade_limit(),
            sector_filter_on: false,
            top_n_sector: default_top_n(),
        }
    }

    /// Quantity for an entry at the given last traded price. Zero means the
    /// entry is not viable.
    pub fn quantity_for(&self, ltp: f64) -> u32 {
        if ltp <= 0.0 {
            return 0;
        }
        match self.qty_mode {
            QtyMode::Qty => self.qty.max(1),
            QtyMode::Capital => ((self.capital / ltp) as u32).max(1),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_direction() -> Direction {
    Direction::Long
}

fn default_product() -> Product {
    Product::Mis
}

fn default_qty_mode() -> QtyMode {
    QtyMode::Capital
}

fn default_capital() -> f64 {
    20_000.0
}

fn default_qty() -> u32 {
    1
}

fn default_target_pct() -> f64 {
    1.0
}

fn default_stop_loss_pct() -> f64 {
    0.7
}

fn default_trailing_sl_pct() -> f64 {
    0.5
}

fn default_trade_limit() -> u32 {
    3
}

fn default_top_n() -> usize {
    2
}

/*----- */
// Lifecycle config
/*----- */
/// Wall-clock anchors for the two daily events, expressed in a fixed
/// trading-day time zone (IST by default).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_utc_offset_secs")]
    pub utc_offset_secs: i32,

    #[serde(default = "default_reset_time")]
    pub reset_time: NaiveTime,

    #[serde(default)]
    pub reset_grace_mins: i64,

    #[serde(default = "default_square_off_time")]
    pub square_off_time: NaiveTime,
}

impl LifecycleConfig {
    pub fn offset(&self) -> FixedOffset {
        // Out-of-range offsets fall back to IST
        FixedOffset::east_opt(self.utc_offset_secs)
            .unwrap_or_else(|| FixedOffset::east_opt(default_utc_offset_secs()).unwrap())
    }

    pub fn reset_grace(&self) -> Duration {
        Duration::minutes(self.reset_grace_mins)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            utc_offset_secs: default_utc_offset_secs(),
            reset_time: default_reset_time(),
            reset_grace_mins: 0,
            square_off_time: default_square_off_time(),
        }
    }
}

// IST, +05:30
fn default_utc_offset_secs() -> i32 {
    5 * 3600 + 1800
}

fn default_reset_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap()
}

fn default_square_off_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 15, 0).unwrap()
}

/*----- */
// Test
/*----- */
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_alert_config_defaults_from_sparse_json() {
        let cfg: AlertConfig =
            serde_json::from_str(r#"{ "alert_name": "ORB breakout" }"#).unwrap();

        assert!(cfg.enabled);
        assert_eq!(cfg.direction, Direction::Long);
        assert_eq!(cfg.product, Product::Mis);
        assert_eq!(cfg.qty_mode, QtyMode::Capital);
        assert_eq!(cfg.capital, 20_000.0);
        assert_eq!(cfg.target_pct, 1.0);
        assert_eq!(cfg.stop_loss_pct, 0.7);
        assert_eq!(cfg.trailing_sl_pct, 0.5);
        assert_eq!(cfg.trade_limit_per_day, 3);
        assert!(!cfg.sector_filter_on);
        assert_eq!(cfg.top_n_sector, 2);
    }

    #[test]
    fn test_alert_config_accepts_dashboard_casing() {
        let cfg: AlertConfig = serde_json::from_str(
            r#"{
                "alert_name": "short scan",
                "direction": "SHORT",
                "product": "CNC",
                "qty_mode": "QTY",
                "qty": 5
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.direction, Direction::Short);
        assert_eq!(cfg.product, Product::Cnc);
        assert_eq!(cfg.qty_mode, QtyMode::Qty);
        assert_eq!(cfg.qty, 5);
    }

    #[test]
    fn test_quantity_for() {
        let mut cfg = AlertConfig::new("qty test");

        // CAPITAL mode: floor(capital / ltp), at least 1
        cfg.qty_mode = QtyMode::Capital;
        cfg.capital = 20_000.0;
        assert_eq!(cfg.quantity_for(150.0), 133);
        assert_eq!(cfg.quantity_for(50_000.0), 1);
        assert_eq!(cfg.quantity_for(0.0), 0);

        // QTY mode: configured quantity, at least 1
        cfg.qty_mode = QtyMode::Qty;
        cfg.qty = 7;
        assert_eq!(cfg.quantity_for(150.0), 7);
        cfg.qty = 0;
        assert_eq!(cfg.quantity_for(150.0), 1);
    }

    #[test]
    fn test_lifecycle_defaults() {
        let cfg = LifecycleConfig::default();
        assert_eq!(cfg.offset().local_minus_utc(), 19_800);
        assert_eq!(cfg.reset_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(
            cfg.square_off_time,
            NaiveTime::from_hms_opt(15, 15, 0).unwrap()
        );
    }
}
