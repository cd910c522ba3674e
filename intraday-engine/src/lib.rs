//! Tick-driven intraday trade engine: sector-filtered alert entries, a
//! per-symbol position state machine with an adaptive trailing stop, and
//! the daily reset / auto square-off lifecycle. Broker transport, durable
//! storage and event delivery are consumed through trait seams.

pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod position;
pub mod processor;
pub mod scheduler;
pub mod store;
