use async_trait::async_trait;
use thiserror::Error;

use intraday_data::model::Side;

use crate::config::Product;

pub mod simulated;

/*----- */
// Order request
/*----- */
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub product: Product,
    /// Last traded price at submission time, used by simulated fills and
    /// for broker-side sanity checks.
    pub reference_price: f64,
}

/*----- */
// Order fill
/*----- */
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub order_id: String,
    pub price: f64,
}

/*----- */
// Gateway error
/*----- */
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("order rejected by broker: {0}")]
    Rejected(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/*----- */
// Order gateway
/*----- */
/// Broker order transport seam. Implementations own session auth, retries
/// and timeouts; the engine only sees a confirmation or a failure.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_entry(&self, request: &OrderRequest) -> Result<OrderFill, GatewayError>;

    async fn place_exit(&self, request: &OrderRequest) -> Result<OrderFill, GatewayError>;
}
