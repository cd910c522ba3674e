use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use intraday_data::model::Side;

use super::{GatewayError, OrderFill, OrderGateway, OrderRequest};

/*----- */
// Config
/*----- */
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Adverse slippage applied to every fill, as a fraction (0.001 = 10bps).
    pub slippage_pct: f64,
    /// Simulated broker round-trip before a confirmation comes back.
    pub latency_ms: u64,
}

/*----- */
// Simulated gateway
/*----- */
/// Fills orders instantly at the request's reference price plus adverse
/// slippage. Symbols can be marked as failing to exercise rejection paths.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    config: Config,
    failing: RwLock<HashSet<String>>,
    order_seq: AtomicU64,
    entries_placed: AtomicU64,
    exits_placed: AtomicU64,
}

impl SimulatedGateway {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// All subsequent orders for this symbol fail with a broker rejection.
    pub fn fail_symbol<S>(&self, symbol: S)
    where
        S: Into<String>,
    {
        self.failing.write().insert(symbol.into());
    }

    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    pub fn entries_placed(&self) -> u64 {
        self.entries_placed.load(Ordering::SeqCst)
    }

    pub fn exits_placed(&self) -> u64 {
        self.exits_placed.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn fill(&self, request: &OrderRequest) -> Result<OrderFill, GatewayError> {
        if self.failing.read().contains(&request.symbol) {
            return Err(GatewayError::Rejected(format!(
                "simulated rejection for {}",
                request.symbol
            )));
        }

        if request.reference_price <= 0.0 {
            return Err(GatewayError::Rejected(format!(
                "no usable reference price for {}",
                request.symbol
            )));
        }

        // Slippage always moves against the order
        let slip = request.reference_price * self.config.slippage_pct;
        let price = match request.side {
            Side::Buy => request.reference_price + slip,
            Side::Sell => request.reference_price - slip,
        };

        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        Ok(OrderFill {
            order_id: format!("SIM-{seq}"),
            price,
        })
    }
}

#[async_trait]
impl OrderGateway for SimulatedGateway {
    async fn place_entry(&self, request: &OrderRequest) -> Result<OrderFill, GatewayError> {
        self.round_trip().await;
        let fill = self.fill(request)?;
        self.entries_placed.fetch_add(1, Ordering::SeqCst);
        Ok(fill)
    }

    async fn place_exit(&self, request: &OrderRequest) -> Result<OrderFill, GatewayError> {
        self.round_trip().await;
        let fill = self.fill(request)?;
        self.exits_placed.fetch_add(1, Ordering::SeqCst);
        Ok(fill)
    }
}

/*----- */
// Test
/*----- */
#[cfg(test)]
mod test {
    use intraday_data::model::Side;

    use super::*;
    use crate::config::Product;

    fn request(symbol: &str, side: Side, price: f64) -> OrderRequest {
        OrderRequest {
            symbol: symbol.to_owned(),
            side,
            quantity: 10,
            product: Product::Mis,
            reference_price: price,
        }
    }

    #[tokio::test]
    async fn test_fill_applies_adverse_slippage() {
        let gateway = SimulatedGateway::new(Config {
            slippage_pct: 0.01,
            latency_ms: 0,
        });

        let buy = gateway
            .place_entry(&request("ITC", Side::Buy, 100.0))
            .await
            .unwrap();
        assert_eq!(buy.price, 101.0);

        let sell = gateway
            .place_exit(&request("ITC", Side::Sell, 100.0))
            .await
            .unwrap();
        assert_eq!(sell.price, 99.0);
        assert_eq!(gateway.entries_placed(), 1);
        assert_eq!(gateway.exits_placed(), 1);
    }

    #[tokio::test]
    async fn test_failing_symbol_rejected() {
        let gateway = SimulatedGateway::default();
        gateway.fail_symbol("ITC");

        let err = gateway
            .place_entry(&request("ITC", Side::Buy, 100.0))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
        assert_eq!(gateway.entries_placed(), 0);
    }
}
