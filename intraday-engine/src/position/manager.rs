use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use intraday_data::model::{Direction, MarketTick};

use crate::{
    config::{AlertConfig, Product},
    error::{EngineError, OrderStage},
    event::{EngineEvent, EventSink},
    gateway::{OrderGateway, OrderRequest},
    store::StateStore,
};

use super::{book::PositionBook, trailing, ExitReason, Position, PositionStatus};

/*----- */
// Entry receipt
/*----- */
#[derive(Debug, Clone, PartialEq)]
pub struct EntryReceipt {
    pub trade_id: String,
    pub symbol: String,
    pub order_id: String,
    pub quantity: u32,
    pub entry_price: f64,
}

/*----- */
// Exit outcome
/*----- */
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitOutcome {
    /// Exit confirmed; realized PnL at the fill price.
    Closed { pnl: f64 },
    /// An exit is already in flight or done; nothing was submitted.
    AlreadyInFlight,
    /// The record exists but has not reached OPEN yet.
    NotOpen,
}

/*----- */
// Square-off summary
/*----- */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SquareOffSummary {
    pub attempted: usize,
    pub closed: usize,
    pub errored: usize,
}

/*----- */
// Position manager
/*----- */
/// Owns the live position index and drives each position through
/// PENDING_ENTRY -> OPEN -> EXITING -> CLOSED. All transitions for one
/// symbol run inside that symbol's slot lock; gateway calls happen outside
/// it, with the record parked in an intermediate status and an attempt id
/// to match the confirmation back to the right transition.
pub struct PositionManager<Gateway, Store, Sink>
where
    Gateway: OrderGateway,
    Store: StateStore,
    Sink: EventSink,
{
    book: PositionBook,
    gateway: Arc<Gateway>,
    store: Arc<Store>,
    sink: Arc<Sink>,
}

impl<Gateway, Store, Sink> PositionManager<Gateway, Store, Sink>
where
    Gateway: OrderGateway,
    Store: StateStore,
    Sink: EventSink,
{
    pub fn new(gateway: Arc<Gateway>, store: Arc<Store>, sink: Arc<Sink>) -> Self {
        Self {
            book: PositionBook::new(),
            gateway,
            store,
            sink,
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Attempt to open a position. Exactly one caller can win the slot for
    /// a symbol; every concurrent attempt fails with DuplicatePosition.
    pub async fn try_enter(
        &self,
        symbol: &str,
        cfg: &AlertConfig,
        direction: Direction,
        sector: Option<String>,
        ltp: f64,
    ) -> Result<EntryReceipt, EngineError> {
        let quantity = cfg.quantity_for(ltp);
        let slot = self.book.slot(symbol);
        let attempt_id = Uuid::new_v4();

        {
            let mut guard = slot.lock().await;
            if let Some(position) = &guard.position {
                if position.is_live() {
                    return Err(EngineError::DuplicatePosition(symbol.to_owned()));
                }
            }
            guard.position = Some(Position::pending_entry(
                symbol, cfg, direction, quantity, sector, attempt_id,
            ));
        }

        let request = OrderRequest {
            symbol: symbol.to_owned(),
            side: direction.entry_side(),
            quantity,
            product: cfg.product,
            reference_price: ltp,
        };

        match self.gateway.place_entry(&request).await {
            Ok(fill) => {
                let mut guard = slot.lock().await;
                let position = match &mut guard.position {
                    Some(position)
                        if position.attempt_id == attempt_id
                            && position.status == PositionStatus::PendingEntry =>
                    {
                        position
                    }
                    _ => {
                        warn!(symbol, %attempt_id, "stale entry confirmation discarded");
                        return Err(EngineError::StaleConfirmation(symbol.to_owned()));
                    }
                };

                position.confirm_entry(cfg, fill.order_id.clone(), fill.price);
                let receipt = EntryReceipt {
                    trade_id: position.trade_id.clone(),
                    symbol: symbol.to_owned(),
                    order_id: fill.order_id,
                    quantity,
                    entry_price: fill.price,
                };
                self.sink.send(EngineEvent::PositionOpened {
                    trade_id: position.trade_id.clone(),
                    symbol: symbol.to_owned(),
                    direction,
                    quantity,
                    entry_price: fill.price,
                    sector: position.sector.clone(),
                    time: Utc::now(),
                });
                info!(
                    symbol,
                    trade_id = %receipt.trade_id,
                    price = fill.price,
                    quantity,
                    %direction,
                    "position opened"
                );
                Ok(receipt)
            }
            Err(gateway_error) => {
                // Entry never happened at the broker: release the symbol so
                // a fresh alert can claim it.
                let mut guard = slot.lock().await;
                if let Some(position) = &guard.position {
                    if position.attempt_id == attempt_id {
                        guard.position = None;
                    }
                }
                self.sink.send(EngineEvent::OrderFailed {
                    symbol: symbol.to_owned(),
                    stage: OrderStage::Entry.to_string(),
                    detail: gateway_error.to_string(),
                    time: Utc::now(),
                });
                warn!(symbol, error = %gateway_error, "entry order rejected");
                Err(EngineError::GatewayRejected {
                    symbol: symbol.to_owned(),
                    stage: OrderStage::Entry,
                    source: gateway_error,
                })
            }
        }
    }

    /// Tick-driven monitoring. No-op unless an OPEN record exists for the
    /// symbol. CNC positions only mark to market; MIS positions ratchet the
    /// trailing stop and may trigger an exit.
    pub async fn on_tick(&self, tick: &MarketTick) {
        let Some(slot) = self.book.get(&tick.symbol) else {
            return;
        };

        let triggered = {
            let mut guard = slot.lock().await;
            let Some(position) = &mut guard.position else {
                return;
            };
            if position.status != PositionStatus::Open {
                return;
            }

            if position.product == Product::Cnc {
                position.ltp = tick.ltp;
                position.unrealised_pnl = position.pnl_at(tick.ltp);
                position.updated_at = Utc::now();
                return;
            }

            trailing::apply_tick(position, tick.ltp);
            trailing::evaluate_exit(position, tick.ltp)
        };

        if let Some(reason) = triggered {
            if let Err(error) = self.request_exit(&tick.symbol, reason).await {
                warn!(symbol = %tick.symbol, %reason, %error, "tick-triggered exit failed");
            }
        }
    }

    /// Close a position. Idempotent: a record already EXITING or CLOSED
    /// never submits a second exit order and never double-publishes the
    /// close event. ERROR records may be retried.
    pub async fn request_exit(
        &self,
        symbol: &str,
        reason: ExitReason,
    ) -> Result<ExitOutcome, EngineError> {
        let slot = self
            .book
            .get(symbol)
            .ok_or_else(|| EngineError::NotFound(symbol.to_owned()))?;

        let attempt_id = Uuid::new_v4();
        let request = {
            let mut guard = slot.lock().await;
            let position = guard
                .position
                .as_mut()
                .ok_or_else(|| EngineError::NotFound(symbol.to_owned()))?;

            match position.status {
                PositionStatus::Exiting | PositionStatus::Closed => {
                    return Ok(ExitOutcome::AlreadyInFlight);
                }
                PositionStatus::PendingEntry => {
                    info!(symbol, %reason, "exit requested before entry confirmed, ignored");
                    return Ok(ExitOutcome::NotOpen);
                }
                // Open proceeds; Error is an operator retry of a failed exit
                PositionStatus::Open | PositionStatus::Error => {}
            }

            position.status = PositionStatus::Exiting;
            position.exit_reason = Some(reason);
            position.attempt_id = attempt_id;
            position.updated_at = Utc::now();

            OrderRequest {
                symbol: symbol.to_owned(),
                side: position.direction.exit_side(),
                quantity: position.quantity,
                product: position.product,
                reference_price: position.ltp,
            }
        };

        match self.gateway.place_exit(&request).await {
            Ok(fill) => {
                let closed = {
                    let mut guard = slot.lock().await;
                    match guard.position.take() {
                        Some(mut position)
                            if position.attempt_id == attempt_id
                                && position.status == PositionStatus::Exiting =>
                        {
                            position.exit_order_id = fill.order_id;
                            position.realised_pnl = Some(position.pnl_at(fill.price));
                            position.ltp = fill.price;
                            position.status = PositionStatus::Closed;
                            position.updated_at = Utc::now();
                            // Closed records leave the live index immediately
                            position
                        }
                        other => {
                            guard.position = other;
                            warn!(symbol, %attempt_id, "stale exit confirmation discarded");
                            return Err(EngineError::StaleConfirmation(symbol.to_owned()));
                        }
                    }
                };

                let pnl = closed.realised_pnl.unwrap_or_default();
                if let Err(error) = self.store.record_closed_position(&closed).await {
                    warn!(symbol, %error, "failed to log closed position");
                }
                self.sink.send(EngineEvent::PositionClosed {
                    trade_id: closed.trade_id.clone(),
                    symbol: symbol.to_owned(),
                    reason,
                    exit_price: closed.ltp,
                    pnl,
                    time: Utc::now(),
                });
                info!(symbol, trade_id = %closed.trade_id, %reason, pnl, "position closed");
                Ok(ExitOutcome::Closed { pnl })
            }
            Err(gateway_error) => {
                // The order may or may not have executed at the broker.
                // Keep the record visible in ERROR for manual intervention.
                {
                    let mut guard = slot.lock().await;
                    if let Some(position) = &mut guard.position {
                        if position.attempt_id == attempt_id {
                            position.status = PositionStatus::Error;
                            position.updated_at = Utc::now();
                        }
                    }
                }
                self.sink.send(EngineEvent::OrderFailed {
                    symbol: symbol.to_owned(),
                    stage: OrderStage::Exit.to_string(),
                    detail: gateway_error.to_string(),
                    time: Utc::now(),
                });
                warn!(symbol, error = %gateway_error, "exit order failed, position marked ERROR");
                Err(EngineError::GatewayRejected {
                    symbol: symbol.to_owned(),
                    stage: OrderStage::Exit,
                    source: gateway_error,
                })
            }
        }
    }

    /// Best-effort bulk close of every live record. One symbol's failure
    /// never aborts the rest; the summary reports attempted vs confirmed.
    pub async fn square_off(&self, reason: ExitReason) -> SquareOffSummary {
        let mut summary = SquareOffSummary::default();

        for (symbol, slot) in self.book.slots_snapshot() {
            let eligible = {
                let guard = slot.lock().await;
                matches!(
                    guard.position.as_ref().map(|p| p.status),
                    Some(PositionStatus::Open)
                        | Some(PositionStatus::Exiting)
                        | Some(PositionStatus::Error)
                )
            };
            if !eligible {
                continue;
            }

            summary.attempted += 1;
            match self.request_exit(&symbol, reason).await {
                Ok(ExitOutcome::Closed { .. }) => summary.closed += 1,
                Ok(_) => {}
                Err(_) => summary.errored += 1,
            }
        }

        summary
    }
}
