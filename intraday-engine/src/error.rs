use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::{gateway::GatewayError, store::StoreError};

/*----- */
// Order stage
/*----- */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStage {
    Entry,
    Exit,
}

impl Display for OrderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                OrderStage::Entry => "entry",
                OrderStage::Exit => "exit",
            }
        )
    }
}

/*----- */
// EngineError
/*----- */
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a live position already exists for {0}")]
    DuplicatePosition(String),

    #[error("no live position found for {0}")]
    NotFound(String),

    #[error("gateway rejected {stage} order for {symbol}: {source}")]
    GatewayRejected {
        symbol: String,
        stage: OrderStage,
        source: GatewayError,
    },

    #[error("stale gateway confirmation for {0} discarded")]
    StaleConfirmation(String),

    #[error("builder incomplete: {0}")]
    BuilderIncomplete(&'static str),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}
