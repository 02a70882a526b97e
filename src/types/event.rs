//! Signals published when a transaction commits.
//!
//! The off-core validator and the application layer consume these. Each
//! successful engine operation appends exactly one event; failed operations
//! append nothing.

use crate::types::{AssetId, Identity, OrderId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    OrderCreated {
        id: OrderId,
        maker: Identity,
        asset_in: AssetId,
        asset_out: AssetId,
        deadline: u64,
        escrowed: bool,
    },
    /// Escrow flags tell the refund process what custody holds for this order.
    OrderCancelled {
        id: OrderId,
        maker_escrowed: bool,
        taker_escrowed: bool,
    },
    FillRequested {
        id: OrderId,
        taker: Identity,
        escrowed: bool,
    },
    OrderFinalized {
        id: OrderId,
        taker: Identity,
    },
    TermsRevealed {
        id: OrderId,
    },
    ValidatorChanged {
        previous: Identity,
        current: Identity,
    },
}

impl OrderEvent {
    /// The order this event concerns, if any.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            OrderEvent::OrderCreated { id, .. }
            | OrderEvent::OrderCancelled { id, .. }
            | OrderEvent::FillRequested { id, .. }
            | OrderEvent::OrderFinalized { id, .. }
            | OrderEvent::TermsRevealed { id } => Some(*id),
            OrderEvent::ValidatorChanged { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "OrderCreated",
            OrderEvent::OrderCancelled { .. } => "OrderCancelled",
            OrderEvent::FillRequested { .. } => "FillRequested",
            OrderEvent::OrderFinalized { .. } => "OrderFinalized",
            OrderEvent::TermsRevealed { .. } => "TermsRevealed",
            OrderEvent::ValidatorChanged { .. } => "ValidatorChanged",
        }
    }
}
