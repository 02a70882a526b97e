//! Error taxonomy for the escrow core.
//!
//! Every rejected operation returns exactly one [`EscrowError`] and leaves no
//! trace in the order store, the event log or the confidential backend.
//!
//! | Kind          | Raised when                                             |
//! |---------------|---------------------------------------------------------|
//! | Authorization | wrong caller for a maker-only or validator-only call    |
//! | State         | order missing, closed, expired, or in the wrong phase   |
//! | Validation    | malformed parameters (past deadline, null identities)   |
//! | Attestation   | the verifier rejected an external handle / proof pair   |
//! | Transfer      | the confidential ledger rejected an escrow movement     |

use std::fmt;

use thiserror::Error;

use crate::types::{AssetId, ExternalHandle, Identity, OrderId};

/// Wrong caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("caller {caller} is not the maker {maker} of order {order_id}")]
    NotMaker {
        order_id: OrderId,
        caller: Identity,
        maker: Identity,
    },

    #[error("caller {caller} is not the registered validator {validator}")]
    NotValidator { caller: Identity, validator: Identity },
}

/// Operation attempted against an order in the wrong phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("order {order_id} does not exist")]
    NotFound { order_id: OrderId },

    #[error("order {order_id} is already filled")]
    AlreadyFilled { order_id: OrderId },

    #[error("order {order_id} is already cancelled")]
    AlreadyCancelled { order_id: OrderId },

    #[error("order {order_id} expired at {deadline} (now {now})")]
    Expired {
        order_id: OrderId,
        deadline: u64,
        now: u64,
    },

    #[error("order {order_id} already has a recorded fill request")]
    FillAlreadyRequested { order_id: OrderId },

    #[error("order {order_id} has no recorded fill request")]
    FillNotRequested { order_id: OrderId },

    #[error("order {order_id} is still open")]
    NotClosed { order_id: OrderId },

    #[error("terms of order {order_id} are already revealed")]
    AlreadyRevealed { order_id: OrderId },
}

/// Which leg of an order a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSide {
    In,
    Out,
}

impl fmt::Display for AssetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSide::In => f.write_str("asset_in"),
            AssetSide::Out => f.write_str("asset_out"),
        }
    }
}

/// Malformed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{side} must not be the null asset")]
    NullAsset { side: AssetSide },

    #[error("deadline {deadline} is not in the future (now {now})")]
    DeadlineNotInFuture { deadline: u64, now: u64 },

    #[error("deadline {deadline} exceeds the maximum order lifetime of {max_lifetime}s (now {now})")]
    DeadlineTooFar {
        deadline: u64,
        now: u64,
        max_lifetime: u64,
    },

    #[error("validator must not be the null identity")]
    NullValidator,

    #[error("custody account must not be the null identity")]
    NullCustody,
}

/// Rejections from the attestation verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    #[error("empty proof")]
    EmptyProof,

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("handle {handle} is not covered by the proof")]
    HandleNotInProof { handle: ExternalHandle },

    #[error("proof for handle {handle} is not valid for contract {contract} and user {user}")]
    InvalidProof {
        handle: ExternalHandle,
        contract: Identity,
        user: Identity,
    },

    #[error("handle {handle} was never issued")]
    UnknownHandle { handle: ExternalHandle },
}

/// Rejections from the confidential token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("unknown asset ledger {asset}")]
    UnknownAsset { asset: AssetId },

    #[error("amount input rejected: {0}")]
    InvalidAmount(#[from] AttestationError),

    #[error("amount handle does not encrypt an integer")]
    NotAnAmount,

    #[error("{spender} is not an operator for {holder} on {asset}")]
    NotOperator {
        asset: AssetId,
        holder: Identity,
        spender: Identity,
    },

    #[error("insufficient confidential balance for {holder} on {asset}")]
    InsufficientBalance { asset: AssetId, holder: Identity },

    #[error("{account} has no access to the transferred handle")]
    HandleAccessDenied { account: Identity },
}

/// Coarse error category, stable for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    State,
    Validation,
    Attestation,
    Transfer,
}

/// Any rejection from the escrow engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error("authorization: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("state: {0}")]
    State(#[from] StateError),

    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("attestation: {0}")]
    Attestation(#[from] AttestationError),

    #[error("transfer: {0}")]
    Transfer(#[from] TransferError),
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::Authorization(_) => ErrorKind::Authorization,
            EscrowError::State(_) => ErrorKind::State,
            EscrowError::Validation(_) => ErrorKind::Validation,
            EscrowError::Attestation(_) => ErrorKind::Attestation,
            EscrowError::Transfer(_) => ErrorKind::Transfer,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EscrowError>;
