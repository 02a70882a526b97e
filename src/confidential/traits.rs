//! Collaborator interfaces consumed by the engine.
//!
//! The engine depends on three capabilities of the confidential-computation
//! stack and nothing else:
//!
//! - [`AttestationVerifier`]: turn an untrusted external handle plus proof
//!   into an internal handle. Must be free of side effects so a later failure
//!   in the same operation needs no rollback.
//! - [`ConfidentialTransfer`]: move an encrypted amount between confidential
//!   balances. Either the transfer happened or an error is returned.
//! - [`HandleAccess`]: grant decryption rights on internal handles and mark
//!   handles publicly decryptable. Infallible by contract.

use crate::error::{AttestationError, TransferError};
use crate::types::{AssetId, ExternalHandle, Handle, Identity, Proof};

/// The (contract, user) pair a proof must be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImportContext {
    /// The contract consuming the input (the escrow custody account).
    pub contract: Identity,
    /// The account that encrypted the input.
    pub user: Identity,
}

pub trait AttestationVerifier {
    fn import_handle(
        &self,
        external: &ExternalHandle,
        proof: &Proof,
        context: &ImportContext,
    ) -> Result<Handle, AttestationError>;
}

/// One confidential balance movement.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub asset: AssetId,
    pub from: Identity,
    pub to: Identity,
    /// Account executing the transfer; must be `from` or an approved operator.
    pub spender: Identity,
    pub amount: &'a ExternalHandle,
    pub proof: &'a Proof,
}

pub trait ConfidentialTransfer {
    fn transfer(&mut self, request: &TransferRequest<'_>) -> Result<(), TransferError>;
}

pub trait HandleAccess {
    /// Let `account` decrypt `handle`.
    fn allow(&mut self, handle: &Handle, account: Identity);

    /// Irreversibly mark `handle` as decryptable by anyone.
    fn make_publicly_decryptable(&mut self, handle: &Handle);

    fn is_publicly_decryptable(&self, handle: &Handle) -> bool;
}

/// Everything the engine needs from the confidential stack.
pub trait ConfidentialBackend: AttestationVerifier + ConfidentialTransfer + HandleAccess {}

impl<T> ConfidentialBackend for T where T: AttestationVerifier + ConfidentialTransfer + HandleAccess {}
