//! In-memory confidential backend.
//!
//! [`LocalCoprocessor`] stands in for the confidential-computation service and
//! the confidential token ledgers in one process. It is what the demo binary,
//! the benches and the tests run against.
//!
//! ## Inputs and proofs
//!
//! `encrypt_inputs` issues a batch of external handles for a (contract, user)
//! pair and one proof covering the whole batch:
//!
//! ```text
//! proof = tag (32 bytes) || handle_0 (32 bytes) || handle_1 || ...
//! tag   = SHA-256("dark-otc/input-proof" || key || contract || user || handles...)
//! ```
//!
//! Only the holder of `key` can mint a valid tag, so a proof replayed under a
//! different contract or user, or listing a foreign handle, is rejected.
//!
//! ## Internal handles
//!
//! `internal = SHA-256("dark-otc/internal" || key || external)`. Importing the
//! same external handle twice yields the same internal handle, which keeps
//! import free of side effects.
//!
//! ## Balances
//!
//! Per-asset balances are kept in plaintext inside the black box. A spender
//! other than the holder must be an approved operator.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::confidential::{AttestationVerifier, ConfidentialTransfer, HandleAccess, ImportContext, TransferRequest};
use crate::error::{AttestationError, TransferError};
use crate::types::{AssetId, ExternalHandle, Handle, Identity, Proof};

const PROOF_DOMAIN: &[u8] = b"dark-otc/input-proof";
const INTERNAL_DOMAIN: &[u8] = b"dark-otc/internal";
const INPUT_DOMAIN: &[u8] = b"dark-otc/input";

/// A value that can sit behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plaintext {
    Uint(u128),
    Address(Identity),
}

impl Plaintext {
    /// Allow-list sentinel meaning "any taker".
    pub const ANY_TAKER: Plaintext = Plaintext::Address(Identity::NULL);

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Plaintext::Uint(v) => Some(*v),
            Plaintext::Address(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct LocalCoprocessor {
    key: [u8; 32],
    nonce: u64,
    inputs: HashMap<ExternalHandle, Plaintext>,
    values: HashMap<Handle, Plaintext>,
    acl: HashMap<Handle, HashSet<Identity>>,
    public: HashSet<Handle>,
    balances: HashMap<(AssetId, Identity), u128>,
    assets: HashSet<AssetId>,
    operators: HashSet<(AssetId, Identity, Identity)>,
}

impl LocalCoprocessor {
    /// A coprocessor whose attestation key is derived from `seed`.
    pub fn new(seed: &[u8]) -> Self {
        let mut key = [0u8; 32];
        key.copy_from_slice(&Sha256::digest(seed));
        Self {
            key,
            nonce: 0,
            inputs: HashMap::new(),
            values: HashMap::new(),
            acl: HashMap::new(),
            public: HashSet::new(),
            balances: HashMap::new(),
            assets: HashSet::new(),
            operators: HashSet::new(),
        }
    }

    // ========================================================================
    // Client-side encryption
    // ========================================================================

    /// Encrypt `values` for use by `user` against `contract`.
    ///
    /// ```
    /// use dark_otc::confidential::{AttestationVerifier, ImportContext, LocalCoprocessor, Plaintext};
    /// use dark_otc::types::Identity;
    ///
    /// let mut fhe = LocalCoprocessor::new(b"doc");
    /// let ctx = ImportContext {
    ///     contract: Identity::from_label("escrow"),
    ///     user: Identity::from_label("maker"),
    /// };
    /// let (handles, proof) = fhe.encrypt_inputs(ctx.contract, ctx.user, &[Plaintext::Uint(5)]);
    /// assert!(fhe.import_handle(&handles[0], &proof, &ctx).is_ok());
    /// ```
    pub fn encrypt_inputs(
        &mut self,
        contract: Identity,
        user: Identity,
        values: &[Plaintext],
    ) -> (Vec<ExternalHandle>, Proof) {
        let mut handles = Vec::with_capacity(values.len());
        for value in values {
            let handle = self.next_input_handle();
            let internal = self.internal_handle(&handle);
            self.inputs.insert(handle, *value);
            self.values.insert(internal, *value);
            handles.push(handle);
        }

        let tag = self.proof_tag(contract, user, &handles);
        let mut bytes = Vec::with_capacity(32 * (handles.len() + 1));
        bytes.extend_from_slice(&tag);
        for handle in &handles {
            bytes.extend_from_slice(handle.as_bytes());
        }

        debug!(count = handles.len(), %contract, %user, "encrypted inputs");
        (handles, Proof::new(bytes))
    }

    /// Single-value convenience over [`encrypt_inputs`](Self::encrypt_inputs).
    pub fn encrypt(&mut self, contract: Identity, user: Identity, value: Plaintext) -> (ExternalHandle, Proof) {
        let (handles, proof) = self.encrypt_inputs(contract, user, &[value]);
        (handles[0], proof)
    }

    // ========================================================================
    // Ledger administration
    // ========================================================================

    /// Credit `amount` to `holder`, registering the asset if needed.
    pub fn mint(&mut self, asset: AssetId, holder: Identity, amount: u128) {
        self.assets.insert(asset);
        let balance = self.balances.entry((asset, holder)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Let `operator` move `holder`'s balance of `asset`.
    pub fn set_operator(&mut self, asset: AssetId, holder: Identity, operator: Identity) {
        self.operators.insert((asset, holder, operator));
    }

    pub fn balance_of(&self, asset: AssetId, holder: Identity) -> u128 {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }

    // ========================================================================
    // Decryption
    // ========================================================================

    pub fn is_allowed(&self, handle: &Handle, account: Identity) -> bool {
        self.acl.get(handle).is_some_and(|accounts| accounts.contains(&account))
    }

    /// User decryption: only for accounts granted access.
    pub fn decrypt(&self, handle: &Handle, account: Identity) -> Option<Plaintext> {
        if self.is_allowed(handle, account) || self.public.contains(handle) {
            self.values.get(handle).copied()
        } else {
            None
        }
    }

    /// Public decryption: only for handles marked publicly decryptable.
    pub fn public_decrypt(&self, handle: &Handle) -> Option<Plaintext> {
        if self.public.contains(handle) {
            self.values.get(handle).copied()
        } else {
            None
        }
    }

    /// Move the amount behind an internal handle, as the validator does
    /// off-core during settlement. `spender` must be allowed on the handle.
    pub fn transfer_handle(
        &mut self,
        asset: AssetId,
        from: Identity,
        to: Identity,
        amount: &Handle,
        spender: Identity,
    ) -> Result<(), TransferError> {
        if !self.is_allowed(amount, spender) {
            return Err(TransferError::HandleAccessDenied { account: spender });
        }
        let value = self
            .values
            .get(amount)
            .and_then(Plaintext::as_uint)
            .ok_or(TransferError::NotAnAmount)?;
        self.move_balance(asset, from, to, spender, value)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn next_input_handle(&mut self) -> ExternalHandle {
        let mut hasher = Sha256::new();
        hasher.update(INPUT_DOMAIN);
        hasher.update(self.key);
        hasher.update(self.nonce.to_le_bytes());
        self.nonce += 1;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        ExternalHandle::from_bytes(bytes)
    }

    fn internal_handle(&self, external: &ExternalHandle) -> Handle {
        let mut hasher = Sha256::new();
        hasher.update(INTERNAL_DOMAIN);
        hasher.update(self.key);
        hasher.update(external.as_bytes());

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Handle::from_bytes(bytes)
    }

    fn proof_tag(&self, contract: Identity, user: Identity, handles: &[ExternalHandle]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(PROOF_DOMAIN);
        hasher.update(self.key);
        hasher.update(contract.as_bytes());
        hasher.update(user.as_bytes());
        for handle in handles {
            hasher.update(handle.as_bytes());
        }

        let mut tag = [0u8; 32];
        tag.copy_from_slice(&hasher.finalize());
        tag
    }

    fn verify_input(
        &self,
        external: &ExternalHandle,
        proof: &Proof,
        context: &ImportContext,
    ) -> Result<Plaintext, AttestationError> {
        if proof.is_empty() {
            return Err(AttestationError::EmptyProof);
        }
        if proof.len() < 64 || proof.len() % 32 != 0 {
            return Err(AttestationError::MalformedProof(format!(
                "expected a tag and at least one handle in 32-byte words, got {} bytes",
                proof.len()
            )));
        }

        let bytes = proof.as_bytes();

        let (tag, listed) = bytes.split_at(32);
        let handles: Vec<ExternalHandle> = listed
            .chunks_exact(32)
            .map(|chunk| {
                let mut word = [0u8; 32];
                word.copy_from_slice(chunk);
                ExternalHandle::from_bytes(word)
            })
            .collect();

        if !handles.contains(external) {
            return Err(AttestationError::HandleNotInProof { handle: *external });
        }
        if self.proof_tag(context.contract, context.user, &handles).as_slice() != tag {
            return Err(AttestationError::InvalidProof {
                handle: *external,
                contract: context.contract,
                user: context.user,
            });
        }

        self.inputs
            .get(external)
            .copied()
            .ok_or(AttestationError::UnknownHandle { handle: *external })
    }

    fn move_balance(
        &mut self,
        asset: AssetId,
        from: Identity,
        to: Identity,
        spender: Identity,
        value: u128,
    ) -> Result<(), TransferError> {
        if !self.assets.contains(&asset) {
            return Err(TransferError::UnknownAsset { asset });
        }
        if spender != from && !self.operators.contains(&(asset, from, spender)) {
            return Err(TransferError::NotOperator {
                asset,
                holder: from,
                spender,
            });
        }

        let available = self.balance_of(asset, from);
        if available < value {
            return Err(TransferError::InsufficientBalance { asset, holder: from });
        }

        self.balances.insert((asset, from), available - value);
        let credit = self.balances.entry((asset, to)).or_insert(0);
        *credit = credit.saturating_add(value);

        debug!(%asset, %from, %to, %spender, "confidential transfer applied");
        Ok(())
    }
}

impl Default for LocalCoprocessor {
    fn default() -> Self {
        Self::new(b"dark-otc/local")
    }
}

impl AttestationVerifier for LocalCoprocessor {
    fn import_handle(
        &self,
        external: &ExternalHandle,
        proof: &Proof,
        context: &ImportContext,
    ) -> Result<Handle, AttestationError> {
        self.verify_input(external, proof, context)?;
        Ok(self.internal_handle(external))
    }
}

impl ConfidentialTransfer for LocalCoprocessor {
    fn transfer(&mut self, request: &TransferRequest<'_>) -> Result<(), TransferError> {
        let context = ImportContext {
            contract: request.spender,
            user: request.from,
        };
        let value = self
            .verify_input(request.amount, request.proof, &context)?
            .as_uint()
            .ok_or(TransferError::NotAnAmount)?;
        self.move_balance(request.asset, request.from, request.to, request.spender, value)
    }
}

impl HandleAccess for LocalCoprocessor {
    fn allow(&mut self, handle: &Handle, account: Identity) {
        self.acl.entry(*handle).or_default().insert(account);
    }

    fn make_publicly_decryptable(&mut self, handle: &Handle) {
        self.public.insert(*handle);
    }

    fn is_publicly_decryptable(&self, handle: &Handle) -> bool {
        self.public.contains(handle)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parties() -> (Identity, Identity, Identity) {
        (
            Identity::from_label("escrow"),
            Identity::from_label("maker"),
            Identity::from_label("asset-b"),
        )
    }

    #[test]
    fn test_import_valid_batch() {
        let (escrow, maker, _) = parties();
        let mut fhe = LocalCoprocessor::default();
        let (handles, proof) =
            fhe.encrypt_inputs(escrow, maker, &[Plaintext::Uint(1), Plaintext::Uint(2), Plaintext::ANY_TAKER]);
        let ctx = ImportContext { contract: escrow, user: maker };

        let imported: Vec<Handle> = handles
            .iter()
            .map(|h| fhe.import_handle(h, &proof, &ctx).expect("valid proof"))
            .collect();
        assert_eq!(imported.len(), 3);
        assert_ne!(imported[0], imported[1]);

        // Import is deterministic.
        assert_eq!(fhe.import_handle(&handles[0], &proof, &ctx).unwrap(), imported[0]);
    }

    #[test]
    fn test_import_rejects_wrong_user() {
        let (escrow, maker, _) = parties();
        let mut fhe = LocalCoprocessor::default();
        let (handle, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(10));

        let ctx = ImportContext {
            contract: escrow,
            user: Identity::from_label("mallory"),
        };
        assert!(matches!(
            fhe.import_handle(&handle, &proof, &ctx),
            Err(AttestationError::InvalidProof { .. })
        ));
    }

    #[test]
    fn test_import_rejects_foreign_handle() {
        let (escrow, maker, _) = parties();
        let mut fhe = LocalCoprocessor::default();
        let (_, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(10));
        let (other, _) = fhe.encrypt(escrow, maker, Plaintext::Uint(11));

        let ctx = ImportContext { contract: escrow, user: maker };
        assert_eq!(
            fhe.import_handle(&other, &proof, &ctx),
            Err(AttestationError::HandleNotInProof { handle: other })
        );
    }

    #[test]
    fn test_import_rejects_malformed_proofs() {
        let (escrow, maker, _) = parties();
        let mut fhe = LocalCoprocessor::default();
        let (handle, _) = fhe.encrypt(escrow, maker, Plaintext::Uint(10));
        let ctx = ImportContext { contract: escrow, user: maker };

        assert_eq!(
            fhe.import_handle(&handle, &Proof::default(), &ctx),
            Err(AttestationError::EmptyProof)
        );
        assert!(matches!(
            fhe.import_handle(&handle, &Proof::new(vec![0u8; 40]), &ctx),
            Err(AttestationError::MalformedProof(_))
        ));
    }

    #[test]
    fn test_proof_from_other_key_rejected() {
        let (escrow, maker, _) = parties();
        let mut forger = LocalCoprocessor::new(b"forger");
        let (handle, proof) = forger.encrypt(escrow, maker, Plaintext::Uint(10));

        let fhe = LocalCoprocessor::default();
        let ctx = ImportContext { contract: escrow, user: maker };
        assert!(fhe.import_handle(&handle, &proof, &ctx).is_err());
    }

    #[test]
    fn test_transfer_requires_operator() {
        let (escrow, maker, asset) = parties();
        let mut fhe = LocalCoprocessor::default();
        fhe.mint(asset, maker, 100);
        let (amount, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(40));

        let request = TransferRequest {
            asset,
            from: maker,
            to: escrow,
            spender: escrow,
            amount: &amount,
            proof: &proof,
        };
        assert!(matches!(
            fhe.transfer(&request),
            Err(TransferError::NotOperator { .. })
        ));

        fhe.set_operator(asset, maker, escrow);
        fhe.transfer(&request).expect("operator approved");
        assert_eq!(fhe.balance_of(asset, maker), 60);
        assert_eq!(fhe.balance_of(asset, escrow), 40);
    }

    #[test]
    fn test_transfer_insufficient_balance_leaves_balances() {
        let (escrow, maker, asset) = parties();
        let mut fhe = LocalCoprocessor::default();
        fhe.mint(asset, maker, 10);
        fhe.set_operator(asset, maker, escrow);
        let (amount, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(40));

        let request = TransferRequest {
            asset,
            from: maker,
            to: escrow,
            spender: escrow,
            amount: &amount,
            proof: &proof,
        };
        assert_eq!(
            fhe.transfer(&request),
            Err(TransferError::InsufficientBalance { asset, holder: maker })
        );
        assert_eq!(fhe.balance_of(asset, maker), 10);
        assert_eq!(fhe.balance_of(asset, escrow), 0);
    }

    #[test]
    fn test_transfer_unknown_asset() {
        let (escrow, maker, _) = parties();
        let mut fhe = LocalCoprocessor::default();
        let (amount, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(1));
        let asset = Identity::from_label("nowhere");

        let request = TransferRequest {
            asset,
            from: maker,
            to: escrow,
            spender: maker,
            amount: &amount,
            proof: &proof,
        };
        // Proof is bound to `escrow` as contract, spender here is the maker.
        assert!(matches!(
            fhe.transfer(&request),
            Err(TransferError::InvalidAmount(_))
        ));

        let (amount, proof) = fhe.encrypt(maker, maker, Plaintext::Uint(1));
        let request = TransferRequest {
            asset,
            from: maker,
            to: escrow,
            spender: maker,
            amount: &amount,
            proof: &proof,
        };
        assert_eq!(fhe.transfer(&request), Err(TransferError::UnknownAsset { asset }));
    }

    #[test]
    fn test_decryption_rights() {
        let (escrow, maker, _) = parties();
        let mut fhe = LocalCoprocessor::default();
        let (external, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(77));
        let ctx = ImportContext { contract: escrow, user: maker };
        let handle = fhe.import_handle(&external, &proof, &ctx).unwrap();

        assert_eq!(fhe.decrypt(&handle, maker), None);
        fhe.allow(&handle, maker);
        assert_eq!(fhe.decrypt(&handle, maker), Some(Plaintext::Uint(77)));
        assert_eq!(fhe.public_decrypt(&handle), None);

        fhe.make_publicly_decryptable(&handle);
        assert!(fhe.is_publicly_decryptable(&handle));
        assert_eq!(fhe.public_decrypt(&handle), Some(Plaintext::Uint(77)));
    }

    #[test]
    fn test_transfer_handle_requires_access() {
        let (escrow, maker, asset) = parties();
        let validator = Identity::from_label("validator");
        let mut fhe = LocalCoprocessor::default();
        fhe.mint(asset, escrow, 50);
        fhe.set_operator(asset, escrow, validator);

        let (external, proof) = fhe.encrypt(escrow, maker, Plaintext::Uint(50));
        let ctx = ImportContext { contract: escrow, user: maker };
        let handle = fhe.import_handle(&external, &proof, &ctx).unwrap();

        assert_eq!(
            fhe.transfer_handle(asset, escrow, maker, &handle, validator),
            Err(TransferError::HandleAccessDenied { account: validator })
        );

        fhe.allow(&handle, validator);
        fhe.transfer_handle(asset, escrow, maker, &handle, validator).unwrap();
        assert_eq!(fhe.balance_of(asset, maker), 50);
        assert_eq!(fhe.balance_of(asset, escrow), 0);
    }
}
