//! Order lifecycle state machine.
//!
//! Every state-changing entry point follows the same shape:
//!
//! 1. Check authorization and order state.
//! 2. Run every fallible collaborator call. Imports are side-effect free and
//!    come first; the escrow transfer is the last fallible step.
//! 3. Apply infallible effects: access grants, store mutation, event.
//!
//! Because nothing is written before step 3, a rejected call leaves the store,
//! the event log and the backend exactly as they were. This is the explicit
//! form of the all-or-nothing guarantee a ledger transaction would provide.

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::confidential::{ConfidentialBackend, ImportContext, TransferRequest};
use crate::error::{AssetSide, AuthorizationError, EscrowError, Result, StateError, ValidationError};
use crate::gateway::ValidatorRegistry;
use crate::store::OrderStore;
use crate::types::{
    AssetId, ExternalHandle, Handle, Identity, Order, OrderEvent, OrderId, OrderStatus, OrderTerms,
    Proof,
};

/// Who is calling and when, as the ledger would supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub caller: Identity,
    /// Ledger timestamp in seconds.
    pub now: u64,
}

impl TxContext {
    pub fn new(caller: Identity, now: u64) -> Self {
        Self { caller, now }
    }
}

/// Parameters of `create_order`.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    /// Encrypted amount the taker must pay, in `asset_in`.
    pub amount_in: ExternalHandle,
    /// Encrypted amount the maker offers, in `asset_out`.
    pub amount_out: ExternalHandle,
    /// Encrypted allow-listed taker (or the "any" sentinel).
    pub allowed_taker: ExternalHandle,
    /// Covers all three handles.
    pub proof: Proof,
    pub deadline: u64,
    /// Move `amount_out` from the maker into custody now.
    pub escrow_now: bool,
}

/// Parameters of `request_fill`.
#[derive(Debug, Clone)]
pub struct FillRequest {
    pub payment: ExternalHandle,
    pub proof: Proof,
    /// Move `payment` from the taker into custody now.
    pub escrow_now: bool,
}

/// The escrow core: order store, validator registry and the confidential
/// backend it drives.
#[derive(Debug)]
pub struct EscrowEngine<B> {
    config: EngineConfig,
    registry: ValidatorRegistry,
    store: OrderStore,
    backend: B,
    events: Vec<OrderEvent>,
}

impl<B: ConfidentialBackend> EscrowEngine<B> {
    pub fn new(config: EngineConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let registry = ValidatorRegistry::new(config.validator)?;
        Ok(Self {
            config,
            registry,
            store: OrderStore::new(),
            backend,
            events: Vec::new(),
        })
    }

    // ========================================================================
    // Read projections
    // ========================================================================

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The escrow contract account.
    #[inline]
    pub fn custody(&self) -> Identity {
        self.config.custody
    }

    #[inline]
    pub fn validator(&self) -> Identity {
        self.registry.current()
    }

    #[inline]
    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend as the outside world sees it: balances, operators and
    /// client-side encryption live there, not in the core.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn get_order(&self, id: OrderId) -> Result<&Order> {
        self.store
            .get(id)
            .ok_or_else(|| StateError::NotFound { order_id: id }.into())
    }

    /// `false` for unknown ids.
    pub fn is_open(&self, id: OrderId, now: u64) -> bool {
        self.store.get(id).is_some_and(|order| order.is_open(now))
    }

    pub fn order_status(&self, id: OrderId, now: u64) -> Result<OrderStatus> {
        self.get_order(id).map(|order| order.status(now))
    }

    /// Committed events, oldest first.
    #[inline]
    pub fn events(&self) -> &[OrderEvent] {
        &self.events
    }

    /// Hand committed events to a consumer and clear the log.
    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // create
    // ========================================================================

    /// Create an order with confidential terms. Returns the new id.
    ///
    /// The three handles are imported before any escrow transfer runs, so a
    /// bad proof is reported as an attestation error even when `escrow_now`
    /// is set, and the transfer only runs for inputs that already verified.
    pub fn create_order(&mut self, ctx: &TxContext, params: CreateOrder) -> Result<OrderId> {
        self.try_create_order(ctx, params)
            .map_err(|err| rejected("create_order", ctx, None, err))
    }

    fn try_create_order(&mut self, ctx: &TxContext, params: CreateOrder) -> Result<OrderId> {
        if params.asset_in.is_null() {
            return Err(ValidationError::NullAsset { side: AssetSide::In }.into());
        }
        if params.asset_out.is_null() {
            return Err(ValidationError::NullAsset { side: AssetSide::Out }.into());
        }
        if params.deadline <= ctx.now {
            return Err(ValidationError::DeadlineNotInFuture {
                deadline: params.deadline,
                now: ctx.now,
            }
            .into());
        }
        if let Some(max_lifetime) = self.config.max_order_lifetime_secs {
            if params.deadline - ctx.now > max_lifetime {
                return Err(ValidationError::DeadlineTooFar {
                    deadline: params.deadline,
                    now: ctx.now,
                    max_lifetime,
                }
                .into());
            }
        }

        let custody = self.config.custody;
        let import_ctx = ImportContext {
            contract: custody,
            user: ctx.caller,
        };
        let amount_in = self.backend.import_handle(&params.amount_in, &params.proof, &import_ctx)?;
        let amount_out = self.backend.import_handle(&params.amount_out, &params.proof, &import_ctx)?;
        let allowed_taker = self
            .backend
            .import_handle(&params.allowed_taker, &params.proof, &import_ctx)?;
        debug!(caller = %ctx.caller, "order terms imported");

        if params.escrow_now {
            self.backend.transfer(&TransferRequest {
                asset: params.asset_out,
                from: ctx.caller,
                to: custody,
                spender: custody,
                amount: &params.amount_out,
                proof: &params.proof,
            })?;
            debug!(caller = %ctx.caller, asset = %params.asset_out, "maker amount escrowed");
        }

        // Nothing below can fail.
        let terms = OrderTerms {
            asset_in: params.asset_in,
            asset_out: params.asset_out,
            amount_in,
            amount_out,
            allowed_taker,
            deadline: params.deadline,
        };
        let mut readers = vec![custody, ctx.caller];
        if self.config.grant_validator_access {
            readers.push(self.registry.current());
        }
        for handle in [amount_in, amount_out, allowed_taker] {
            self.grant(&handle, &readers);
        }

        let maker = ctx.caller;
        let id = self
            .store
            .insert_with(|id| Order::new(id, maker, terms, params.escrow_now));

        info!(
            order_id = id,
            %maker,
            asset_in = %params.asset_in,
            asset_out = %params.asset_out,
            deadline = params.deadline,
            escrowed = params.escrow_now,
            "order created"
        );
        self.emit(OrderEvent::OrderCreated {
            id,
            maker,
            asset_in: params.asset_in,
            asset_out: params.asset_out,
            deadline: params.deadline,
            escrowed: params.escrow_now,
        });
        Ok(id)
    }

    // ========================================================================
    // cancel
    // ========================================================================

    /// Maker withdraws an order that has not closed. Escrowed funds are not
    /// moved; the `OrderCancelled` event tells the refund process what custody
    /// holds.
    pub fn cancel_order(&mut self, ctx: &TxContext, id: OrderId) -> Result<()> {
        self.try_cancel_order(ctx, id)
            .map_err(|err| rejected("cancel_order", ctx, Some(id), err))
    }

    fn try_cancel_order(&mut self, ctx: &TxContext, id: OrderId) -> Result<()> {
        let allow_after_expiry = self.config.allow_cancel_after_expiry;
        let order = self
            .store
            .get_mut(id)
            .ok_or(StateError::NotFound { order_id: id })?;

        ensure_maker(order, ctx.caller)?;
        if allow_after_expiry {
            order.ensure_not_closed()?;
        } else {
            order.ensure_open(ctx.now)?;
        }

        order.mark_cancelled();
        let event = OrderEvent::OrderCancelled {
            id,
            maker_escrowed: order.maker_escrowed(),
            taker_escrowed: order.taker_escrowed(),
        };

        info!(order_id = id, maker = %ctx.caller, "order cancelled");
        self.emit(event);
        Ok(())
    }

    // ========================================================================
    // request_fill
    // ========================================================================

    /// Any caller offers an encrypted payment against an open order.
    ///
    /// As in `create_order`, the payment is imported before it is escrowed.
    ///
    /// The allow-list is not checked here: the engine cannot compare encrypted
    /// identities. The validator checks it off-core before finalizing.
    pub fn request_fill(&mut self, ctx: &TxContext, id: OrderId, params: FillRequest) -> Result<()> {
        self.try_request_fill(ctx, id, params)
            .map_err(|err| rejected("request_fill", ctx, Some(id), err))
    }

    fn try_request_fill(&mut self, ctx: &TxContext, id: OrderId, params: FillRequest) -> Result<()> {
        let order = self
            .store
            .get(id)
            .ok_or(StateError::NotFound { order_id: id })?;
        order.ensure_open(ctx.now)?;
        if order.taker_payment_handle().is_some() {
            return Err(StateError::FillAlreadyRequested { order_id: id }.into());
        }
        let asset_in = order.asset_in();

        let custody = self.config.custody;
        let import_ctx = ImportContext {
            contract: custody,
            user: ctx.caller,
        };
        let payment = self.backend.import_handle(&params.payment, &params.proof, &import_ctx)?;

        if params.escrow_now {
            self.backend.transfer(&TransferRequest {
                asset: asset_in,
                from: ctx.caller,
                to: custody,
                spender: custody,
                amount: &params.payment,
                proof: &params.proof,
            })?;
            debug!(order_id = id, taker = %ctx.caller, "taker payment escrowed");
        }

        // Nothing below can fail.
        let mut readers = vec![custody, ctx.caller];
        if self.config.grant_validator_access {
            readers.push(self.registry.current());
        }
        self.grant(&payment, &readers);

        if let Some(order) = self.store.get_mut(id) {
            order.record_fill_request(ctx.caller, payment, params.escrow_now);
        }

        info!(order_id = id, taker = %ctx.caller, escrowed = params.escrow_now, "fill requested");
        self.emit(OrderEvent::FillRequested {
            id,
            taker: ctx.caller,
            escrowed: params.escrow_now,
        });
        Ok(())
    }

    // ========================================================================
    // finalize
    // ========================================================================

    /// Validator commits that the off-core equality check and settlement
    /// succeeded. Moves no balances.
    pub fn finalize(&mut self, ctx: &TxContext, id: OrderId, taker: Identity) -> Result<()> {
        self.try_finalize(ctx, id, taker)
            .map_err(|err| rejected("finalize", ctx, Some(id), err))
    }

    fn try_finalize(&mut self, ctx: &TxContext, id: OrderId, taker: Identity) -> Result<()> {
        self.registry.ensure_validator(ctx.caller)?;

        let order = self
            .store
            .get_mut(id)
            .ok_or(StateError::NotFound { order_id: id })?;
        order.ensure_open(ctx.now)?;
        if order.taker_payment_handle().is_none() {
            return Err(StateError::FillNotRequested { order_id: id }.into());
        }

        order.mark_filled(taker);

        info!(order_id = id, %taker, validator = %ctx.caller, "order finalized");
        self.emit(OrderEvent::OrderFinalized { id, taker });
        Ok(())
    }

    // ========================================================================
    // reveal_terms
    // ========================================================================

    /// Maker discloses the terms of a closed order. Irreversible.
    pub fn reveal_terms(&mut self, ctx: &TxContext, id: OrderId) -> Result<()> {
        self.try_reveal_terms(ctx, id)
            .map_err(|err| rejected("reveal_terms", ctx, Some(id), err))
    }

    fn try_reveal_terms(&mut self, ctx: &TxContext, id: OrderId) -> Result<()> {
        let order = self
            .store
            .get_mut(id)
            .ok_or(StateError::NotFound { order_id: id })?;

        ensure_maker(order, ctx.caller)?;
        if !order.is_closed() {
            return Err(StateError::NotClosed { order_id: id }.into());
        }
        if order.is_revealed() {
            return Err(StateError::AlreadyRevealed { order_id: id }.into());
        }

        order.mark_revealed();
        let handles = order.term_handles();
        for handle in &handles {
            self.backend.make_publicly_decryptable(handle);
        }

        info!(order_id = id, maker = %ctx.caller, "terms revealed");
        self.emit(OrderEvent::TermsRevealed { id });
        Ok(())
    }

    // ========================================================================
    // Trust boundary
    // ========================================================================

    /// Incumbent validator hands the role to `next`.
    ///
    /// With `grant_validator_access`, `next` is granted access to the term
    /// and payment handles of every order that is not filled: pending fills
    /// still need the equality check, and cancelled or expired orders may
    /// still hold escrow to refund. The previous validator keeps the access
    /// it already had; grants cannot be revoked.
    pub fn set_validator(&mut self, ctx: &TxContext, next: Identity) -> Result<()> {
        let previous = self
            .registry
            .rotate(ctx.caller, next)
            .map_err(|err| rejected("set_validator", ctx, None, err))?;

        if self.config.grant_validator_access {
            let handles: Vec<Handle> = self
                .store
                .iter()
                .filter(|order| !order.is_filled())
                .flat_map(|order| order.term_handles().into_iter().chain(order.taker_payment_handle()))
                .collect();
            for handle in &handles {
                self.backend.allow(handle, next);
            }
            debug!(validator = %next, handles = handles.len(), "handle access handed over");
        }

        self.emit(OrderEvent::ValidatorChanged {
            previous,
            current: next,
        });
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn grant(&mut self, handle: &Handle, readers: &[Identity]) {
        for reader in readers {
            self.backend.allow(handle, *reader);
        }
    }

    fn emit(&mut self, event: OrderEvent) {
        debug!(event = event.name(), "event emitted");
        self.events.push(event);
    }
}

fn ensure_maker(order: &Order, caller: Identity) -> std::result::Result<(), AuthorizationError> {
    if order.maker() == caller {
        Ok(())
    } else {
        Err(AuthorizationError::NotMaker {
            order_id: order.id(),
            caller,
            maker: order.maker(),
        })
    }
}

fn rejected(op: &'static str, ctx: &TxContext, order_id: Option<OrderId>, err: EscrowError) -> EscrowError {
    warn!(
        op,
        order_id = ?order_id,
        caller = %ctx.caller,
        kind = ?err.kind(),
        error = %err,
        "operation rejected"
    );
    err
}

// ============================================================================
// Unit Tests
// ============================================================================
