//! The escrow order and its lifecycle flags.
//!
//! ## State Diagram
//!
//! ```text
//!   create ──► Open ──request_fill──► FillPending ──finalize──► Filled
//!               │  \                      │                       │
//!               │   \ deadline passes     │ deadline passes       │
//!               │    ▼                    ▼                       │
//!               │   Expired ◄─────────────┘                       │
//!               │                                                 │
//!               └──cancel (also from FillPending)──► Cancelled    │
//!                                                       │         │
//!                                  reveal_terms ◄───────┴─────────┘
//! ```
//!
//! `filled` and `cancelled` are terminal and mutually exclusive. The handles
//! fixed at creation never change; `taker_payment` is written exactly once.
//!
//! ## SSZ Layout
//!
//! [`OrderRecord`] is the fixed-size commitment encoding of an order: every
//! identity and handle is a 32-byte word, flags are packed into one byte.
//! Total size: 8 + 9*32 + 8 + 1 = 305 bytes.

use ssz_rs::prelude::*;

use crate::error::StateError;
use crate::types::{AssetId, Handle, Identity};

/// Order identifier, assigned by the store starting at 0.
pub type OrderId = u64;

// ============================================================================
// Flags
// ============================================================================

const FLAG_FILLED: u8 = 1 << 0;
const FLAG_CANCELLED: u8 = 1 << 1;
const FLAG_REVEALED: u8 = 1 << 2;
const FLAG_MAKER_ESCROWED: u8 = 1 << 3;
const FLAG_TAKER_ESCROWED: u8 = 1 << 4;

// ============================================================================
// OrderStatus
// ============================================================================

/// Derived lifecycle phase at a given ledger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Accepting a fill request.
    Open,
    /// A payment handle is recorded; waiting for the validator.
    FillPending,
    /// Deadline passed before the order closed.
    Expired,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Whether state-changing operations other than reveal may still apply.
    pub fn is_live(self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::FillPending)
    }
}

// ============================================================================
// OrderTerms
// ============================================================================

/// Terms fixed at creation, already imported as internal handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerms {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    /// What the taker must pay, in `asset_in`.
    pub amount_in: Handle,
    /// What the maker offers, in `asset_out`.
    pub amount_out: Handle,
    /// Encrypted allow-listed taker, or an encrypted "any" sentinel.
    pub allowed_taker: Handle,
    pub deadline: u64,
}

// ============================================================================
// Order
// ============================================================================

/// A single bilateral escrow order.
///
/// Fields are private: the only writers are the crate-internal transition
/// methods used by the engine, each of which preserves the lifecycle
/// invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    maker: Identity,
    terms: OrderTerms,
    taker: Option<Identity>,
    taker_payment: Option<Handle>,
    settled_taker: Option<Identity>,
    flags: u8,
}

impl Order {
    pub(crate) fn new(id: OrderId, maker: Identity, terms: OrderTerms, maker_escrowed: bool) -> Self {
        Self {
            id,
            maker,
            terms,
            taker: None,
            taker_payment: None,
            settled_taker: None,
            flags: if maker_escrowed { FLAG_MAKER_ESCROWED } else { 0 },
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[inline]
    pub fn id(&self) -> OrderId {
        self.id
    }

    #[inline]
    pub fn maker(&self) -> Identity {
        self.maker
    }

    #[inline]
    pub fn terms(&self) -> &OrderTerms {
        &self.terms
    }

    #[inline]
    pub fn asset_in(&self) -> AssetId {
        self.terms.asset_in
    }

    #[inline]
    pub fn asset_out(&self) -> AssetId {
        self.terms.asset_out
    }

    #[inline]
    pub fn amount_in_handle(&self) -> Handle {
        self.terms.amount_in
    }

    #[inline]
    pub fn amount_out_handle(&self) -> Handle {
        self.terms.amount_out
    }

    #[inline]
    pub fn allowed_taker_handle(&self) -> Handle {
        self.terms.allowed_taker
    }

    #[inline]
    pub fn deadline(&self) -> u64 {
        self.terms.deadline
    }

    /// The caller whose fill request was recorded.
    #[inline]
    pub fn taker(&self) -> Option<Identity> {
        self.taker
    }

    #[inline]
    pub fn taker_payment_handle(&self) -> Option<Handle> {
        self.taker_payment
    }

    /// The taker named by the validator at finalization.
    #[inline]
    pub fn settled_taker(&self) -> Option<Identity> {
        self.settled_taker
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.flags & FLAG_FILLED != 0
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flags & FLAG_CANCELLED != 0
    }

    #[inline]
    pub fn is_revealed(&self) -> bool {
        self.flags & FLAG_REVEALED != 0
    }

    #[inline]
    pub fn maker_escrowed(&self) -> bool {
        self.flags & FLAG_MAKER_ESCROWED != 0
    }

    #[inline]
    pub fn taker_escrowed(&self) -> bool {
        self.flags & FLAG_TAKER_ESCROWED != 0
    }

    /// Filled or cancelled.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.flags & (FLAG_FILLED | FLAG_CANCELLED) != 0
    }

    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.terms.deadline
    }

    /// `!filled && !cancelled && now <= deadline`
    #[inline]
    pub fn is_open(&self, now: u64) -> bool {
        !self.is_closed() && !self.is_expired(now)
    }

    pub fn status(&self, now: u64) -> OrderStatus {
        if self.is_filled() {
            OrderStatus::Filled
        } else if self.is_cancelled() {
            OrderStatus::Cancelled
        } else if self.is_expired(now) {
            OrderStatus::Expired
        } else if self.taker_payment.is_some() {
            OrderStatus::FillPending
        } else {
            OrderStatus::Open
        }
    }

    /// The three creation-time handles disclosed by a reveal.
    pub fn term_handles(&self) -> [Handle; 3] {
        [self.terms.amount_in, self.terms.amount_out, self.terms.allowed_taker]
    }

    // ------------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------------

    /// Not yet closed. Says nothing about the deadline.
    pub(crate) fn ensure_not_closed(&self) -> Result<(), StateError> {
        if self.is_filled() {
            return Err(StateError::AlreadyFilled { order_id: self.id });
        }
        if self.is_cancelled() {
            return Err(StateError::AlreadyCancelled { order_id: self.id });
        }
        Ok(())
    }

    /// Not closed and not past the deadline.
    pub(crate) fn ensure_open(&self, now: u64) -> Result<(), StateError> {
        self.ensure_not_closed()?;
        if self.is_expired(now) {
            return Err(StateError::Expired {
                order_id: self.id,
                deadline: self.terms.deadline,
                now,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transitions (callers check guards first)
    // ------------------------------------------------------------------------

    pub(crate) fn record_fill_request(&mut self, taker: Identity, payment: Handle, escrowed: bool) {
        debug_assert!(self.taker_payment.is_none());
        self.taker = Some(taker);
        self.taker_payment = Some(payment);
        if escrowed {
            self.flags |= FLAG_TAKER_ESCROWED;
        }
    }

    pub(crate) fn mark_filled(&mut self, settled_taker: Identity) {
        debug_assert!(!self.is_closed() && self.taker_payment.is_some());
        self.settled_taker = Some(settled_taker);
        self.flags |= FLAG_FILLED;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        debug_assert!(!self.is_closed());
        self.flags |= FLAG_CANCELLED;
    }

    pub(crate) fn mark_revealed(&mut self) {
        debug_assert!(self.is_closed());
        self.flags |= FLAG_REVEALED;
    }

    /// Fixed-size commitment encoding of this order.
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            maker: self.maker.to_word(),
            asset_in: self.terms.asset_in.to_word(),
            asset_out: self.terms.asset_out.to_word(),
            amount_in: *self.terms.amount_in.as_bytes(),
            amount_out: *self.terms.amount_out.as_bytes(),
            allowed_taker: *self.terms.allowed_taker.as_bytes(),
            taker: self.taker.map(|t| t.to_word()).unwrap_or_default(),
            taker_payment: self.taker_payment.map(|h| *h.as_bytes()).unwrap_or_default(),
            settled_taker: self.settled_taker.map(|t| t.to_word()).unwrap_or_default(),
            deadline: self.terms.deadline,
            flags_raw: self.flags,
        }
    }
}

// ============================================================================
// OrderRecord
// ============================================================================

/// SSZ container committed into the store's state root.
///
/// Absent optional values (no taker yet) encode as the zero word.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct OrderRecord {
    pub id: u64,
    pub maker: [u8; 32],
    pub asset_in: [u8; 32],
    pub asset_out: [u8; 32],
    pub amount_in: [u8; 32],
    pub amount_out: [u8; 32],
    pub allowed_taker: [u8; 32],
    pub taker: [u8; 32],
    pub taker_payment: [u8; 32],
    pub settled_taker: [u8; 32],
    pub deadline: u64,
    /// Bit 0 filled, 1 cancelled, 2 revealed, 3 maker escrowed, 4 taker escrowed
    pub flags_raw: u8,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(deadline: u64) -> OrderTerms {
        OrderTerms {
            asset_in: Identity::from_label("asset-a"),
            asset_out: Identity::from_label("asset-b"),
            amount_in: Handle::from_bytes([1u8; 32]),
            amount_out: Handle::from_bytes([2u8; 32]),
            allowed_taker: Handle::from_bytes([3u8; 32]),
            deadline,
        }
    }

    fn order(deadline: u64) -> Order {
        Order::new(0, Identity::from_label("maker"), terms(deadline), false)
    }

    #[test]
    fn test_new_order_is_open() {
        let o = order(100);
        assert!(o.is_open(0));
        assert!(o.is_open(100), "deadline itself is still open");
        assert!(!o.is_open(101));
        assert_eq!(o.status(50), OrderStatus::Open);
        assert!(o.taker_payment_handle().is_none());
        assert!(!o.maker_escrowed());
    }

    #[test]
    fn test_status_progression() {
        let mut o = order(100);
        let taker = Identity::from_label("taker");

        o.record_fill_request(taker, Handle::from_bytes([9u8; 32]), true);
        assert_eq!(o.status(10), OrderStatus::FillPending);
        assert!(o.is_open(10));
        assert_eq!(o.taker(), Some(taker));
        assert!(o.taker_escrowed());

        o.mark_filled(taker);
        assert_eq!(o.status(10), OrderStatus::Filled);
        assert!(!o.is_open(10));
        assert!(o.is_closed());
        assert!(!o.is_cancelled());
    }

    #[test]
    fn test_expired_status() {
        let o = order(100);
        assert_eq!(o.status(101), OrderStatus::Expired);
        assert!(!o.status(101).is_live());
        assert_eq!(
            o.ensure_open(101),
            Err(StateError::Expired { order_id: 0, deadline: 100, now: 101 })
        );
        assert!(o.ensure_not_closed().is_ok());
    }

    #[test]
    fn test_guards_on_closed_orders() {
        let mut cancelled = order(100);
        cancelled.mark_cancelled();
        assert_eq!(
            cancelled.ensure_open(0),
            Err(StateError::AlreadyCancelled { order_id: 0 })
        );

        let mut filled = order(100);
        filled.record_fill_request(Identity::from_label("t"), Handle::from_bytes([5u8; 32]), false);
        filled.mark_filled(Identity::from_label("t"));
        assert_eq!(
            filled.ensure_not_closed(),
            Err(StateError::AlreadyFilled { order_id: 0 })
        );
    }

    #[test]
    fn test_term_handles() {
        let o = order(100);
        assert_eq!(
            o.term_handles(),
            [
                Handle::from_bytes([1u8; 32]),
                Handle::from_bytes([2u8; 32]),
                Handle::from_bytes([3u8; 32]),
            ]
        );
    }

    #[test]
    fn test_record_flags() {
        let mut o = Order::new(4, Identity::from_label("maker"), terms(100), true);
        o.mark_cancelled();
        o.mark_revealed();
        let record = o.to_record();
        assert_eq!(record.id, 4);
        assert_eq!(record.flags_raw, FLAG_CANCELLED | FLAG_REVEALED | FLAG_MAKER_ESCROWED);
        assert_eq!(record.taker, [0u8; 32]);
        assert_eq!(record.taker_payment, [0u8; 32]);
    }

    #[test]
    fn test_record_ssz_size() {
        let record = order(100).to_record();
        let bytes = ssz_rs::serialize(&record).expect("Failed to serialize");
        assert_eq!(bytes.len(), 305, "OrderRecord should serialize to 305 bytes");
    }

    #[test]
    fn test_record_commits_to_settled_taker() {
        let taker = Identity::from_label("taker");
        let payment = Handle::from_bytes([9u8; 32]);

        let mut a = order(100);
        a.record_fill_request(taker, payment, false);
        let mut b = a.clone();

        a.mark_filled(taker);
        b.mark_filled(Identity::from_label("someone-else"));

        assert_eq!(a.to_record().settled_taker, taker.to_word());
        assert_ne!(a.to_record(), b.to_record());
        assert_ne!(
            ssz_rs::serialize(&a.to_record()).expect("Failed to serialize"),
            ssz_rs::serialize(&b.to_record()).expect("Failed to serialize")
        );
    }

    #[test]
    fn test_record_deterministic_serialization() {
        let record = order(100).to_record();
        let bytes1 = ssz_rs::serialize(&record).expect("Failed to serialize");
        let bytes2 = ssz_rs::serialize(&record).expect("Failed to serialize");
        assert_eq!(bytes1, bytes2, "SSZ serialization must be deterministic");
    }
}
