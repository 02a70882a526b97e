//! Append-only order storage.
//!
//! ## Memory Model
//!
//! Per slab docs (https://docs.rs/slab/0.4.11):
//! - Keys are handed out from the lowest vacant slot
//! - Keys are only reused after `remove`
//!
//! The store never removes an order, so the slab key sequence is 0, 1, 2, ...
//! and the key *is* the order id. Ids are therefore strictly increasing and
//! never reused, and closed orders stay queryable for audit.
//!
//! ## State Root
//!
//! `state_root()` is SHA-256 over the SSZ encoding of every [`OrderRecord`]
//! in id order. Replicas that applied the same transactions produce the same
//! root.
//!
//! ## Example
//!
//! ```
//! use dark_otc::store::OrderStore;
//!
//! let store = OrderStore::with_capacity(1_000);
//! assert!(store.is_empty());
//! assert_eq!(store.next_id(), 0);
//! ```
//!
//! [`OrderRecord`]: crate::types::OrderRecord

use sha2::{Digest, Sha256};
use slab::Slab;
use thiserror::Error;

use crate::types::{Order, OrderId};

/// Failure to produce the store commitment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("failed to encode order {order_id}: {reason}")]
    Encoding { order_id: OrderId, reason: String },
}

/// Durable mapping from order id to order.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: Slab<Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self { orders: Slab::new() }
    }

    /// Pre-allocate room for `capacity` orders.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            orders: Slab::with_capacity(capacity),
        }
    }

    // ========================================================================
    // Size
    // ========================================================================

    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.orders.capacity()
    }

    /// The id the next insert will receive.
    #[inline]
    pub fn next_id(&self) -> OrderId {
        self.orders.vacant_key() as OrderId
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Allocate the next id and store the order built for it.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(OrderId) -> Order) -> OrderId {
        let entry = self.orders.vacant_entry();
        let id = entry.key() as OrderId;
        entry.insert(build(id));
        id
    }

    #[inline]
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        usize::try_from(id).ok().and_then(|key| self.orders.get(key))
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        usize::try_from(id).ok().and_then(move |key| self.orders.get_mut(key))
    }

    /// All orders in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders.iter().map(|(_, order)| order)
    }

    // ========================================================================
    // Commitment
    // ========================================================================

    /// SHA-256 over the SSZ encoding of every order, in id order.
    pub fn state_root(&self) -> Result<[u8; 32], StoreError> {
        let mut hasher = Sha256::new();
        for order in self.iter() {
            let bytes = ssz_rs::serialize(&order.to_record()).map_err(|e| StoreError::Encoding {
                order_id: order.id(),
                reason: format!("{:?}", e),
            })?;
            hasher.update(&bytes);
        }

        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        Ok(root)
    }

    /// Hex form of [`state_root`](Self::state_root).
    pub fn state_root_hex(&self) -> Result<String, StoreError> {
        self.state_root().map(hex::encode)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Handle, Identity, OrderTerms};

    fn make_order(id: OrderId, deadline: u64) -> Order {
        let terms = OrderTerms {
            asset_in: Identity::from_label("asset-a"),
            asset_out: Identity::from_label("asset-b"),
            amount_in: Handle::from_bytes([1u8; 32]),
            amount_out: Handle::from_bytes([2u8; 32]),
            allowed_taker: Handle::from_bytes([3u8; 32]),
            deadline,
        };
        Order::new(id, Identity::from_label("maker"), terms, false)
    }

    #[test]
    fn test_store_new() {
        let store = OrderStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.next_id(), 0);
        assert!(store.get(0).is_none());
    }

    #[test]
    fn test_store_with_capacity() {
        let store = OrderStore::with_capacity(10_000);
        assert!(store.capacity() >= 10_000);
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut store = OrderStore::new();
        for expected in 0..5u64 {
            let id = store.insert_with(|id| make_order(id, 100));
            assert_eq!(id, expected);
            assert_eq!(store.get(id).map(|o| o.id()), Some(expected));
        }
        assert_eq!(store.next_id(), 5);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_closed_orders_remain_queryable() {
        let mut store = OrderStore::new();
        let id = store.insert_with(|id| make_order(id, 100));
        store.get_mut(id).unwrap().mark_cancelled();

        let next = store.insert_with(|id| make_order(id, 100));
        assert_eq!(next, id + 1, "cancelled ids are not reused");
        assert!(store.get(id).unwrap().is_cancelled());
    }

    #[test]
    fn test_get_out_of_range() {
        let store = OrderStore::new();
        assert!(store.get(u64::MAX).is_none());
    }

    #[test]
    fn test_state_root_determinism() {
        let build = || {
            let mut store = OrderStore::new();
            store.insert_with(|id| make_order(id, 100));
            store.insert_with(|id| make_order(id, 200));
            store
        };

        let a = build().state_root().unwrap();
        let b = build().state_root().unwrap();
        assert_eq!(a, b);

        let mut changed = build();
        changed.get_mut(1).unwrap().mark_cancelled();
        assert_ne!(a, changed.state_root().unwrap());
    }

    #[test]
    fn test_state_root_hex() {
        let store = OrderStore::new();
        let hex = store.state_root_hex().unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
