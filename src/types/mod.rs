//! Core data types for dark-otc
//!
//! ## Types
//!
//! - [`Identity`] / [`AssetId`]: 20-byte ledger accounts
//! - [`Handle`], [`ExternalHandle`], [`Proof`]: opaque encrypted-value references
//! - [`Order`]: a single bilateral escrow order
//! - [`OrderRecord`]: its SSZ commitment encoding
//! - [`OrderEvent`]: signals emitted on commit
//!
//! No type here carries a plaintext amount.

mod event;
mod handle;
mod identity;
mod order;

pub use event::OrderEvent;
pub use handle::{ExternalHandle, Handle, Proof};
pub use identity::{AssetId, Identity, IdentityParseError};
pub use order::{Order, OrderId, OrderRecord, OrderStatus, OrderTerms};
