//! # dark-otc
//!
//! Confidential bilateral escrow for over-the-counter trades.
//!
//! ## Architecture
//!
//! The escrow core consists of:
//! - **Types**: Identities, encrypted handles, the Order and its SSZ record
//! - **Store**: Append-only slab storage with a deterministic state root
//! - **Gateway**: The single validator trust root
//! - **Confidential**: Interfaces to attestation, confidential transfers and
//!   decryption rights, plus an in-memory implementation
//! - **Engine**: The order lifecycle state machine
//!
//! ## Design Principles
//!
//! 1. **No plaintext amounts**: the core stores and forwards handles only
//! 2. **All-or-nothing**: every fallible step runs before the first write
//! 3. **Determinism**: identical call sequences give identical state roots
//! 4. **Single trust root**: only the validator can finalize, only it can hand
//!    the role on
//!
//! ## Lifecycle
//!
//! ```text
//! maker: create_order ─► taker: request_fill ─► validator (off-core):
//!   decrypt + compare + settle ─► validator: finalize ─► maker: reveal_terms
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Identity, Handle, Order, OrderEvent
pub mod types;

/// Error taxonomy
pub mod error;

/// Engine configuration (JSON file + environment)
pub mod config;

/// Tracing subscriber setup
pub mod logging;

/// Order store with state root
pub mod store;

/// Validator registry
pub mod gateway;

/// Confidential backend interfaces and the local coprocessor
pub mod confidential;

/// Escrow engine: order lifecycle
pub mod engine;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::EngineConfig;
pub use engine::{CreateOrder, EscrowEngine, FillRequest, TxContext};
pub use error::{ErrorKind, EscrowError, Result};
pub use types::{Handle, Identity, Order, OrderEvent, OrderId, OrderStatus};
