//! Escrow engine module for dark-otc.
//!
//! ## Design Principles
//!
//! The engine is designed for:
//!
//! 1. **Confidentiality**: amounts and the allow-listed taker only ever exist
//!    as handles; the engine never compares or decrypts them
//! 2. **Atomicity**: a rejected call changes nothing
//! 3. **Determinism**: the same calls in the same order yield the same state root
//!
//! ## Lifecycle Rules
//!
//! - **Makers** create and cancel orders and reveal closed ones
//! - **Takers** request a fill with an encrypted payment
//! - **The validator** checks `payment == amount_in` and the allow-list off-core,
//!   settles, then calls `finalize`
//!
//! ## Example
//!
//! ```
//! use dark_otc::config::EngineConfig;
//! use dark_otc::confidential::{LocalCoprocessor, Plaintext};
//! use dark_otc::engine::{CreateOrder, EscrowEngine, FillRequest, TxContext};
//! use dark_otc::types::Identity;
//!
//! let maker = Identity::from_label("maker");
//! let taker = Identity::from_label("taker");
//! let validator = Identity::from_label("validator");
//! let custody = Identity::from_label("escrow");
//!
//! let cfg = EngineConfig::new(validator, custody);
//! let mut engine = EscrowEngine::new(cfg, LocalCoprocessor::default()).unwrap();
//!
//! let (terms, proof) = engine.backend_mut().encrypt_inputs(
//!     custody,
//!     maker,
//!     &[Plaintext::Uint(100), Plaintext::Uint(50), Plaintext::ANY_TAKER],
//! );
//! let id = engine
//!     .create_order(
//!         &TxContext::new(maker, 1_000),
//!         CreateOrder {
//!             asset_in: Identity::from_label("asset-a"),
//!             asset_out: Identity::from_label("asset-b"),
//!             amount_in: terms[0],
//!             amount_out: terms[1],
//!             allowed_taker: terms[2],
//!             proof,
//!             deadline: 2_000,
//!             escrow_now: false,
//!         },
//!     )
//!     .unwrap();
//!
//! let (payment, proof) = engine.backend_mut().encrypt(custody, taker, Plaintext::Uint(100));
//! engine
//!     .request_fill(
//!         &TxContext::new(taker, 1_100),
//!         id,
//!         FillRequest { payment, proof, escrow_now: false },
//!     )
//!     .unwrap();
//!
//! engine.finalize(&TxContext::new(validator, 1_200), id, taker).unwrap();
//! assert!(engine.get_order(id).unwrap().is_filled());
//! ```

pub mod lifecycle;

pub use lifecycle::{CreateOrder, EscrowEngine, FillRequest, TxContext};
