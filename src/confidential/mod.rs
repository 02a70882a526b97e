//! Boundary to the confidential-computation stack.
//!
//! ## Components
//!
//! - [`traits`]: the interfaces the engine consumes
//! - [`local`]: [`LocalCoprocessor`], an in-memory implementation of all of them

pub mod local;
pub mod traits;

pub use local::{LocalCoprocessor, Plaintext};
pub use traits::{
    AttestationVerifier, ConfidentialBackend, ConfidentialTransfer, HandleAccess, ImportContext,
    TransferRequest,
};
