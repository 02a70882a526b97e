//! Trust boundary: who may confirm that encrypted terms matched.

pub mod registry;

pub use registry::ValidatorRegistry;
