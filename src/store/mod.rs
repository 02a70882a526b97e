//! Order storage for the escrow engine.
//!
//! | Operation     | Complexity |
//! |---------------|------------|
//! | Insert        | O(1)       |
//! | Lookup by id  | O(1)       |
//! | State root    | O(n)       |

pub mod order_store;

pub use order_store::{OrderStore, StoreError};
