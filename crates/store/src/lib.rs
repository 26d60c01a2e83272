//! Durable local persistence for the cart
//!
//! A `LocalStore` keeps two values per scope: the current `CartState` and the
//! list of pending operations. Loads fail soft (missing or corrupt data reads
//! as empty) and saves replace the previous value atomically.
//!
//! # Example
//!
//! ```rust
//! use cartsync_store::{LocalStore, MemoryStore};
//! use cartsync_core::CartState;
//!
//! let store = MemoryStore::new();
//! assert!(store.load().is_none());
//!
//! store.save(&CartState::new()).unwrap();
//! assert_eq!(store.load(), Some(CartState::new()));
//! ```

mod error;
mod file;
mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

use cartsync_core::{CartState, PendingOperation};

/// Scope used when none is given, matching the storefront's storage key
pub const DEFAULT_SCOPE: &str = "alpha_cart";

/// Key-value persistence for cart state and the pending-operation queue
pub trait LocalStore: Send + Sync {
    /// Loads the cart; `None` when nothing valid is stored
    fn load(&self) -> Option<CartState>;

    /// Replaces the stored cart
    fn save(&self, state: &CartState) -> StoreResult<()>;

    /// Loads the pending operations; empty when nothing valid is stored
    fn load_pending(&self) -> Vec<PendingOperation>;

    /// Replaces the stored pending operations
    fn save_pending(&self, operations: &[PendingOperation]) -> StoreResult<()>;

    /// Removes everything stored for this scope
    fn clear(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: MemoryStore = MemoryStore::new();
        let _: FileStore = FileStore::new(std::env::temp_dir());
        let _: &str = DEFAULT_SCOPE;
    }
}
