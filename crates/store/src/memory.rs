//! In-memory persistence
//!
//! Values are kept serialized so that a load is always a fresh copy, just like
//! a real medium. Writes can be switched off to exercise storage failures.

use crate::error::{StoreError, StoreResult};
use crate::LocalStore;
use cartsync_core::{CartState, PendingOperation};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Slots {
    cart: Option<String>,
    pending: Option<String>,
}

/// `LocalStore` that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<Slots>,
    fail_writes: AtomicBool,
    fail_cart_writes: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes only cart writes fail, leaving the pending queue writable
    pub fn set_fail_cart_writes(&self, fail: bool) {
        self.fail_cart_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful cart saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Overwrites the raw stored cart text, for corruption tests
    pub fn put_raw_cart(&self, raw: impl Into<String>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.cart = Some(raw.into());
        }
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }

    fn slots(&self) -> StoreResult<std::sync::MutexGuard<'_, Slots>> {
        self.slots
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl LocalStore for MemoryStore {
    fn load(&self) -> Option<CartState> {
        let raw = self.slots().ok()?.cart.clone()?;
        match serde_json::from_str::<CartState>(&raw) {
            Ok(state) if state.is_consistent() => Some(state),
            Ok(_) => {
                log::warn!("Stored cart violates cart invariants, ignoring");
                None
            }
            Err(e) => {
                log::warn!("Stored cart is corrupt, ignoring: {}", e);
                None
            }
        }
    }

    fn save(&self, state: &CartState) -> StoreResult<()> {
        self.check_writable()?;
        if self.fail_cart_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cart writes disabled".to_string()));
        }
        let json = serde_json::to_string(state)?;
        self.slots()?.cart = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_pending(&self) -> Vec<PendingOperation> {
        let raw = match self.slots().ok().and_then(|s| s.pending.clone()) {
            Some(raw) => raw,
            None => return Vec::new(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Stored pending operations are corrupt, ignoring: {}", e);
            Vec::new()
        })
    }

    fn save_pending(&self, operations: &[PendingOperation]) -> StoreResult<()> {
        self.check_writable()?;
        let json = serde_json::to_string(operations)?;
        self.slots()?.pending = Some(json);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.check_writable()?;
        let mut slots = self.slots()?;
        slots.cart = None;
        slots.pending = None;
        Ok(())
    }
}
