//! Integration tests for local stores

use cartsync_core::{CartLine, CartState, LineId, PendingOperation, ProductId};
use cartsync_store::{FileStore, LocalStore, MemoryStore};
use rust_decimal::Decimal;
use tempfile::TempDir;

fn cart_with(lines: &[(&str, u32, i64)], revision: u64) -> CartState {
    CartState {
        lines: lines
            .iter()
            .map(|(sku, qty, cents)| CartLine::new(ProductId::from(*sku), *qty, Decimal::new(*cents, 2)))
            .collect(),
        revision,
    }
}

fn assert_roundtrip(store: &dyn LocalStore) {
    let states = [
        CartState::new(),
        cart_with(&[("sku-1", 1, 1000)], 1),
        cart_with(&[("sku-1", 3, 1000), ("sku-2", 1, 4999), ("sku-3", 12, 1)], 9),
    ];

    for state in states {
        store.save(&state).expect("save should succeed");
        assert_eq!(store.load(), Some(state));
    }
}

#[test]
fn test_memory_store_roundtrip() {
    assert_roundtrip(&MemoryStore::new());
}

#[test]
fn test_file_store_roundtrip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert_roundtrip(&FileStore::new(temp_dir.path()));
}

#[test]
fn test_file_store_survives_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = cart_with(&[("sku-1", 2, 1000)], 4);
    let pending = vec![PendingOperation::set_quantity(
        ProductId::from("sku-1"),
        state.lines[0].line_id,
        2,
        None,
    )];

    {
        let store = FileStore::new(temp_dir.path());
        store.save(&state).unwrap();
        store.save_pending(&pending).unwrap();
    }

    let reopened = FileStore::new(temp_dir.path());
    assert_eq!(reopened.load(), Some(state));
    assert_eq!(reopened.load_pending(), pending);
}

#[test]
fn test_overwrite_replaces_whole_value() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileStore::new(temp_dir.path());

    store
        .save(&cart_with(&[("sku-1", 1, 100), ("sku-2", 1, 100)], 2))
        .unwrap();
    store.save(&cart_with(&[("sku-3", 1, 100)], 3)).unwrap();

    let loaded = store.load().expect("cart should load");
    assert_eq!(loaded.lines.len(), 1);
    assert_eq!(loaded.lines[0].product_id, ProductId::from("sku-3"));
}

#[test]
fn test_pending_ops_keep_insertion_order() {
    let store = MemoryStore::new();
    let line = LineId::new();
    let ops: Vec<PendingOperation> = (1..=5)
        .map(|q| PendingOperation::set_quantity(ProductId::from("sku-1"), line, q, None))
        .collect();

    store.save_pending(&ops).unwrap();
    let quantities: Vec<Option<u32>> = store.load_pending().iter().map(|o| o.quantity).collect();
    assert_eq!(quantities, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
}
