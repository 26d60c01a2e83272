// crates/sync-engine/examples/sync_demo.rs
//! Demonstration of optimistic cart sync against a flaky backend

use async_trait::async_trait;
use cartsync_core::{
    Notification, PendingOperation, RejectionReason, ServerCartSnapshot, SubmitReply,
};
use cartsync_store::MemoryStore;
use cartsync_sync_engine::{CartEvent, CartTransport, SyncConfig, SyncEngine, TransportError};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fails every third call and refuses product "sold-out"
struct FlakyBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl CartTransport for FlakyBackend {
    async fn submit(&self, operations: &[PendingOperation]) -> Result<SubmitReply, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % 3 == 0 {
            return Err(TransportError::Connection("simulated drop".to_string()));
        }
        let op = &operations[0];
        if op.product_id.as_str() == "sold-out" {
            Ok(SubmitReply::rejected(RejectionReason::OutOfStock))
        } else {
            Ok(SubmitReply::confirmed(operations.len()))
        }
    }

    async fn fetch_cart(&self) -> Result<ServerCartSnapshot, TransportError> {
        Ok(ServerCartSnapshot::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Cart Sync Engine Demo");
    println!("=====================\n");

    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::new(FlakyBackend {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(MemoryStore::new()),
    )
    .with_event_callback(Arc::new(|event: &CartEvent| match event {
        CartEvent::Confirmed { product_id, .. } => println!("  ✓ {} confirmed", product_id),
        CartEvent::Rejected {
            product_id, reason, ..
        } => println!("  ✗ {} rejected: {}", product_id, reason),
        CartEvent::PriceUpdated {
            product_id,
            unit_price,
        } => println!("  $ {} now costs {}", product_id, unit_price),
        _ => {}
    }));

    println!("1. Offline edits");
    let coffee = engine.add_item("coffee", 2, Decimal::new(1250, 2))?;
    engine.add_item("mug", 1, Decimal::new(800, 2))?;
    engine.add_item("sold-out", 1, Decimal::new(4000, 2))?;
    engine.set_quantity(&coffee, 3)?;
    println!(
        "  Total {} with {} pending operations",
        engine.total()?,
        engine.pending()?.len()
    );

    println!("\n2. Back online");
    engine.set_online(true)?;
    while !engine.pending()?.is_empty() {
        let report = engine.sync_once().await?;
        if let Some(error) = report.transport_error {
            println!("  ! {} (retrying)", error);
        }
    }
    println!("  Total {}", engine.total()?);

    println!("\n3. Price push");
    engine.ingest(&Notification::price_changed("mug", 1, Decimal::new(650, 2)))?;
    println!("  Total {}", engine.total()?);

    Ok(())
}
