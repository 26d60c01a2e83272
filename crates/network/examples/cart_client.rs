// crates/network/examples/cart_client.rs
//! Talks to a running cart backend directly
//!
//! ```text
//! cargo run --example cart_client -- http://localhost:8080/api
//! ```

use cartsync_core::{LineId, PendingOperation, ProductId};
use cartsync_network::{
    Client, ClientConfig, ConnectivityChecker, HttpCartTransport, HttpNotificationSource,
};
use cartsync_sync_engine::{CartTransport, NotificationSource};
use futures::StreamExt;
use rust_decimal::Decimal;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| ClientConfig::default().base_url);
    let client = Client::with_config(ClientConfig {
        base_url,
        ..ClientConfig::default()
    })?;

    let checker = ConnectivityChecker::new(client.clone());
    match checker.estimate_latency().await {
        Ok(latency) => println!("Backend reachable ({:?})", latency),
        Err(e) => {
            println!("Backend unreachable: {}", e);
            return Ok(());
        }
    }

    let transport = HttpCartTransport::new(client.clone());
    let op = PendingOperation::add(
        ProductId::from("demo-sku"),
        LineId::new(),
        1,
        Decimal::new(1999, 2),
        None,
    );
    let reply = transport.submit(std::slice::from_ref(&op)).await?;
    println!("Add demo-sku: {:?}", reply.outcomes);

    let cart = transport.fetch_cart().await?;
    println!(
        "Server cart revision {} with {} line(s)",
        cart.server_revision,
        cart.lines.len()
    );

    let source = HttpNotificationSource::new(client).with_poll_timeout(Duration::from_secs(5));
    let mut stream = source.connect().await?;
    if let Ok(Some(notification)) =
        tokio::time::timeout(Duration::from_secs(5), stream.next()).await
    {
        println!("First notification: {:?}", notification);
    }
    Ok(())
}
