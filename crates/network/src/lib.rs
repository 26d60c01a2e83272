// crates/network/src/lib.rs
//! HTTP plumbing between the cart engine and the storefront backend

mod client;
mod connectivity;
mod error;
mod notifications;
mod transport;

pub use client::{Client, ClientConfig, IDEMPOTENCY_HEADER};
pub use connectivity::ConnectivityChecker;
pub use error::{NetworkError, NetworkResult};
pub use notifications::HttpNotificationSource;
pub use transport::HttpCartTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        // Verify all types are exported
        let client = Client::new().expect("Failed to create client");
        let _: HttpCartTransport = HttpCartTransport::new(client.clone());
        let _: HttpNotificationSource = HttpNotificationSource::new(client.clone());
        let _: ConnectivityChecker = ConnectivityChecker::new(client);
    }
}
