// crates/network/src/transport.rs
//! REST implementation of `CartTransport`
//!
//! | Operation   | Request                                  |
//! |-------------|------------------------------------------|
//! | Add         | `POST {base}/cart/items`                 |
//! | SetQuantity | `PUT {base}/cart/items/{product_id}`     |
//! | Remove      | `DELETE {base}/cart/items/{product_id}`  |
//! | fetch cart  | `GET {base}/cart`                        |
//!
//! 2xx confirms (the body may carry a cart snapshot), 404 means the product
//! is gone, 409 carries a `reason`, other 4xx are refusals, and 5xx or
//! connection problems are transport errors.

use crate::client::Client;
use crate::error::NetworkError;
use async_trait::async_trait;
use cartsync_core::{
    OpId, OperationKind, OperationOutcome, PendingOperation, ProductId, RejectionReason,
    ServerCartSnapshot, SubmitReply,
};
use cartsync_sync_engine::{CartTransport, TransportError};
use reqwest::{Method, StatusCode};
use serde::Serialize;

#[derive(Serialize)]
struct AddItemBody<'a> {
    product_id: &'a ProductId,
    quantity: u32,
    op_id: &'a OpId,
}

#[derive(Serialize)]
struct UpdateItemBody<'a> {
    quantity: u32,
    op_id: &'a OpId,
}

/// Sends cart operations to a REST backend, one request per operation
#[derive(Clone)]
pub struct HttpCartTransport {
    client: Client,
}

impl HttpCartTransport {
    /// Creates a transport on top of a configured client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn submit_one(
        &self,
        op: &PendingOperation,
    ) -> Result<(OperationOutcome, Option<ServerCartSnapshot>), TransportError> {
        let key = op.op_id.as_string();
        let quantity = op.quantity.unwrap_or(0);

        let response = match op.kind {
            OperationKind::Add => {
                let body = AddItemBody {
                    product_id: &op.product_id,
                    quantity,
                    op_id: &op.op_id,
                };
                self.client
                    .send_json(Method::POST, &["cart", "items"], &key, Some(&body))
                    .await
            }
            OperationKind::SetQuantity => {
                let body = UpdateItemBody {
                    quantity,
                    op_id: &op.op_id,
                };
                self.client
                    .send_json(
                        Method::PUT,
                        &["cart", "items", op.product_id.as_str()],
                        &key,
                        Some(&body),
                    )
                    .await
            }
            OperationKind::Remove => {
                self.client
                    .send_json::<()>(
                        Method::DELETE,
                        &["cart", "items", op.product_id.as_str()],
                        &key,
                        None,
                    )
                    .await
            }
        }?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from(NetworkError::Http(e)))?;
        log::debug!("{:?} {} -> {}", op.kind, op.product_id, status);
        classify(op.kind, status, &body)
    }
}

#[async_trait]
impl CartTransport for HttpCartTransport {
    /// Submits each operation in turn
    ///
    /// A transport error part-way fails the whole call; the engine resends
    /// with the same operation IDs and the backend deduplicates them.
    async fn submit(&self, operations: &[PendingOperation]) -> Result<SubmitReply, TransportError> {
        let mut reply = SubmitReply::default();
        for op in operations {
            let (outcome, snapshot) = self.submit_one(op).await?;
            reply.outcomes.push(outcome);
            if snapshot.is_some() {
                reply.snapshot = snapshot;
            }
        }
        Ok(reply)
    }

    async fn fetch_cart(&self) -> Result<ServerCartSnapshot, TransportError> {
        let response = self.client.get(&["cart"], &[]).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Server {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        response
            .json::<ServerCartSnapshot>()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

/// Maps an HTTP answer to an operation outcome
pub(crate) fn classify(
    kind: OperationKind,
    status: StatusCode,
    body: &str,
) -> Result<(OperationOutcome, Option<ServerCartSnapshot>), TransportError> {
    if status.is_success() {
        let snapshot = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<ServerCartSnapshot>(body).ok()
        };
        return Ok((OperationOutcome::Confirmed, snapshot));
    }

    match status {
        // already gone counts as removed
        StatusCode::NOT_FOUND if kind == OperationKind::Remove => {
            Ok((OperationOutcome::Confirmed, None))
        }
        StatusCode::NOT_FOUND => Ok((
            OperationOutcome::Rejected(RejectionReason::ProductRemoved),
            None,
        )),
        StatusCode::CONFLICT => {
            let reason = serde_json::from_str::<RejectionReason>(body).unwrap_or_else(|_| {
                RejectionReason::Other {
                    message: body.trim().to_string(),
                }
            });
            Ok((OperationOutcome::Rejected(reason), None))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Err(TransportError::Server {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            })
        }
        s if s.is_client_error() => Ok((
            OperationOutcome::Rejected(RejectionReason::Other {
                message: format!("HTTP {}", s.as_u16()),
            }),
            None,
        )),
        s => Err(TransportError::Server {
            status: s.as_u16(),
            message: if body.trim().is_empty() {
                s.canonical_reason().unwrap_or("Unknown").to_string()
            } else {
                body.trim().to_string()
            },
        }),
    }
}
