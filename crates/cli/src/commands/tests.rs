use super::*;
use crate::session::{client_config, sync_config, SessionOptions};
use cartsync_config::Config;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn open_session(dir: &Path, base_url: &str, offline: bool) -> CartSession {
    let mut config = Config::default();
    config.backend.base_url = base_url.to_string();
    config.sync.request_timeout_secs = 2;
    config.sync.max_attempts = 2;
    config.sync.initial_delay_ms = 10;
    config.sync.max_delay_ms = 20;

    let options = SessionOptions {
        data_dir: Some(dir.to_path_buf()),
        offline,
    };
    CartSession::open(config, options, None).unwrap()
}

fn args(argv: &[&str]) -> ArgMatches {
    let matches = crate::build_cli().try_get_matches_from(argv).unwrap();
    let (_, sub_matches) = matches.subcommand().unwrap();
    sub_matches.clone()
}

/// Answers every request with the status and body chosen by `route`
async fn fake_backend(route: fn(&str, &str) -> (u16, &'static str)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut len = 0;
                loop {
                    let n = socket.read(&mut buf[len..]).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    len += n;
                    let text = String::from_utf8_lossy(&buf[..len]).to_string();
                    if let Some(head_end) = text.find("\r\n\r\n") {
                        let body_len = text[..head_end]
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .and_then(|v| v.trim().parse::<usize>().ok())
                            })
                            .unwrap_or(0);
                        if len >= head_end + 4 + body_len {
                            break;
                        }
                    }
                }

                let text = String::from_utf8_lossy(&buf[..len]).to_string();
                let mut request_line = text.lines().next().unwrap_or("").split_whitespace();
                let method = request_line.next().unwrap_or("");
                let path = request_line.next().unwrap_or("");
                let (status, body) = route(method, path);

                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/api", addr)
}

#[test]
fn test_sync_config_from_section() {
    let config = Config::default();
    let sync = sync_config(&config.sync);
    assert_eq!(sync.retry_policy.max_attempts(), 5);
    assert_eq!(sync.retry_policy.max_delay(), Duration::from_secs(30));
    assert_eq!(sync.request_timeout, Duration::from_secs(10));
    assert_eq!(sync.max_batch_size, 20);
    assert_eq!(sync.initial_connectivity, None);

    let client = client_config(&config.backend, &config.sync);
    assert_eq!(client.base_url, "http://localhost:8080/api");
    assert_eq!(client.timeout, Duration::from_secs(10));
}

#[test]
fn test_parse_inputs() {
    assert_eq!(parse_quantity(" 3 ").unwrap(), 3);
    assert!(parse_quantity("three").is_err());
    assert_eq!(parse_price("12.50").unwrap(), Decimal::new(1250, 2));
    assert!(parse_price("12,50").is_err());
}

#[tokio::test]
async fn test_add_set_remove_are_local_and_queued() {
    let temp = TempDir::new().unwrap();
    let session = open_session(temp.path(), "http://127.0.0.1:9/api", true);

    add_item(&session, &args(&["cartsync", "add", "sku-1", "2", "4.50"])).unwrap();
    add_item(&session, &args(&["cartsync", "add", "sku-2", "1", "10"])).unwrap();
    set_quantity(&session, &args(&["cartsync", "set", "sku-1", "5"])).unwrap();
    remove_item(&session, &args(&["cartsync", "remove", "sku-2"])).unwrap();

    let cart = session.engine.cart().unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.item_count(), 5);
    assert_eq!(cart.total(), Decimal::new(2250, 2));
    assert_eq!(session.engine.pending().unwrap().len(), 4);
}

#[tokio::test]
async fn test_invalid_input_leaves_cart_untouched() {
    let temp = TempDir::new().unwrap();
    let session = open_session(temp.path(), "http://127.0.0.1:9/api", true);

    assert!(add_item(&session, &args(&["cartsync", "add", "sku-1", "0", "4.50"])).is_err());
    assert!(add_item(&session, &args(&["cartsync", "add", "sku-1", "1", "cheap"])).is_err());
    assert!(remove_item(&session, &args(&["cartsync", "remove", "missing"])).is_err());

    assert!(session.engine.cart().unwrap().is_empty());
    assert!(session.engine.pending().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_survives_between_sessions() {
    let temp = TempDir::new().unwrap();
    {
        let session = open_session(temp.path(), "http://127.0.0.1:9/api", true);
        add_item(&session, &args(&["cartsync", "add", "sku-1", "2", "4.50"])).unwrap();
    }

    let session = open_session(temp.path(), "http://127.0.0.1:9/api", true);
    assert_eq!(session.engine.item_count().unwrap(), 2);
    assert_eq!(session.engine.pending().unwrap().len(), 1);
    show_cart(&session, &args(&["cartsync", "show"])).unwrap();
    show_cart(&session, &args(&["cartsync", "show", "--json"])).unwrap();
}

#[tokio::test]
async fn test_clear_and_logout() {
    let temp = TempDir::new().unwrap();
    let session = open_session(temp.path(), "http://127.0.0.1:9/api", true);
    add_item(&session, &args(&["cartsync", "add", "sku-1", "2", "4.50"])).unwrap();

    clear_cart(&session, &args(&["cartsync", "clear"])).unwrap();
    assert!(session.engine.cart().unwrap().is_empty());
    assert!(session.engine.pending().unwrap().is_empty());

    add_item(&session, &args(&["cartsync", "add", "sku-1", "1", "4.50"])).unwrap();
    clear_cart(&session, &args(&["cartsync", "clear", "--logout"])).unwrap();

    let reopened = open_session(temp.path(), "http://127.0.0.1:9/api", true);
    assert!(reopened.engine.cart().unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_while_offline_keeps_queue() {
    let temp = TempDir::new().unwrap();
    let session = open_session(temp.path(), "http://127.0.0.1:9/api", false);
    add_item(&session, &args(&["cartsync", "add", "sku-1", "2", "4.50"])).unwrap();

    let summary = sync(&session).await.unwrap();
    assert!(!summary.online);
    assert_eq!(summary.remaining, 1);
    assert_eq!(session.engine.item_count().unwrap(), 2);
    status(&session).await.unwrap();
}

#[tokio::test]
async fn test_sync_pushes_queue_and_reconciles() {
    let base = fake_backend(|method, path| match (method, path) {
        ("GET", "/api/cart") => (
            200,
            r#"{"lines":[{"product_id":"sku-1","quantity":2,"unit_price":"4.25"}],"server_revision":3}"#,
        ),
        ("POST", _) => (201, ""),
        _ => (200, ""),
    })
    .await;

    let temp = TempDir::new().unwrap();
    let session = open_session(temp.path(), &base, false);
    add_item(&session, &args(&["cartsync", "add", "sku-1", "2", "4.50"])).unwrap();

    let summary = sync(&session).await.unwrap();
    assert!(summary.online);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.remaining, 0);
    assert!(summary.reconciled);

    // the server's price wins once nothing is pending
    assert_eq!(session.engine.total().unwrap(), Decimal::new(850, 2));
}

#[tokio::test]
async fn test_sync_gives_up_after_retry_budget() {
    let base = fake_backend(|method, _| match method {
        "HEAD" => (200, ""),
        _ => (503, ""),
    })
    .await;

    let temp = TempDir::new().unwrap();
    let session = open_session(temp.path(), &base, false);
    add_item(&session, &args(&["cartsync", "add", "sku-1", "1", "4.50"])).unwrap();

    let summary = sync(&session).await.unwrap();
    assert_eq!(summary.permanently_failed, 1);
    assert_eq!(summary.transport_errors, 2);
    assert_eq!(summary.remaining, 0);
    // the line stays local, flagged for the user
    assert_eq!(session.engine.item_count().unwrap(), 1);
    assert_eq!(session.engine.line_issues().unwrap().len(), 1);
}

#[test]
fn test_config_set_and_get() {
    let temp = TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(temp.path());

    config(&manager, &args(&["cartsync", "config", "init"])).unwrap();
    config(
        &manager,
        &args(&["cartsync", "config", "set", "sync.max_attempts", "9"]),
    )
    .unwrap();
    assert_eq!(manager.load().unwrap().sync.max_attempts, 9);

    assert!(config(
        &manager,
        &args(&["cartsync", "config", "set", "sync.max_attempts", "0"])
    )
    .is_err());
    assert!(config(
        &manager,
        &args(&["cartsync", "config", "get", "nope.key"])
    )
    .is_err());
    config(&manager, &args(&["cartsync", "config", "validate"])).unwrap();
}
