// FILE: crates/cli/src/commands.rs

use crate::session::{retry_policy, CartSession};
use anyhow::{anyhow, bail, Context, Result};
use cartsync_config::{ConfigManager, KEYS};
use cartsync_core::{LineId, OperationKind, ProductId};
use cartsync_sync_engine::{CartEvent, EventCallback, NotificationPump, SyncReport};
use clap::ArgMatches;
use console::style;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Prints cart events as they happen
pub fn print_event() -> EventCallback {
    Arc::new(|event: &CartEvent| match event {
        CartEvent::Confirmed { product_id, .. } => {
            println!("{} {} confirmed", style("✓").green().bold(), product_id)
        }
        CartEvent::Rejected {
            product_id, reason, ..
        } => println!(
            "{} {} rejected: {}",
            style("✗").red().bold(),
            product_id,
            reason
        ),
        CartEvent::PermanentFailure {
            product_id,
            attempts,
            ..
        } => println!(
            "{} {} gave up after {} attempts",
            style("✗").red().bold(),
            product_id,
            attempts
        ),
        CartEvent::PriceUpdated {
            product_id,
            unit_price,
        } => println!("{} {} now costs {}", style("$").cyan(), product_id, unit_price),
        CartEvent::StockChanged {
            product_id,
            available,
        } => println!(
            "{} {} has {} in stock",
            style("!").yellow(),
            product_id,
            available
        ),
        CartEvent::ProductRemoved { product_id } => println!(
            "{} {} is no longer sold",
            style("✗").red(),
            product_id
        ),
        CartEvent::StatusChanged { to, .. } => log::debug!("Sync status {}", to),
        CartEvent::Reconciled { server_revision } => {
            log::debug!("Merged server cart revision {}", server_revision)
        }
    })
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} is required", name))
}

fn parse_quantity(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid quantity '{}'", raw))
}

fn parse_price(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("Invalid price '{}'", raw))
}

/// Finds the line holding a product
fn line_for(session: &CartSession, product: &str) -> Result<LineId> {
    let cart = session.engine.cart()?;
    cart.line_for_product(&ProductId::from(product))
        .map(|line| line.line_id.clone())
        .ok_or_else(|| anyhow!("Product {} is not in the cart", product))
}

fn print_queued(session: &CartSession) -> Result<()> {
    let pending = session.engine.pending()?.len();
    println!(
        "  {} operation(s) queued, run 'cartsync sync' to send",
        pending
    );
    Ok(())
}

/// Add units of a product
pub fn add_item(session: &CartSession, matches: &ArgMatches) -> Result<()> {
    let product = required(matches, "product")?;
    let quantity = parse_quantity(required(matches, "quantity")?)?;
    let price = parse_price(required(matches, "price")?)?;

    session
        .engine
        .add_item(product, quantity, price)
        .context("Failed to add item")?;

    println!(
        "{} Added {} x {} at {}",
        style("✓").green().bold(),
        quantity,
        product,
        price
    );
    print_queued(session)
}

/// Remove a product's line
pub fn remove_item(session: &CartSession, matches: &ArgMatches) -> Result<()> {
    let product = required(matches, "product")?;
    let line_id = line_for(session, product)?;

    session
        .engine
        .remove_line(&line_id)
        .context("Failed to remove item")?;

    println!("{} Removed {}", style("✓").green().bold(), product);
    print_queued(session)
}

/// Set a product's quantity
pub fn set_quantity(session: &CartSession, matches: &ArgMatches) -> Result<()> {
    let product = required(matches, "product")?;
    let quantity = parse_quantity(required(matches, "quantity")?)?;
    let line_id = line_for(session, product)?;

    session
        .engine
        .set_quantity(&line_id, quantity)
        .context("Failed to update quantity")?;

    if quantity == 0 {
        println!("{} Removed {}", style("✓").green().bold(), product);
    } else {
        println!("{} {} set to {}", style("✓").green().bold(), product, quantity);
    }
    print_queued(session)
}

/// Show the cart
pub fn show_cart(session: &CartSession, matches: &ArgMatches) -> Result<()> {
    let cart = session.engine.cart()?;

    if matches.get_flag("json") {
        let json = serde_json::to_string_pretty(&cart).context("Failed to encode cart")?;
        println!("{}", json);
        return Ok(());
    }

    if cart.is_empty() {
        println!("Cart is empty. Use 'add' to put products in it.");
        return Ok(());
    }

    let pending: HashSet<ProductId> = session
        .engine
        .pending()?
        .into_iter()
        .map(|op| op.product_id)
        .collect();

    println!(
        "\n{} ({} items)",
        style("Cart").bold().cyan(),
        cart.item_count()
    );
    println!("{}", "=".repeat(60));
    for line in &cart.lines {
        let marker = if pending.contains(&line.product_id) {
            style("*").yellow().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {:<24} {:>5} x {:>10} = {:>10}",
            marker,
            line.product_id,
            line.quantity,
            line.unit_price_snapshot,
            line.subtotal()
        );
    }
    println!("{}", "-".repeat(60));
    println!("  {:<44} {:>10}", style("Total").bold(), cart.total());
    if !pending.is_empty() {
        println!("  {} not yet confirmed by the server", style("*").yellow());
    }
    Ok(())
}

/// Empty the cart
pub fn clear_cart(session: &CartSession, matches: &ArgMatches) -> Result<()> {
    if matches.get_flag("logout") {
        session.engine.logout().context("Failed to log out")?;
        println!(
            "{} Cart cleared and stored files removed",
            style("✓").green().bold()
        );
    } else {
        session.engine.clear().context("Failed to clear cart")?;
        println!("{} Cart cleared", style("✓").green().bold());
    }
    Ok(())
}

/// Totals across the sync cycles of one `sync` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub online: bool,
    pub confirmed: usize,
    pub rejected: usize,
    pub permanently_failed: usize,
    pub transport_errors: usize,
    pub reconciled: bool,
    pub remaining: usize,
}

impl SyncSummary {
    fn absorb(&mut self, report: &SyncReport) {
        self.confirmed += report.confirmed;
        self.rejected += report.rejected;
        self.permanently_failed += report.permanently_failed;
        if report.transport_error.is_some() {
            self.transport_errors += 1;
        }
    }
}

/// Push queued operations, backing off between failed attempts, then
/// merge the server's cart
pub async fn sync(session: &CartSession) -> Result<SyncSummary> {
    let engine = &session.engine;
    let mut summary = SyncSummary::default();

    if !session.check_online().await? {
        summary.remaining = engine.pending()?.len();
        println!(
            "{} Backend unreachable, {} operation(s) stay queued",
            style("!").yellow().bold(),
            summary.remaining
        );
        return Ok(summary);
    }
    summary.online = true;

    loop {
        let report = engine.sync_once().await.context("Sync failed")?;
        summary.absorb(&report);

        match (&report.transport_error, report.retry_in) {
            (Some(error), Some(delay)) => {
                println!(
                    "{} {} (retrying in {:.1}s)",
                    style("!").yellow(),
                    error,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            _ => break,
        }
    }

    if engine.pending()?.is_empty() {
        match engine.refresh_from_server().await {
            Ok(merged) => summary.reconciled = merged,
            Err(e) => log::warn!("Could not fetch the server cart: {}", e),
        }
    }
    summary.remaining = engine.pending()?.len();

    println!(
        "\nSynced: {} confirmed, {} rejected, {} failed, {} still queued",
        style(summary.confirmed).green(),
        style(summary.rejected).red(),
        summary.permanently_failed,
        summary.remaining
    );
    Ok(summary)
}

/// Keep the cart in sync and follow server notifications until Ctrl-C
pub async fn watch(session: &CartSession) -> Result<()> {
    if session.options.offline {
        bail!("--offline cannot be combined with --watch");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine = Arc::clone(&session.engine);

    let engine_task = tokio::spawn(Arc::clone(&engine).run(shutdown_rx.clone()));

    let checker = session.checker.clone();
    let interval = session.config.backend.connectivity_interval();
    let monitor_engine = Arc::clone(&engine);
    let monitor_rx = shutdown_rx.clone();
    let monitor_task = tokio::spawn(async move {
        checker.monitor(monitor_engine, interval, monitor_rx).await
    });

    let source = Arc::new(session.notifications.clone());
    let pump = NotificationPump::new(source, retry_policy(&session.config.sync));
    let sink_engine = Arc::clone(&engine);
    let pump_rx = shutdown_rx.clone();
    let pump_task = tokio::spawn(async move {
        pump.run(
            move |notification| {
                if let Err(e) = sink_engine.ingest(&notification) {
                    log::warn!("Failed to apply notification: {}", e);
                }
            },
            pump_rx,
        )
        .await
    });

    println!("Watching the cart, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    shutdown_tx.send(true).ok();
    engine_task.await.context("Sync task failed")?;
    monitor_task.await.context("Connectivity task failed")?;
    let stats = pump_task.await.context("Notification task failed")?;

    println!(
        "\nStopped. {} notification(s) received, {} operation(s) still queued",
        stats.delivered,
        engine.pending()?.len()
    );
    Ok(())
}

/// Show connectivity and the queue
pub async fn status(session: &CartSession) -> Result<()> {
    let online = session.check_online().await?;
    let engine = &session.engine;
    let cart = engine.cart()?;
    let pending = engine.pending()?;

    println!("\n{}", style("Cart Status").bold().cyan());
    println!("{}", "=".repeat(60));
    println!("Backend:   {}", session.config.backend.base_url);
    println!(
        "Reachable: {}",
        if online {
            style("yes").green()
        } else {
            style("no").red()
        }
    );
    println!("Store:     {}", session.store_dir.display());
    println!(
        "Cart:      {} line(s), {} item(s), total {}",
        cart.lines.len(),
        cart.item_count(),
        cart.total()
    );
    println!("Queued:    {}", pending.len());

    for op in &pending {
        let detail = match (op.kind, op.quantity) {
            (OperationKind::Remove, _) | (_, None) => String::new(),
            (_, Some(quantity)) => format!(" qty {}", quantity),
        };
        println!(
            "  {:?} {}{} (attempts {}, queued {})",
            op.kind,
            op.product_id,
            detail,
            op.attempts,
            op.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// `config` subcommands
pub fn config(manager: &ConfigManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => {
            let config = manager.load_effective().context("Failed to load config")?;
            for key in KEYS {
                println!("{} = {}", key, config.get(key)?);
            }
        }
        Some(("path", _)) => println!("{}", manager.config_path().display()),
        Some(("init", _)) => {
            if manager.init().context("Failed to write config")? {
                println!(
                    "{} Created {}",
                    style("✓").green().bold(),
                    manager.config_path().display()
                );
            } else {
                println!("Config already exists at {}", manager.config_path().display());
            }
        }
        Some(("validate", _)) => {
            let problems = manager.problems().context("Failed to read config")?;
            if problems.is_empty() {
                println!("{} Config is valid", style("✓").green().bold());
            } else {
                for problem in &problems {
                    println!("{} {}", style("✗").red().bold(), problem);
                }
                bail!("{} invalid value(s)", problems.len());
            }
        }
        Some(("get", sub_matches)) => {
            let key = required(sub_matches, "key")?;
            let config = manager.load().context("Failed to load config")?;
            println!("{}", config.get(key)?);
        }
        Some(("set", sub_matches)) => {
            let key = required(sub_matches, "key")?;
            let value = required(sub_matches, "value")?;
            let config = manager.set(key, value)?;
            println!("{} {} = {}", style("✓").green().bold(), key, config.get(key)?);
        }
        _ => bail!("Unknown config command"),
    }
    Ok(())
}

#[cfg(test)]
mod tests;
