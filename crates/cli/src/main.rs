// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

mod commands;
mod session;

fn build_cli() -> Command {
    Command::new("cartsync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Alpha Storefront")
        .about("Local-first shopping cart that syncs with the storefront backend")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding cartsync.toml (defaults to the platform config dir)")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for cart files, overriding store.data_dir")
                .global(true),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Do not contact the backend")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("add")
                .about("Add units of a product to the cart")
                .arg(Arg::new("product").required(true).value_name("PRODUCT_ID").help("Product identifier"))
                .arg(Arg::new("quantity").required(true).value_name("QTY").help("Units to add").allow_negative_numbers(true))
                .arg(Arg::new("price").required(true).value_name("PRICE").help("Unit price, e.g. 12.50")),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a product's line from the cart")
                .arg(Arg::new("product").required(true).value_name("PRODUCT_ID").help("Product identifier")),
        )
        .subcommand(
            Command::new("set")
                .about("Set the quantity of a product's line (0 removes it)")
                .arg(Arg::new("product").required(true).value_name("PRODUCT_ID").help("Product identifier"))
                .arg(Arg::new("quantity").required(true).value_name("QTY").help("New quantity").allow_negative_numbers(true)),
        )
        .subcommand(
            Command::new("show")
                .about("Show the cart")
                .arg(Arg::new("json").long("json").help("Print the cart as JSON").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("clear")
                .about("Empty the cart and drop queued operations")
                .arg(Arg::new("logout").long("logout").help("Also delete the stored cart files").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("sync")
                .about("Push queued operations and reconcile with the server")
                .arg(Arg::new("watch").short('w').long("watch").help("Keep syncing and follow server notifications until Ctrl-C").action(ArgAction::SetTrue)),
        )
        .subcommand(Command::new("status").about("Show connectivity and queued operations"))
        .subcommand(
            Command::new("config")
                .about("Inspect or change configuration")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(Command::new("init").about("Write a default config file if none exists"))
                .subcommand(Command::new("validate").about("Check the config file for invalid values"))
                .subcommand(
                    Command::new("get")
                        .about("Print one value")
                        .arg(Arg::new("key").required(true).value_name("SECTION.FIELD")),
                )
                .subcommand(
                    Command::new("set")
                        .about("Change one value")
                        .arg(Arg::new("key").required(true).value_name("SECTION.FIELD"))
                        .arg(Arg::new("value").required(true).value_name("VALUE").allow_hyphen_values(true)),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = build_cli().get_matches();

    let manager = match matches.get_one::<String>("config-dir") {
        Some(dir) => cartsync_config::ConfigManager::with_directory(dir),
        None => cartsync_config::ConfigManager::new().context("Failed to locate configuration")?,
    };

    if let Some(("config", sub_matches)) = matches.subcommand() {
        return commands::config(&manager, sub_matches);
    }

    let config = manager
        .load_effective()
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config: {}, using defaults", e);
            cartsync_config::Config::default()
        });
    let options = session::SessionOptions {
        data_dir: matches.get_one::<String>("data-dir").map(PathBuf::from),
        offline: matches.get_flag("offline"),
    };
    let session = session::CartSession::open(config, options, Some(commands::print_event()))
        .context("Failed to open cart")?;

    match matches.subcommand() {
        Some(("add", sub_matches)) => commands::add_item(&session, sub_matches),
        Some(("remove", sub_matches)) => commands::remove_item(&session, sub_matches),
        Some(("set", sub_matches)) => commands::set_quantity(&session, sub_matches),
        Some(("show", sub_matches)) => commands::show_cart(&session, sub_matches),
        Some(("clear", sub_matches)) => commands::clear_cart(&session, sub_matches),
        Some(("sync", sub_matches)) if sub_matches.get_flag("watch") => {
            commands::watch(&session).await
        }
        Some(("sync", _)) => commands::sync(&session).await.map(|_| ()),
        Some(("status", _)) => commands::status(&session).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["cartsync", "show", "--offline", "-d", "/tmp/carts"])
            .unwrap();
        assert!(matches.get_flag("offline"));
        assert_eq!(
            matches.get_one::<String>("data-dir").map(String::as_str),
            Some("/tmp/carts")
        );
    }

    #[test]
    fn test_config_requires_subcommand() {
        assert!(build_cli()
            .try_get_matches_from(["cartsync", "config"])
            .is_err());
    }
}
