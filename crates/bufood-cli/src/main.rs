//! bufood - a command-line client for the BU Foods storefront.
//!
//! Favorites and the cart render from the local cache first and are
//! revalidated against the backend. `bufood watch` keeps a live view that
//! refreshes on an interval and on demand.

mod format;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bufood_core::{
    ApiClient, CacheManager, ClientCacheReconciler, Config, EntityKind, FavoritesSession, FileStore,
    KeyValueStore, LoadPhase, RefreshTrigger, StartMode, StorefrontApi, TokenStore,
};

// ============================================================================
// Constants
// ============================================================================

const USAGE: &str = "\
Usage: bufood <command>

Commands:
  favorites [products|stores] [--cached]   Show favorites (default)
  toggle <product|store> <id>              Add or remove a favorite
  cart                                     Show the cart
  cart add <product-id> [qty]              Add to cart (default qty 1)
  cart set <product-id> <qty>              Change a line's quantity
  cart remove <product-id>                 Remove a line
  cart clear                               Empty the cart
  watch                                    Live view; f=focus v=visible r=refresh c=clear error q=quit
  login <account> <token>                  Save a token to the keychain
  logout                                   Forget the current account

Environment: BUFOOD_API_BASE_URL, BUFOOD_TOKEN, RUST_LOG";

/// Log file written by `watch`, inside the cache directory
const WATCH_LOG_FILE: &str = "bufood-watch.log";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Like `init_tracing`, plus a non-blocking log file under `log_dir`.
/// Stderr output would interleave with the live view, so it stays at `warn`
/// unless `RUST_LOG` says otherwise; the file gets `info` by default.
fn init_watch_tracing(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, WATCH_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(stderr_filter))
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_filter(file_filter))
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("favorites");
    let rest = args.get(1..).unwrap_or_default();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using default configuration", e);
        Config::default()
    });

    let _log_guard = if command == "watch" {
        let log_dir = config.cache_dir()?;
        std::fs::create_dir_all(&log_dir)?;
        Some(init_watch_tracing(&log_dir))
    } else {
        init_tracing();
        None
    };
    info!(command, "bufood starting");

    match command {
        "favorites" => favorites(&config, rest).await,
        "toggle" => toggle(&config, rest).await,
        "cart" => cart(&config, rest).await,
        "watch" => watch(&config).await,
        "login" => login(&mut config, rest),
        "logout" => logout(&mut config),
        "help" | "-h" | "--help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn open_backend(config: &Config) -> Result<(Arc<dyn StorefrontApi>, Arc<dyn KeyValueStore>)> {
    let client = ApiClient::new(&config.api_base_url())?;
    let client = match TokenStore::resolve(config.last_account.as_deref()) {
        Some(token) => client.with_token(token),
        None => client,
    };
    let store = FileStore::new(config.cache_dir()?).context("Failed to open cache directory")?;
    let api: Arc<dyn StorefrontApi> = Arc::new(client);
    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    Ok((api, store))
}

fn open_reconciler(config: &Config) -> Result<ClientCacheReconciler> {
    let (api, store) = open_backend(config)?;
    Ok(ClientCacheReconciler::new(api, CacheManager::new(store)))
}

fn parse_quantity(value: Option<&String>, default: Option<u32>) -> Result<u32> {
    match (value, default) {
        (Some(v), _) => v
            .parse()
            .with_context(|| format!("Invalid quantity '{}'", v)),
        (None, Some(d)) => Ok(d),
        (None, None) => bail!("Missing quantity\n\n{}", USAGE),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn favorites(config: &Config, args: &[String]) -> Result<()> {
    let cached_only = args.iter().any(|a| a == "--cached");
    let kind = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(|a| a.parse::<EntityKind>().map_err(anyhow::Error::msg))
        .transpose()?;

    let reconciler = open_reconciler(config)?;
    if reconciler.initial_load().await == StartMode::Warm && !cached_only {
        reconciler.run_refresh().await;
    }

    let view = reconciler.view();
    if let LoadPhase::Failed(message) = &view.phase {
        bail!("{}", message);
    }

    match kind {
        Some(EntityKind::Product) => print!("{}", format::render_products(&view.products)),
        Some(EntityKind::Store) => print!("{}", format::render_stores(&view.stores)),
        None => print!("{}", format::render_view(&view)),
    }
    if cached_only {
        println!("(cached {})", reconciler.cache().get_cache_ages().last_updated());
    }
    Ok(())
}

async fn toggle(config: &Config, args: &[String]) -> Result<()> {
    let (Some(kind), Some(id)) = (args.first(), args.get(1)) else {
        bail!("Usage: bufood toggle <product|store> <id>");
    };
    let kind: EntityKind = kind.parse().map_err(anyhow::Error::msg)?;

    let reconciler = open_reconciler(config)?;
    // Render state must be loaded so the cached list is updated, not replaced
    reconciler.initial_load().await;

    let now_favorite = reconciler.toggle_favorite(kind, id);
    if now_favorite {
        println!("Added {} {} to favorites", kind.label(), id);
    } else {
        println!("Removed {} {} from favorites", kind.label(), id);
    }
    Ok(())
}

async fn cart(config: &Config, args: &[String]) -> Result<()> {
    let reconciler = open_reconciler(config)?;
    reconciler.refresh_cart().await;

    let action = args.first().map(String::as_str);
    let result = match action {
        None => Ok(()),
        Some("add") => {
            let id = args.get(1).context("Missing product id")?;
            let quantity = parse_quantity(args.get(2), Some(1))?;
            reconciler.add_to_cart(id, quantity).await
        }
        Some("set") => {
            let id = args.get(1).context("Missing product id")?;
            let quantity = parse_quantity(args.get(2), None)?;
            reconciler.update_quantity(id, quantity).await
        }
        Some("remove") => {
            let id = args.get(1).context("Missing product id")?;
            reconciler.remove_from_cart(id).await
        }
        Some("clear") => reconciler.clear_cart().await,
        Some(other) => bail!("Unknown cart action '{}'\n\n{}", other, USAGE),
    };

    let view = reconciler.view();
    match &view.cart {
        Some(cart) => print!("{}", format::render_cart(cart)),
        None => println!("  Cart unavailable (offline and nothing cached)."),
    }
    result.map_err(Into::into)
}

async fn watch(config: &Config) -> Result<()> {
    let (api, store) = open_backend(config)?;
    let session = FavoritesSession::mount(api, store, config.refresh).await;
    let mut view_rx = session.subscribe();
    println!("{}", format::render_view(&view_rx.borrow_and_update()));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", format::render_view(&view_rx.borrow_and_update()));
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "f" => session.trigger(RefreshTrigger::Focus),
                    "v" => session.trigger(RefreshTrigger::Visibility(true)),
                    "r" => session.trigger(RefreshTrigger::Manual),
                    "c" => session.reconciler().dismiss_error(),
                    "q" => break,
                    "" => {}
                    other => eprintln!("Unknown input '{}' (f, v, r, c or q)", other),
                },
                // Keep running on the interval when stdin is closed
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.unmount().await;
    info!("bufood watch stopped");
    Ok(())
}

fn login(config: &mut Config, args: &[String]) -> Result<()> {
    let (Some(account), Some(token)) = (args.first(), args.get(1)) else {
        bail!("Usage: bufood login <account> <token>");
    };
    TokenStore::store(account, token)?;
    config.last_account = Some(account.clone());
    config.save()?;
    println!("Logged in as {}", account);
    Ok(())
}

fn logout(config: &mut Config) -> Result<()> {
    let Some(account) = config.last_account.take() else {
        println!("Not logged in");
        return Ok(());
    };
    if let Err(e) = TokenStore::delete(&account) {
        tracing::warn!(account = %account, error = %e, "No keychain entry to delete");
    }
    config.save()?;
    println!("Logged out {}", account);
    Ok(())
}
