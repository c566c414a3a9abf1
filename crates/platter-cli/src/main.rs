use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::{Stream, TryStreamExt};
use platter_config::{load as load_config, DiscogsConfig, TelemetryConfig};
use platter_discogs::constants::InventoryStatus;
use platter_discogs::pagination::PageItems;
use platter_discogs::{Auth, Currency, DiscogsClient, MemoryCache, OAuth1Plaintext};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line access to the Discogs API.
#[derive(Parser, Debug)]
#[command(name = "platter", version, about = "Query Discogs from the command line", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the user the configured credentials belong to
    Identity,
    /// Look up a release
    Release {
        id: u64,
        /// Marketplace currency for prices, e.g. EUR
        #[arg(long, value_parser = parse_currency)]
        currency: Option<Currency>,
    },
    /// Print every wantlist entry of a user as JSON lines
    Wantlist { user: String },
    /// Print every inventory listing of a seller as JSON lines
    Inventory {
        user: String,
        /// Only listings that are for sale
        #[arg(long)]
        for_sale: bool,
    },
    /// Save a finished inventory export to a file
    ExportDownload {
        id: u64,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.telemetry);
    report_config(&config.discogs);

    let client = build_client(&config.discogs)?;
    debug!(target: "cli", fetcher = ?client.fetcher(), "client ready");

    tokio::select! {
        result = run(&client, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!(target: "cli", "interrupted");
            Ok(())
        }
    }
}

async fn run(client: &DiscogsClient, command: Command) -> Result<()> {
    match command {
        Command::Identity => print_json(&client.identity().await?),
        Command::Release { id, currency } => print_json(&client.release(id, currency).await?),
        Command::Wantlist { user } => {
            let count = print_items(client.all_wantlist(&user)).await?;
            info!(target: "cli", user = %user, count, "wantlist printed");
            Ok(())
        }
        Command::Inventory { user, for_sale } => {
            let status = for_sale.then_some(InventoryStatus::ForSale);
            let count = print_items(client.all_inventory(&user, status, None)).await?;
            info!(target: "cli", user = %user, count, "inventory printed");
            Ok(())
        }
        Command::ExportDownload { id, out } => {
            let csv = client.download_inventory_export(id).await?;
            std::fs::write(&out, &csv)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(target: "cli", bytes = csv.len(), path = %out.display(), "export saved");
            Ok(())
        }
    }
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&telemetry.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries command output, logs go to stderr.
    if telemetry.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config is loaded before the subscriber exists, so its findings are logged again here.
fn report_config(config: &DiscogsConfig) {
    for warning in config.warnings() {
        warn!(target: "config", "{}", warning);
    }
    info!(
        target: "config",
        authenticated = config.is_authenticated(),
        "configuration loaded"
    );
}

fn build_client(config: &DiscogsConfig) -> Result<DiscogsClient> {
    let mut builder = DiscogsClient::builder()
        .request_limit(config.request_limit)
        .request_limit_auth(config.request_limit_auth)
        .request_limit_interval(config.request_limit_interval())
        .concurrency(config.concurrency)
        .timeout(config.timeout());

    if let Some(base_url) = &config.base_url {
        builder = builder.base_url(base_url.as_str());
    }
    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }
    if let Some(auth) = auth_from_config(config) {
        builder = builder.auth(auth);
    }
    if let Some(capacity) = config.cache_capacity {
        builder = builder.cache(Arc::new(MemoryCache::new(capacity)));
    }

    builder
        .build_client()
        .context("failed to build Discogs client")
}

/// A personal token wins over OAuth credentials.
fn auth_from_config(config: &DiscogsConfig) -> Option<Auth> {
    if let Some(token) = config.user_token() {
        return Some(Auth::token(token));
    }
    config.oauth().map(|oauth| {
        Auth::OAuth(OAuth1Plaintext {
            consumer_key: oauth.consumer_key.to_string(),
            consumer_secret: oauth.consumer_secret.to_string(),
            token: oauth.token.to_string(),
            token_secret: oauth.token_secret.to_string(),
        })
    })
}

fn parse_currency(value: &str) -> std::result::Result<Currency, String> {
    Currency::ALL
        .iter()
        .copied()
        .find(|currency| currency.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            let known: Vec<&str> = Currency::ALL.iter().map(Currency::as_str).collect();
            format!("unknown currency {:?}, expected one of {}", value, known.join(", "))
        })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Print each item of every page as it arrives. Returns the item count.
async fn print_items<S, P>(pages: S) -> Result<usize>
where
    S: Stream<Item = platter_discogs::Result<P>>,
    P: PageItems,
    P::Item: Serialize,
{
    futures_util::pin_mut!(pages);

    let mut count = 0;
    while let Some(page) = pages.try_next().await? {
        for item in page.into_items() {
            print_json(&item)?;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("eur"), Ok(Currency::Eur));
        assert_eq!(parse_currency("USD"), Ok(Currency::Usd));
        assert!(parse_currency("XYZ").unwrap_err().contains("EUR"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["platter", "release", "249504", "--currency", "sek"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Release {
                id: 249504,
                currency: Some(Currency::Sek)
            }
        ));

        let cli = Cli::try_parse_from([
            "platter",
            "--config",
            "platter.toml",
            "export-download",
            "599632",
            "--out",
            "inventory.csv",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("platter.toml")));
        assert!(matches!(cli.command, Command::ExportDownload { id: 599632, .. }));
    }

    #[test]
    fn test_export_download_requires_out() {
        assert!(Cli::try_parse_from(["platter", "export-download", "1"]).is_err());
    }

    #[test]
    fn test_token_wins_over_oauth() {
        let config = DiscogsConfig {
            user_token: Some("token".to_string()),
            consumer_key: Some("key".to_string()),
            consumer_secret: Some("secret".to_string()),
            oauth_token: Some("oauth".to_string()),
            oauth_token_secret: Some("oauth-secret".to_string()),
            ..Default::default()
        };
        assert!(matches!(auth_from_config(&config), Some(Auth::Token(_))));

        let config = DiscogsConfig {
            user_token: None,
            ..config
        };
        assert!(matches!(auth_from_config(&config), Some(Auth::OAuth(_))));

        assert!(auth_from_config(&DiscogsConfig::default()).is_none());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_warnings_reach_installed_subscriber() {
        let config = DiscogsConfig {
            consumer_key: Some("key".to_string()),
            ..Default::default()
        };
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || report_config(&config));

        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("incomplete OAuth credentials are ignored"), "{}", logs);
        assert!(logs.contains("configuration loaded"), "{}", logs);
    }

    #[test]
    fn test_build_client_applies_config() {
        let config = DiscogsConfig {
            user_token: Some("token".to_string()),
            base_url: Some("http://localhost:8080/".to_string()),
            request_limit_auth: 40,
            ..Default::default()
        };
        let client = build_client(&config).unwrap();

        assert_eq!(client.fetcher().base_url(), "http://localhost:8080");
        assert!(client.fetcher().is_authenticated());
        assert_eq!(client.fetcher().rate_limit().ceiling, 40);
    }
}
