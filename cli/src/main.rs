//! Ratekeeper CLI
//!
//! Currency conversion from the command line, backed by cached live rates.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratekeeper_fx::{FileStore, Locale, RatesConfig, ReqwestTransport};

mod app;

use app::App;

/// Ratekeeper CLI
#[derive(Parser, Debug)]
#[command(name = "ratekeeper")]
#[command(about = "Currency converter with cached live exchange rates")]
struct Args {
    /// Display locale (en-US, en-GB, de-DE, fr-FR, ru-RU, ja-JP)
    #[arg(short, long, global = true, default_value = "en-US")]
    locale: String,

    /// Directory for cached rates (overrides RATEKEEPER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an amount between two currencies
    Convert {
        /// Amount, with `.` or `,` as decimal separator
        amount: String,
        from: String,
        to: String,
    },

    /// Show the current rate table
    Rates {
        /// Quote rates against this currency instead of the table base
        #[arg(short, long)]
        base: Option<String>,
    },

    /// Fetch fresh rates now
    Refresh,

    /// List or search known currencies
    Currencies {
        /// Code or name fragment
        query: Option<String>,
    },

    /// Show cache and endpoint status
    Status,

    /// Delete cached rates
    ClearCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = RatesConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    info!(
        data_dir = %config.data_dir.display(),
        ttl_minutes = config.cache_ttl.num_minutes(),
        "Starting Ratekeeper"
    );

    let app = App::new(
        config.clone(),
        Arc::new(ReqwestTransport::new()),
        Arc::new(FileStore::new(&config.data_dir)),
        Locale::from_tag(&args.locale),
    );

    let output = match args.command {
        Command::Convert { amount, from, to } => app.convert(&amount, &from, &to).await?,
        Command::Rates { base } => app.rates(base.as_deref()).await,
        Command::Refresh => app.refresh().await?,
        Command::Currencies { query } => app.currencies(query.as_deref()),
        Command::Status => app.status(),
        Command::ClearCache => app.clear_cache(),
    };

    println!("{output}");
    Ok(())
}
