//! debi batch runner
//!
//! Replays payment retries and payment-method changes from CSV files.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use debi_client::{DebiClient, DebiConfig, parse_flag};
use debi_batch::{change_method, retry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Talk to the debi sandbox instead of production
    #[arg(
        long,
        global = true,
        env = "DEBI_SANDBOX",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = parse_sandbox,
    )]
    sandbox: bool,

    /// Pause between rows, in seconds
    #[arg(long, global = true, env = "RETRY_SLEEP_SECONDS", default_value_t = 0.0)]
    sleep_seconds: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// POST a retry for every `payment_id` and write `<stem>_results.csv`
    RetryPayments {
        /// Input CSV with a `payment_id` column
        #[arg(long, env = "RETRY_PAYMENTS_CSV", default_value = retry::DEFAULT_CSV)]
        csv: PathBuf,

        /// Endpoint template; `{payment_id}` is replaced per row
        #[arg(long, env = "DEBI_RETRY_ENDPOINT", default_value = retry::DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// Change payment methods, enable binary mode and retry, updating the CSV in place
    ChangePaymentMethod {
        /// CSV with `payment_id` and `payment_method_id` columns
        #[arg(long, env = "CHANGE_PAYMENT_METHOD_CSV", default_value = change_method::DEFAULT_CSV)]
        csv: PathBuf,
    },
}

fn parse_sandbox(value: &str) -> Result<bool, String> {
    Ok(parse_flag(value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let delay = Duration::try_from_secs_f64(cli.sleep_seconds)
        .with_context(|| format!("invalid --sleep-seconds: {}", cli.sleep_seconds))?;

    let config = DebiConfig {
        sandbox: cli.sandbox,
        ..DebiConfig::from_env()
    };
    if config.api_key.is_empty() {
        bail!("Missing DEBI_API_KEY in environment or .env");
    }
    tracing::info!(endpoint = config.endpoint(), "Using debi API");
    let client = DebiClient::from_config(config)?;

    match cli.command {
        Command::RetryPayments { csv, endpoint } => {
            let job = retry::RetryJob {
                csv_path: csv,
                endpoint_template: endpoint,
                delay,
            };
            let report = retry::run(&client, &job).await?;
            println!("Results written to: {}", report.results_path.display());
        }
        Command::ChangePaymentMethod { csv } => {
            let job = change_method::ChangeMethodJob {
                csv_path: csv,
                delay,
            };
            let report = change_method::run(&client, &job).await?;
            println!(
                "Results written to: {} ({} rows, {} retried)",
                job.csv_path.display(),
                report.rows,
                report.retried
            );
        }
    }

    Ok(())
}
