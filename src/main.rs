use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use licensor::config::Config;
use licensor::db;
use licensor::license::{LicenseKeys, Term};

#[derive(Parser)]
#[command(name = "licensor", version, about = "License issuance and verification service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print a fresh secp256k1 key pair for LICENSE_PRIVATE_KEY
    Keygen,
    /// Mint and store a token directly, bypassing payment
    Issue {
        #[arg(long)]
        identity: String,
        /// 7d, 1m, 1y or Lifetime
        #[arg(long)]
        term: String,
        /// Purchase time in milliseconds since the epoch (defaults to now)
        #[arg(long)]
        purchase_time_ms: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "licensor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Keygen => {
            let keys = LicenseKeys::generate();
            println!("LICENSE_PRIVATE_KEY={}", keys.private_key_hex());
            println!("public key: {}", keys.public_key_hex());
            Ok(())
        }
        Command::Issue {
            identity,
            term,
            purchase_time_ms,
        } => {
            let term = Term::from_code(&term)?;
            let pool = db::open(&config.database_path, 2)?;
            let licensor = licensor::build_licensor(&config, pool)?;
            let record = licensor.issue_token(&identity, term, purchase_time_ms)?;
            println!("{}", record.token);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate_for_serve()?;

    let pool = db::open(&config.database_path, 16)?;

    let licensor = licensor::build_licensor(&config, pool)?;
    tracing::info!("License public key: {}", licensor.public_key_hex());
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes will reject every request");
    }
    if config.dev_mode {
        tracing::info!("Running in development mode");
    }

    let state = licensor::build_state(&config, licensor);
    let app = licensor::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
