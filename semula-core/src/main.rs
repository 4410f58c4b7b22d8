//! Semula Core binary
//!
//! # Environment Variables
//!
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: hosted backend (required)
//! - `HTTP_HOST`, `HTTP_PORT`: listen address
//! - `LOG_FORMAT`: `pretty` or `json`
//! - `METRICS_ENABLED`: expose `/metrics`

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use semula_core::{
    backend::BackendClient,
    config::Config,
    domain::{FilterLevel, FilterSelection, FilterValue},
    identity::HostedIdentityProvider,
    policy::Permissions,
    server,
    session::AuthContext,
    telemetry,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Semula Core - budget revision backend
#[derive(Parser, Debug)]
#[command(name = "semula-core")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Sign in and print what the account may do under a filter
    Permissions(PermissionsArgs),
}

#[derive(Args, Debug)]
struct PermissionsArgs {
    #[arg(long, env = "SEMULA_EMAIL")]
    email: String,

    #[arg(long, env = "SEMULA_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, default_value = "all")]
    program: String,
    #[arg(long, default_value = "all")]
    kegiatan: String,
    #[arg(long, default_value = "all")]
    output: String,
    #[arg(long, default_value = "all")]
    komponen: String,
    #[arg(long, default_value = "all")]
    sub_komponen: String,
    #[arg(long, default_value = "all")]
    akun: String,
}

impl PermissionsArgs {
    fn filter(&self) -> FilterSelection {
        let mut filter = FilterSelection::all();
        for (level, raw) in [
            (FilterLevel::Program, &self.program),
            (FilterLevel::Kegiatan, &self.kegiatan),
            (FilterLevel::Output, &self.output),
            (FilterLevel::Komponen, &self.komponen),
            (FilterLevel::SubKomponen, &self.sub_komponen),
            (FilterLevel::Akun, &self.akun),
        ] {
            filter.set(level, FilterValue::parse(raw));
        }
        filter
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let metrics_handle = telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting Semula Core Service");
            info!("HTTP server listening on {}", config.http_addr());
            server::run(config, metrics_handle).await
        }
        Command::Permissions(args) => permissions(config, args).await,
    }
}

async fn permissions(config: Config, args: PermissionsArgs) -> Result<()> {
    let backend = Arc::new(BackendClient::new(config.backend.clone())?);
    let provider = Arc::new(HostedIdentityProvider::new(backend.clone()));
    let context = AuthContext::new(provider, backend);

    context.init().await;
    context.sign_in(&args.email, &args.password).await?;

    let filter = args.filter();
    let snapshot = context.snapshot().await;
    let permissions = Permissions::evaluate(&context.subject().await, &filter);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "identity": snapshot,
            "filter": filter.describe(),
            "permissions": permissions,
        }))?
    );

    if let Err(e) = context.sign_out().await {
        warn!(error = %e, "sign-out failed");
    }
    context.teardown().await;
    Ok(())
}
