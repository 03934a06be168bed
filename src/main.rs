use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use allinkl_webhook::{
    config::Settings,
    daemon,
    dns::create_provider,
    secrets::MemorySecretStore,
    solver::{AllinklSolver, ChallengeRequest, Solver, SOLVER_NAME},
};

#[derive(Parser)]
#[command(name = "allinkl-webhook")]
#[command(about = "cert-manager DNS-01 solver for All-Inkl hosted zones")]
#[command(version)]
struct Cli {
    /// API group the webhook is registered under (defaults to $GROUP_NAME)
    #[arg(long, global = true)]
    group_name: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the solver name expected in the issuer's solverName
    Name,

    /// Serve challenge payloads as JSON lines on stdin/stdout
    Serve {
        /// Read secrets from a JSON file instead of the cluster
        #[arg(long)]
        secrets_file: Option<PathBuf>,
    },

    /// List the TXT records in the zone of a challenge request
    Records {
        /// Challenge request as JSON
        request: PathBuf,

        /// Read secrets from a JSON file instead of the cluster
        #[arg(long)]
        secrets_file: Option<PathBuf>,
    },
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn build_solver(
    secrets_file: Option<PathBuf>,
    shutdown: watch::Receiver<bool>,
) -> Result<AllinklSolver> {
    match secrets_file {
        Some(path) => {
            let secrets = MemorySecretStore::load(&path)?;
            Ok(AllinklSolver::with_parts(
                Arc::new(secrets),
                create_provider(SOLVER_NAME)?,
            ))
        }
        None => {
            let cluster = kube::Config::infer()
                .await
                .context("Failed to load cluster access configuration")?;
            let mut solver = AllinklSolver::new();
            solver.initialize(cluster, shutdown).await?;
            Ok(solver)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.group_name.as_deref(), &cli.log_level)?;
    init_logging(&settings.log_level);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    match cli.command {
        Commands::Name => {
            println!("{}", SOLVER_NAME);
        }

        Commands::Serve { secrets_file } => {
            tokio::spawn(async move {
                if let Err(e) = daemon::wait_for_shutdown().await {
                    error!("Error waiting for shutdown signal: {}", e);
                }
                let _ = shutdown_tx.send(true);
            });

            let solver = build_solver(secrets_file, shutdown_rx.clone()).await?;
            info!(
                "Starting {} solver for group {}",
                solver.name(),
                settings.group_name
            );

            daemon::serve(
                Arc::new(solver),
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                shutdown_rx,
            )
            .await?;
        }

        Commands::Records {
            request,
            secrets_file,
        } => {
            let content = std::fs::read_to_string(&request)
                .with_context(|| format!("Failed to read challenge request: {}", request.display()))?;
            let request: ChallengeRequest = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse challenge request: {}", request.display()))?;

            let solver = build_solver(secrets_file, shutdown_rx).await?;
            for record in solver.txt_records(&request).await? {
                println!(
                    "{} {} {} \"{}\"",
                    record.id, record.name, record.zone, record.data
                );
            }
        }
    }

    Ok(())
}
