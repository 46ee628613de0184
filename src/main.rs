//! orgsync - sync a department tree and user roster into Yandex 360
//!
//! Reads `departments.csv` and `users.csv`, validates both, orders the
//! departments parent-first and reconciles everything against the
//! organization directory. With `--dry-run` nothing is written.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orgsync::api::DirectoryClient;
use orgsync::config::{Config, Settings};
use orgsync::reconcile::{Reconciler, RunMode};
use orgsync::{export, loader, resolver};

/// orgsync - CSV to Yandex 360 directory sync
#[derive(Parser, Debug)]
#[command(name = "orgsync")]
#[command(about = "Create and update departments and users in a Yandex 360 organization from CSV files")]
#[command(version)]
struct Args {
    /// Report what would change without creating or updating anything
    #[arg(long)]
    dry_run: bool,

    /// Department definitions
    #[arg(long, default_value = "departments.csv")]
    departments: PathBuf,

    /// User definitions
    #[arg(long, default_value = "users.csv")]
    users: PathBuf,

    /// Settings file (defaults to <config dir>/orgsync/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the full run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Organization id
    #[arg(long, env = "ORG_ID", hide_env_values = true)]
    org_id: Option<String>,

    /// OAuth token (TOKEN is read when API_TOKEN is unset)
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Older name for the token variable
    #[arg(long = "token", env = "TOKEN", hide = true)]
    fallback_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout carries only the summary (RUST_LOG overrides)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orgsync=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let config = Config::resolve(args.org_id, args.api_token, args.fallback_token, settings)
        .context("Invalid configuration")?;

    let inputs = loader::load(&args.departments, &args.users).context("Input files are invalid")?;
    let ordered =
        resolver::resolve_order(&inputs.departments).context("Department hierarchy is invalid")?;
    info!(
        departments = ordered.len(),
        users = inputs.users.len(),
        org_id = config.org_id,
        "Inputs validated"
    );

    let client = DirectoryClient::new(&config).context("Failed to create directory client")?;
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };
    let mut reconciler = Reconciler::new(client, mode, config.settings.root_department_id);
    let report = reconciler.run(&ordered, &inputs.users).await;

    info!(
        changes = report.changes(),
        problems = report.has_problems(),
        "Reconciliation finished"
    );
    println!("{report}");

    if let Some(path) = &args.report {
        export::write_report(&report, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(if report.has_problems() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
