//! Model Monitor workflow client
//!
//! Command-line entry point. Each command loads the workflow state file,
//! runs one step and saves the state again.

use core::time::Duration;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use model_monitor::commands::{
    self, Workflow, demo::DemoOptions, invoke::DEFAULT_THROTTLE_MS, report::ReportKind,
};
use model_monitor::poller::PollPolicy;
use model_monitor::state::{WorkflowState, state_path};
use monitor_structs::CsvLayout;
use sagemaker_client::{SageMakerClient, SageMakerRuntimeClient, load_sdk_config};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Longest delay between status checks when backing off.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Model Monitor workflow client
#[derive(Parser)]
#[command(name = "model-monitor")]
#[command(about = "Deploy a marketplace model with data capture and monitor it for drift")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the workflow state file
    #[arg(long, global = true, env = "MODEL_MONITOR_STATE")]
    state: Option<PathBuf>,

    /// Seconds between status checks
    #[arg(long, global = true, default_value = "45")]
    poll_interval_secs: u64,

    /// Multiply the delay between status checks by this after every check
    #[arg(long, global = true, default_value = "1.0")]
    poll_backoff: f32,

    /// Give up waiting on a resource after this many minutes (0 waits forever)
    #[arg(long, global = true, default_value = "60")]
    poll_timeout_mins: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the baseline and drift datasets
    Stage {
        /// Labelled CSV with a header row
        #[arg(short, long)]
        baseline: PathBuf,

        /// CSV of anomalous rows
        #[arg(short, long)]
        drift: PathBuf,
    },

    /// Create the model, endpoint config and endpoint, then wait for it
    Deploy {
        /// Delete whatever was created if provisioning fails
        #[arg(long)]
        rollback_on_failure: bool,
    },

    /// Suggest statistics and constraints from the baseline dataset
    Baseline {
        /// Submit the job and return without waiting for it
        #[arg(long)]
        no_wait: bool,
    },

    /// Create the hourly monitoring schedule
    Schedule {
        /// Wait until the schedule is active
        #[arg(long)]
        wait: bool,
    },

    /// Replay a dataset against the endpoint
    Invoke {
        /// Path to the CSV file
        #[arg(short, long)]
        dataset: PathBuf,

        /// First column is a label and is not sent
        #[arg(long)]
        label_column: bool,

        /// First line is a header and is not sent
        #[arg(long)]
        header: bool,

        /// Milliseconds between requests
        #[arg(long, default_value_t = DEFAULT_THROTTLE_MS)]
        throttle_ms: u64,
    },

    /// Print analyzer output
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
    },

    /// Delete the schedule, endpoint, endpoint config and model
    Teardown {
        /// Seconds to wait between deletions
        #[arg(long, default_value = "60")]
        settle_secs: u64,
    },

    /// Run every step from staging through the drift replay
    Demo {
        /// Labelled CSV with a header row
        #[arg(short, long, default_value = "data/training-dataset-with-header.csv")]
        baseline: PathBuf,

        /// CSV of anomalous rows
        #[arg(short, long, default_value = "data/drift.csv")]
        drift: PathBuf,

        /// Milliseconds between requests
        #[arg(long, default_value_t = DEFAULT_THROTTLE_MS)]
        throttle_ms: u64,

        /// Delete whatever was created if provisioning fails
        #[arg(long)]
        rollback_on_failure: bool,
    },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let file_layer = match std::env::var_os("MODEL_MONITOR_LOG_FILE") {
        Some(path) => {
            let log_file = std::fs::File::create(&path).with_context(|| {
                format!("Failed to create log file {}", Path::new(&path).display())
            })?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Arc::new(log_file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

async fn build_workflow(cli: &Cli, cancel: CancellationToken) -> Result<Workflow> {
    let config = Config::from_env()?;
    let sdk_config = load_sdk_config(&config.region).await;
    let store = config.object_store()?;

    let timeout = (cli.poll_timeout_mins > 0)
        .then(|| Duration::from_secs(cli.poll_timeout_mins * 60));
    let poll = PollPolicy::fixed(Duration::from_secs(cli.poll_interval_secs))
        .with_backoff(cli.poll_backoff, MAX_POLL_INTERVAL)
        .with_timeout(timeout);

    info!(
        region = %config.region,
        bucket = %config.bucket,
        prefix = %config.prefix,
        "Loaded configuration"
    );

    Ok(Workflow {
        config,
        control_plane: Arc::new(SageMakerClient::new(&sdk_config)),
        runtime: Arc::new(SageMakerRuntimeClient::new(&sdk_config)),
        store,
        endpoint_poll: poll,
        job_poll: poll,
        cancel,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning any wait in progress");
            on_interrupt.cancel();
        }
    });

    let workflow = build_workflow(&cli, cancel).await?;
    let state_file = state_path(cli.state.clone());
    let mut state = WorkflowState::load(&state_file)?;

    let result = run_command(&workflow, &mut state, &state_file, cli.command).await;

    // Teardown removes the file itself once everything is gone.
    if state != WorkflowState::default() {
        state.save(&state_file)?;
    }

    result
}

async fn run_command(
    workflow: &Workflow,
    state: &mut WorkflowState,
    state_file: &Path,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Stage { baseline, drift } => {
            commands::stage::run(workflow, state, &baseline, &drift).await?;
        }
        Commands::Deploy {
            rollback_on_failure,
        } => {
            commands::deploy::run(workflow, state, rollback_on_failure).await?;
        }
        Commands::Baseline { no_wait } => {
            commands::baseline::run(workflow, state, !no_wait).await?;
        }
        Commands::Schedule { wait } => {
            commands::schedule::run(workflow, state, wait).await?;
        }
        Commands::Invoke {
            dataset,
            label_column,
            header,
            throttle_ms,
        } => {
            let layout = CsvLayout {
                has_header: header,
                label_column,
            };
            commands::invoke::run(
                workflow,
                state,
                &dataset,
                layout,
                Duration::from_millis(throttle_ms),
            )
            .await?;
        }
        Commands::Report { kind } => {
            commands::report::run(workflow, state, kind).await?;
        }
        Commands::Teardown { settle_secs } => {
            commands::teardown::run(workflow, state, state_file, Duration::from_secs(settle_secs))
                .await?;
        }
        Commands::Demo {
            baseline,
            drift,
            throttle_ms,
            rollback_on_failure,
        } => {
            let options = DemoOptions {
                baseline_dataset: baseline,
                drift_dataset: drift,
                throttle: Duration::from_millis(throttle_ms),
                rollback_on_failure,
            };
            commands::demo::run(workflow, state, &options, |state| state.save(state_file))
                .await?;
        }
    }

    Ok(())
}
