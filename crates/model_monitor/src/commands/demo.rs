//! Demo command - runs the whole workflow up to and including the drift replay.
//!
//! Resources are left running so the hourly schedule can pick up the captured
//! traffic. Run `report violations` after the next hour boundary and
//! `teardown` when done.

use core::time::Duration;
use std::path::{Path, PathBuf};

use anyhow::Result;
use monitor_structs::CsvLayout;
use tracing::info;

use super::{Workflow, baseline, deploy, invoke, schedule, stage};
use crate::state::WorkflowState;

/// Inputs for a full demo run.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Labelled CSV with a header row, used for the baseline and a clean replay
    pub baseline_dataset: PathBuf,
    /// Unlabelled CSV of anomalous rows
    pub drift_dataset: PathBuf,
    pub throttle: Duration,
    pub rollback_on_failure: bool,
}

const BASELINE_LAYOUT: CsvLayout = CsvLayout {
    has_header: true,
    label_column: true,
};

const DRIFT_LAYOUT: CsvLayout = CsvLayout {
    has_header: false,
    label_column: false,
};

/// Runs stage, deploy, baseline, schedule and both replays in order.
///
/// `persist` is called after every step so an interrupted run can be resumed
/// or torn down from the state file.
///
/// # Errors
///
/// Returns the first failing step's error.
pub async fn run(
    workflow: &Workflow,
    state: &mut WorkflowState,
    options: &DemoOptions,
    persist: impl Fn(&WorkflowState) -> Result<()>,
) -> Result<()> {
    info!("Step 1/6: staging datasets");
    stage::run(workflow, state, &options.baseline_dataset, &options.drift_dataset).await?;
    persist(state)?;

    info!("Step 2/6: deploying endpoint");
    let deployed = deploy::run(workflow, state, options.rollback_on_failure).await;
    persist(state)?;
    deployed?;

    info!("Step 3/6: running baseline job");
    let baselined = baseline::run(workflow, state, true).await;
    persist(state)?;
    baselined?;

    info!("Step 4/6: creating monitoring schedule");
    let scheduled = schedule::run(workflow, state, true).await;
    persist(state)?;
    scheduled?;

    info!("Step 5/6: sending baseline traffic");
    replay(workflow, state, &options.baseline_dataset, BASELINE_LAYOUT, options.throttle).await?;

    info!("Step 6/6: sending drift traffic");
    replay(workflow, state, &options.drift_dataset, DRIFT_LAYOUT, options.throttle).await?;

    info!(
        schedule = state.schedule_name.as_deref().unwrap_or_default(),
        "Traffic captured. The first monitoring execution starts at the next hour boundary; \
         run `model-monitor report violations` afterwards, then `model-monitor teardown`"
    );

    Ok(())
}

async fn replay(
    workflow: &Workflow,
    state: &WorkflowState,
    dataset: &Path,
    layout: CsvLayout,
    throttle: Duration,
) -> Result<()> {
    let predictions = invoke::run(workflow, state, dataset, layout, throttle).await?;
    info!(
        dataset = %dataset.display(),
        predictions = predictions.len(),
        "Replay finished"
    );
    Ok(())
}
