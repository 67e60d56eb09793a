//! Optimize command: score every combination and print the ranked results as JSON

use anyhow::{Context, Result};
use filter_optimizer::progress::{LogSink, ProgressBarSink, ProgressSink};
use filter_optimizer::{Optimizer, PipelineConfig, Priority, ResultRecord, RunRequest, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::ProgressTarget;

pub fn run(
    db: PathBuf,
    instrument: String,
    config_id: i64,
    job_id: String,
    priority: Priority,
    progress: ProgressTarget,
    interval_secs: u64,
) -> Result<()> {
    info!(
        "Starting optimization: instrument={} config={} job={} priority={:?}",
        instrument, config_id, job_id, priority
    );

    let store = SqliteStore::open(&db)
        .with_context(|| format!("Failed to open store at {}", db.display()))?;

    let sink: Arc<dyn ProgressSink> = match progress {
        ProgressTarget::Db => Arc::new(store.clone()),
        ProgressTarget::Bar => Arc::new(ProgressBarSink::new()),
        ProgressTarget::Log => Arc::new(LogSink),
    };

    let mut request = RunRequest::new(instrument, config_id, job_id);
    request.pipeline = PipelineConfig::for_priority(priority);
    request.progress_interval = Duration::from_secs(interval_secs.max(1));

    let summary = Optimizer::new(&store).run(&request, sink)?;

    let records: Vec<ResultRecord<'_>> = summary.ranked.iter().map(ResultRecord::from).collect();
    let json = serde_json::to_string(&records).context("Failed to serialize results")?;
    println!("{}", json);

    info!(
        "Emitted {} results from {} jobs over {} trades",
        records.len(),
        summary.total_jobs,
        summary.trade_count
    );
    Ok(())
}
