//! End-to-end optimization run
//!
//! Loads the configuration and trades from a [`DataStore`], validates the run
//! plan, drives the pipeline while a [`ProgressReporter`] publishes progress,
//! and ranks the collected results.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::RunPlan;
use crate::filter;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineStats};
use crate::progress::{self, ProgressReporter, ProgressSink};
use crate::ranking;
use crate::store::DataStore;
use crate::types::ScoredResult;

/// What to optimize and how
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub instrument: String,
    pub config_id: i64,
    pub job_id: String,
    pub pipeline: PipelineConfig,
    pub progress_interval: Duration,
}

impl RunRequest {
    pub fn new(instrument: impl Into<String>, config_id: i64, job_id: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            config_id,
            job_id: job_id.into(),
            pipeline: PipelineConfig::for_priority(Default::default()),
            progress_interval: progress::DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    /// Final ranked list
    pub ranked: Vec<ScoredResult>,
    /// Trades left after pre-filtering
    pub trade_count: usize,
    pub total_jobs: u64,
    pub stats: PipelineStats,
}

pub struct Optimizer<'a, S: DataStore> {
    store: &'a S,
    catalog: &'static Catalog,
}

impl<'a, S: DataStore> Optimizer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            catalog: Catalog::global(),
        }
    }

    pub fn run(&self, request: &RunRequest, sink: Arc<dyn ProgressSink>) -> Result<RunSummary> {
        let started = Instant::now();

        let configuration = self
            .store
            .fetch_configuration(request.config_id)
            .context("Failed to fetch configuration")?;
        info!(
            "Loaded configuration {} ({})",
            configuration.id, configuration.name
        );

        let settings = configuration
            .settings()
            .context("Invalid configuration settings")?;
        let plan = RunPlan::build(&settings, self.catalog).context("Invalid run plan")?;

        let trades = self
            .store
            .fetch_trades(&request.instrument, &plan.data_sheet_name)
            .context("Failed to fetch trades")?;
        let loaded = trades.len();
        let trades = filter::prefilter(trades, &plan.predefined_filters, plan.require_trade_time);
        info!(
            "Pre-filtered trades for {} / {}: {} of {} kept",
            request.instrument,
            plan.data_sheet_name,
            trades.len(),
            loaded
        );

        if trades.is_empty() {
            warn!("No trades survived pre-filtering, nothing to optimize");
            sink.finish(&request.job_id, 100);
            return Ok(RunSummary {
                ranked: Vec::new(),
                trade_count: 0,
                total_jobs: 0,
                stats: PipelineStats::default(),
            });
        }

        let total_jobs = plan.total_jobs();
        info!(
            "Testing {} combinations ({} base x {} windows) with {} evaluation workers",
            total_jobs,
            plan.base_combinations(),
            plan.windows.len().max(1),
            request.pipeline.evaluation_workers
        );

        let pipeline = Pipeline::new(request.pipeline.clone());
        let reporter = ProgressReporter::start(
            sink,
            request.job_id.clone(),
            total_jobs,
            pipeline.processed_counter(),
            request.progress_interval,
        );
        let output = pipeline.run(&plan, &trades);
        reporter.stop();
        let output = output?;

        let ranked = ranking::rank(&output.results, self.catalog.strategies());
        info!(
            "Optimization finished in {:.1}s: {} scored, {} ranked, {} failed, {} panicked",
            started.elapsed().as_secs_f64(),
            output.results.len(),
            ranked.len(),
            output.stats.failed,
            output.stats.panicked
        );

        Ok(RunSummary {
            ranked,
            trade_count: trades.len(),
            total_jobs,
            stats: output.stats,
        })
    }
}
