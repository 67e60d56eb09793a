//! Concurrent evaluation pipeline
//!
//! One producer streams base combinations into a bounded queue. Generator
//! workers expand them into jobs (one per time window) on a second bounded
//! queue, evaluation workers score the jobs, and a single collector drains
//! the results. Every queue closes only after all of its senders finish, so
//! shutdown always runs producer → generators → evaluators → collector.

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::combination::{Combination, TimeWindow};
use crate::config::RunPlan;
use crate::criterion::CriterionSpec;
use crate::error::EvalError;
use crate::generator;
use crate::metrics;
use crate::types::{ScoredResult, TradeRecord};

const BASE_QUEUE_CAPACITY: usize = 10_000;
const JOB_QUEUE_CAPACITY: usize = 100_000;
const RESULT_QUEUE_CAPACITY: usize = 100_000;

/// Jobs between per-worker debug lines
const LOG_EVERY: u64 = 1000;

/// Worker pool width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Priority {
    /// Half of the available cores
    #[default]
    Normal,
    /// Every available core
    High,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub generator_workers: usize,
    pub evaluation_workers: usize,
    pub base_queue_capacity: usize,
    pub job_queue_capacity: usize,
    pub result_queue_capacity: usize,
}

impl PipelineConfig {
    pub fn for_priority(priority: Priority) -> Self {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = match priority {
            Priority::High => cores,
            Priority::Normal => (cores / 2).max(1),
        };
        Self::with_workers(workers)
    }

    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            generator_workers: workers,
            evaluation_workers: workers,
            base_queue_capacity: BASE_QUEUE_CAPACITY,
            job_queue_capacity: JOB_QUEUE_CAPACITY,
            result_queue_capacity: RESULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub base_combinations: u64,
    pub jobs: u64,
    pub processed: u64,
    /// Jobs dropped on an evaluation error
    pub failed: u64,
    /// Jobs lost to a panic
    pub panicked: u64,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub results: Vec<ScoredResult>,
    pub stats: PipelineStats,
}

#[derive(Default)]
struct FaultCounters {
    failed: AtomicU64,
    panicked: AtomicU64,
}

pub struct Pipeline {
    config: PipelineConfig,
    processed: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Jobs finished so far, for progress reporting
    pub fn processed_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.processed)
    }

    /// Score every job of `plan` against `trades`
    pub fn run(&self, plan: &RunPlan, trades: &[TradeRecord]) -> Result<PipelineOutput> {
        let strategies = Catalog::global().strategies();
        self.run_with(&plan.criteria, &plan.windows, |combination| {
            metrics::evaluate(trades, combination, &plan.settings, strategies)
        })
    }

    /// Run the pipeline with a custom job evaluator
    pub fn run_with<E>(
        &self,
        criteria: &[CriterionSpec],
        windows: &[TimeWindow],
        evaluate: E,
    ) -> Result<PipelineOutput>
    where
        E: Fn(&Combination) -> Result<Option<ScoredResult>, EvalError> + Sync,
    {
        let config = &self.config;
        info!(
            "Starting pipeline: {} generator workers, {} evaluation workers",
            config.generator_workers, config.evaluation_workers
        );

        let (base_tx, base_rx) = bounded::<Combination>(config.base_queue_capacity);
        let (job_tx, job_rx) = bounded::<Combination>(config.job_queue_capacity);
        let (result_tx, result_rx) = bounded::<ScoredResult>(config.result_queue_capacity);
        let faults = FaultCounters::default();
        let processed: &AtomicU64 = &self.processed;

        thread::scope(|scope| -> Result<PipelineOutput> {
            // Collector starts before anything can produce a result
            let collector = thread::Builder::new()
                .name("collector".into())
                .spawn_scoped(scope, move || result_rx.iter().collect::<Vec<_>>())?;

            let producer = thread::Builder::new()
                .name("base-producer".into())
                .spawn_scoped(scope, move || {
                    let emitted = generator::generate_base(criteria, |c| base_tx.send(c).is_ok());
                    debug!("Base producer finished after {} combinations", emitted);
                    emitted
                })?;

            let generators = (0..config.generator_workers)
                .map(|id| {
                    let base_rx = base_rx.clone();
                    let job_tx = job_tx.clone();
                    thread::Builder::new()
                        .name(format!("generator-{}", id))
                        .spawn_scoped(scope, move || generator_worker(base_rx, job_tx, windows))
                })
                .collect::<std::io::Result<Vec<_>>>()?;
            drop(base_rx);

            let evaluators = (0..config.evaluation_workers)
                .map(|id| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    let evaluate = &evaluate;
                    let faults = &faults;
                    thread::Builder::new()
                        .name(format!("evaluator-{}", id))
                        .spawn_scoped(scope, move || {
                            evaluation_worker(id, job_rx, result_tx, evaluate, processed, faults)
                        })
                })
                .collect::<std::io::Result<Vec<_>>>()?;
            drop(job_rx);

            let base_combinations = join(producer, "base producer").unwrap_or(0);
            let jobs: u64 = generators
                .into_iter()
                .filter_map(|h| join(h, "generator worker"))
                .sum();
            drop(job_tx);

            for handle in evaluators {
                join(handle, "evaluation worker");
            }
            drop(result_tx);

            let results = join(collector, "collector").unwrap_or_default();

            let stats = PipelineStats {
                base_combinations,
                jobs,
                processed: processed.load(Ordering::Relaxed),
                failed: faults.failed.load(Ordering::Relaxed),
                panicked: faults.panicked.load(Ordering::Relaxed),
            };
            if stats.failed > 0 || stats.panicked > 0 {
                warn!(
                    "{} jobs dropped on evaluation errors, {} lost to panics",
                    stats.failed, stats.panicked
                );
            }
            info!(
                "Pipeline finished: {} base combinations, {} jobs, {} results",
                stats.base_combinations,
                stats.jobs,
                results.len()
            );

            Ok(PipelineOutput { results, stats })
        })
    }
}

fn generator_worker(
    base_rx: Receiver<Combination>,
    job_tx: Sender<Combination>,
    windows: &[TimeWindow],
) -> u64 {
    let mut produced = 0;
    for base in base_rx.iter() {
        for job in generator::augment(base, windows) {
            if job_tx.send(job).is_err() {
                return produced;
            }
            produced += 1;
        }
    }
    produced
}

fn evaluation_worker<E>(
    id: usize,
    job_rx: Receiver<Combination>,
    result_tx: Sender<ScoredResult>,
    evaluate: &E,
    processed: &AtomicU64,
    faults: &FaultCounters,
) where
    E: Fn(&Combination) -> Result<Option<ScoredResult>, EvalError> + Sync,
{
    let mut handled: u64 = 0;
    for combination in job_rx.iter() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluate(&combination)));
        processed.fetch_add(1, Ordering::Relaxed);

        handled += 1;
        if handled % LOG_EVERY == 0 {
            debug!("Worker {} processed {} jobs", id, handled);
        }

        match outcome {
            Ok(Ok(Some(result))) => {
                if result_tx.send(result).is_err() {
                    error!("Worker {}: result queue closed, stopping", id);
                    return;
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                faults.failed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    worker = id,
                    combination = %combination.signature(),
                    "Dropping job: {}",
                    e
                );
            }
            Err(payload) => {
                faults.panicked.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker = id,
                    combination = %combination.signature(),
                    "Job panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
    debug!("Worker {} finished after {} jobs", id, handled);
}

fn join<T>(handle: ScopedJoinHandle<'_, T>, role: &str) -> Option<T> {
    match handle.join() {
        Ok(value) => Some(value),
        Err(payload) => {
            error!("{} panicked: {}", role, panic_message(payload.as_ref()));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
