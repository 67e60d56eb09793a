//! Periodic progress reporting
//!
//! A [`ProgressReporter`] samples the pipeline's processed-job counter on a
//! fixed tick and hands a 0-100 percentage to a [`ProgressSink`].

use crossbeam_channel::{bounded, select, tick, Sender};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Receives completion percentages for a job
pub trait ProgressSink: Send + Sync {
    fn report(&self, job_id: &str, percent: u8);

    /// Called once with the last percentage when the run ends
    fn finish(&self, job_id: &str, percent: u8) {
        self.report(job_id, percent);
    }
}

/// `processed / total * 100`, clamped to 100; 0 when there is nothing to do
pub fn percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (processed as f64 / total as f64 * 100.0).floor();
    pct.clamp(0.0, 100.0) as u8
}

/// Logs each percentage through tracing
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, job_id: &str, percent: u8) {
        info!("Job {}: {}% complete", job_id, percent);
    }
}

/// Draws an indicatif bar on stderr
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
        let style = ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| [{elapsed}<{eta}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░ ");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBarSink {
    fn report(&self, job_id: &str, percent: u8) {
        self.bar.set_message(job_id.to_string());
        self.bar.set_position(u64::from(percent));
    }

    fn finish(&self, job_id: &str, percent: u8) {
        self.report(job_id, percent);
        self.bar.finish();
    }
}

/// Background thread publishing progress until stopped
pub struct ProgressReporter {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    sink: Arc<dyn ProgressSink>,
    job_id: String,
    total: u64,
    processed: Arc<AtomicU64>,
}

impl ProgressReporter {
    pub fn start(
        sink: Arc<dyn ProgressSink>,
        job_id: impl Into<String>,
        total: u64,
        processed: Arc<AtomicU64>,
        interval: Duration,
    ) -> Self {
        let job_id = job_id.into();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_sink = Arc::clone(&sink);
        let thread_job = job_id.clone();
        let thread_processed = Arc::clone(&processed);
        let handle = thread::Builder::new()
            .name("progress".into())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let done = thread_processed.load(Ordering::Relaxed);
                            thread_sink.report(&thread_job, percent(done, total));
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Could not start progress reporter: {}", e);
                None
            }
        };

        Self {
            stop_tx,
            handle,
            sink,
            job_id,
            total,
            processed,
        }
    }

    /// Stop ticking and publish the final percentage
    pub fn stop(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Progress reporter thread panicked");
            }
        }
        let done = self.processed.load(Ordering::Relaxed);
        self.sink.finish(&self.job_id, percent(done, self.total));
    }
}
