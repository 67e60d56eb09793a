//! Init command: register a configuration from a settings file

use anyhow::{Context, Result};
use filter_optimizer::{Catalog, RunPlan, Settings, SqliteStore};
use std::path::PathBuf;
use tracing::info;

pub fn run(db: PathBuf, name: String, settings_path: PathBuf) -> Result<()> {
    let settings = Settings::from_file(&settings_path)
        .with_context(|| format!("Invalid settings in {}", settings_path.display()))?;

    // Reject anything the optimizer would refuse later
    let plan = RunPlan::build(&settings, Catalog::global())?;
    info!(
        "Settings valid: {} base combinations, {} jobs",
        plan.base_combinations(),
        plan.total_jobs()
    );

    let value = serde_json::to_value(&settings).context("Failed to encode settings")?;
    let store = SqliteStore::open(&db)
        .with_context(|| format!("Failed to open store at {}", db.display()))?;
    let id = store.insert_configuration(&name, &value)?;

    println!("{}", id);
    Ok(())
}
