//! Import command: load a CSV trade export into the store

use anyhow::{Context, Result};
use filter_optimizer::store;
use filter_optimizer::SqliteStore;
use std::path::PathBuf;
use tracing::info;

pub fn run(db: PathBuf, instrument: String, timeframe: String, csv: PathBuf) -> Result<()> {
    info!("Importing {} as {} / {}", csv.display(), instrument, timeframe);

    let trades = store::load_trades_csv(&csv)
        .with_context(|| format!("Failed to read trades from {}", csv.display()))?;

    let store = SqliteStore::open(&db)
        .with_context(|| format!("Failed to open store at {}", db.display()))?;
    let stored = store.insert_trades(&instrument, &timeframe, &trades)?;

    println!("Imported {} trades into {} / {}", stored, instrument, timeframe);
    Ok(())
}
