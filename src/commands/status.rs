use anyhow::Result;
use tracing::{info, warn};

use crate::catalog::{catalog_counts, latest_run, open_catalog};
use crate::cli::StatusArgs;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.db_path;
    info!(path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "catalog file missing");
        return Ok(());
    }

    let connection = open_catalog(&db_path)?;
    let counts = catalog_counts(&connection)?;

    match latest_run(&connection)? {
        Some((run_id, completed_at)) => {
            info!(run_id = %run_id, completed_at = %completed_at, "latest extraction run")
        }
        None => warn!("catalog has no recorded runs"),
    }

    info!(
        runs = counts.runs,
        tables = counts.tables,
        columns = counts.columns,
        indexes = counts.indexes,
        foreign_keys = counts.foreign_keys,
        computed_columns = counts.computed_columns,
        warnings = counts.warnings,
        "catalog status"
    );
    Ok(())
}
