//! Hourly sweep of stale staged attachment files.
//!
//! Safety net behind the delivery-time cleanup: anything older than one
//! hour under the temp directory is removed. The bridge core never assumes
//! this sweep has run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

pub const TEMP_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
pub const TEMP_FILE_MAX_AGE: Duration = Duration::from_secs(3600);

pub async fn run_temp_sweep(temp_dir: PathBuf) {
    let mut interval = tokio::time::interval(TEMP_SWEEP_INTERVAL);
    // Consume the immediate first tick so the first sweep runs after one
    // full interval, not at startup.
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed = sweep_once(&temp_dir, TEMP_FILE_MAX_AGE);
        if removed > 0 {
            info!("temp sweep removed {removed} stale attachment files");
        }
    }
}

pub fn sweep_once(temp_dir: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(error) => {
            debug!("temp sweep skipped: {error}");
            return 0;
        }
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let age = entry
            .metadata()
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .and_then(|modified| modified.elapsed().ok());
        let Some(age) = age else {
            continue;
        };
        if age > max_age {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed stale temp file {}", path.display());
                    removed += 1;
                }
                Err(error) => {
                    warn!("failed to remove stale temp file {}: {error}", path.display());
                }
            }
        }
    }
    removed
}
