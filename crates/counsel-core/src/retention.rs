use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

/// Result of one retention sweep. Per-item failures are collected here,
/// never propagated — the sweep must not be able to abort a turn.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    pub scanned: usize,
    pub deleted: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

/// Delete items under `roots` whose mtime is older than `retention`.
/// Scans one level deep: each direct child (file or whole case directory)
/// is aged by its own mtime and removed as a unit.
pub fn sweep(roots: &[PathBuf], retention: Duration) -> SweepStats {
    let mut stats = SweepStats::default();
    let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
        return stats;
    };

    for root in roots {
        if !root.exists() {
            continue;
        }
        let entries = match std::fs::read_dir(root) {
            Ok(e) => e,
            Err(e) => {
                stats.errors.push(format!("scan {}: {e}", root.display()));
                continue;
            }
        };
        for entry in entries.flatten() {
            stats.scanned += 1;
            let path = entry.path();
            if let Err(e) = sweep_entry(&path, cutoff, &mut stats) {
                stats.errors.push(format!("{}: {e}", path.display()));
            }
        }
    }

    if stats.deleted > 0 {
        info!(
            deleted = stats.deleted,
            bytes_freed = stats.bytes_freed,
            "retention sweep removed expired case files"
        );
    }
    stats
}

fn sweep_entry(path: &Path, cutoff: SystemTime, stats: &mut SweepStats) -> std::io::Result<()> {
    let meta = std::fs::metadata(path)?;
    if meta.modified()? >= cutoff {
        return Ok(());
    }

    let size = if meta.is_dir() { dir_size(path) } else { meta.len() };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    stats.deleted += 1;
    stats.bytes_freed += size;
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| match e.metadata() {
            Ok(m) if m.is_dir() => dir_size(&e.path()),
            Ok(m) => m.len(),
            Err(_) => 0,
        })
        .sum()
}

/// Spawn the periodic sweep task. Decoupled from request handling: a
/// failing sweep only logs, and a slow sweep never blocks a turn.
pub fn spawn_sweeper(roots: Vec<PathBuf>, retention: Duration, interval: Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;
            let stats = sweep(&roots, retention);
            if !stats.errors.is_empty() {
                warn!(errors = stats.errors.len(), "retention sweep finished with errors");
            }
        }
    });
}
