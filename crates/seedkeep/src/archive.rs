//! Archive staleness
//!
//! The archive is a snapshot of every account's values kept elsewhere;
//! when the account files change and the archive does not, the user is
//! reminded to refresh it.

use chrono::{DateTime, Duration, Utc};
use seedkeep_core::format;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// No archive file configured
    NotConfigured,
    Missing,
    /// Archive lags the newest account file by more than the allowed days
    Stale { lag: Duration },
    Fresh,
}

/// Compare an archive against the newest account file modification
pub fn check_archive(
    archive: Option<&Path>,
    newest_source: Option<DateTime<Utc>>,
    stale_days: u32,
) -> ArchiveStatus {
    let Some(path) = archive else {
        return ArchiveStatus::NotConfigured;
    };

    let archive_updated = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified),
        Err(_) => {
            warn!("archive missing: {}", path.display());
            warn!("Recommend creating the archive.");
            return ArchiveStatus::Missing;
        }
    };

    classify(archive_updated, newest_source, stale_days, path)
}

fn classify(
    archive_updated: DateTime<Utc>,
    newest_source: Option<DateTime<Utc>>,
    stale_days: u32,
    path: &Path,
) -> ArchiveStatus {
    let Some(newest) = newest_source else {
        return ArchiveStatus::Fresh;
    };
    let lag = newest.signed_duration_since(archive_updated);
    if lag > Duration::days(i64::from(stale_days)) {
        warn!(
            "stale archive: {} is {} older than the newest account file",
            path.display(),
            format::duration(lag.num_seconds() as f64)
        );
        warn!("Recommend checking which accounts changed and, if expected, updating the archive.");
        ArchiveStatus::Stale { lag }
    } else {
        ArchiveStatus::Fresh
    }
}
