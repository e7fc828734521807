//! Maps "the directory this process runs in" to "which workflow it is".

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::StoreError;
use crate::store::WorkflowDb;

/// Find the workflow whose `run_directory` contains `path`.
///
/// A record matches when `path` is at or below its run directory; matching
/// is path-component-wise, so `/x/run1` never claims `/x/run10`. Run
/// directories of tracked workflows are not supposed to nest; when they do
/// anyway, the longest matching run directory wins and a warning is logged.
/// `Ok(None)` means the path belongs to no tracked workflow.
///
/// This is a linear scan over the whole store on every call. The store holds
/// at most thousands of records, each reporting process resolves a handful
/// of times at most, and [`Memo`](crate::memo::Memo) amortizes the rest.
pub fn resolve(db: &WorkflowDb, path: &Path) -> Result<Option<String>, StoreError> {
    let records = db.read_all()?;

    let mut best: Option<(&String, &PathBuf)> = None;
    let mut matched = 0usize;
    for record in records.values() {
        // A record created by a bare stage update has no run directory yet;
        // an empty path would prefix-match everything.
        if record.run_directory.as_os_str().is_empty() {
            continue;
        }
        if path.starts_with(&record.run_directory) {
            matched += 1;
            let longer = match best {
                Some((_, current)) => {
                    record.run_directory.as_os_str().len() > current.as_os_str().len()
                }
                None => true,
            };
            if longer {
                best = Some((&record.hash, &record.run_directory));
            }
        }
    }

    if matched > 1 {
        let (hash, run_directory) = best.expect("matched > 1 implies a best match");
        warn!(
            path = %path.display(),
            chosen = %hash,
            run_directory = %run_directory.display(),
            "multiple workflows claim this directory; picking the longest run directory"
        );
    }

    Ok(best.map(|(hash, _)| hash.clone()))
}
