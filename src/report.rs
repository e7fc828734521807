//! The stage reporter: the one call computation code makes to publish
//! progress.
//!
//! Reporting is best-effort instrumentation. A process that is not inside
//! any tracked workflow, or that cannot reach the store while resolving its
//! identity, logs a warning and carries on; it never aborts the host
//! computation.

use std::env;
use std::io::{self, Write};
use std::path::Path;

use tracing::warn;

use crate::errors::StoreError;
use crate::memo::Memo;
use crate::resolve::resolve;
use crate::store::{WorkflowDb, WorkflowUpdate};

/// Reports stage updates for the workflow that owns this process's
/// directory.
///
/// Identity is resolved once per reporter and remembered: a batch job calls
/// [`report_stage`](Self::report_stage) many times and its working directory
/// never changes, so the store is scanned at most once. A failed resolution
/// is retried on the next call.
pub struct StageReporter {
    db: WorkflowDb,
    identity: Memo<Option<String>>,
}

impl StageReporter {
    pub fn new(db: WorkflowDb) -> Self {
        Self {
            db,
            identity: Memo::new(),
        }
    }

    /// Report a stage for the workflow owning the current directory.
    ///
    /// Resolution failures are downgraded to warnings and swallowed. The
    /// only error surfaced is an I/O failure of the final stage write,
    /// which callers are free to ignore.
    pub fn report_stage(&self, message: &str) -> Result<(), StoreError> {
        let cwd = match env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("cannot determine current directory, stage '{}' not recorded: {}", message, e);
                return Ok(());
            }
        };
        self.report_stage_from(&cwd, message)
    }

    /// Report a stage for the workflow owning `dir`.
    pub fn report_stage_from(&self, dir: &Path, message: &str) -> Result<(), StoreError> {
        let hash = match self.identity.get_or_try_init(|| resolve(&self.db, dir)) {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                warn!(
                    dir = %dir.display(),
                    "not inside any tracked workflow, stage '{}' not recorded", message
                );
                return Ok(());
            }
            Err(e) => {
                warn!("could not resolve workflow identity, stage '{}' not recorded: {}", message, e);
                return Ok(());
            }
        };

        // Console output emitted before this call must be visible before the
        // stage change is.
        let _ = io::stdout().flush();

        self.db.update(&hash, &WorkflowUpdate::new().stage(message))
    }
}
