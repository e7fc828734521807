//! Launcher-side workflow registration.
//!
//! Job builders call [`register`] once at submission time, before any
//! worker process starts reporting from inside the run directory.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::StoreError;
use crate::store::{WorkflowDb, WorkflowRecord, WorkflowUpdate};

/// Stage every workflow starts in.
pub const INITIAL_STAGE: &str = "queued";

/// Derive the stable workflow identifier for a run directory.
///
/// SHA256 of the directory path, truncated to 12 hex characters. The same
/// directory always yields the same hash, so re-registering a run keeps its
/// record.
pub fn workflow_hash(run_directory: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_directory.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..12].to_string()
}

/// Create (or reset) the record for a workflow about to run in
/// `run_directory`.
///
/// The directory is canonicalized so every process that later reports from
/// inside it derives the same identity regardless of how its own path is
/// spelled. The stage is set to [`INITIAL_STAGE`]; attributes are merged
/// into whatever a previous registration left behind.
pub fn register(
    db: &WorkflowDb,
    run_directory: &Path,
    attributes: serde_json::Map<String, serde_json::Value>,
) -> Result<WorkflowRecord, StoreError> {
    let run_directory = run_directory
        .canonicalize()
        .unwrap_or_else(|_| run_directory.to_path_buf());
    let hash = workflow_hash(&run_directory);
    debug!(hash, run_directory = %run_directory.display(), "registering workflow");

    let mut update = WorkflowUpdate::new()
        .run_directory(&run_directory)
        .stage(INITIAL_STAGE);
    update.attributes = attributes;
    db.update(&hash, &update)?;

    db.read(&hash)?.ok_or_else(|| StoreError::Corrupt {
        hash: hash.clone(),
        message: "record missing immediately after registration".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn hash_is_deterministic_and_short() {
        let a = workflow_hash(&PathBuf::from("/scratch/opt_h2o"));
        let b = workflow_hash(&PathBuf::from("/scratch/opt_h2o"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_directories_get_different_hashes() {
        let a = workflow_hash(&PathBuf::from("/scratch/opt_h2o"));
        let b = workflow_hash(&PathBuf::from("/scratch/opt_nh3"));
        assert_ne!(a, b);
    }

    #[test]
    fn register_creates_record_in_initial_stage() {
        let dir = tempfile::tempdir().unwrap();
        let db = WorkflowDb::new_in_memory().unwrap();

        let mut attributes = serde_json::Map::new();
        attributes.insert("job_id".to_string(), serde_json::Value::from("slurm-4471"));
        let record = register(&db, dir.path(), attributes).unwrap();

        assert_eq!(record.stage, INITIAL_STAGE);
        assert_eq!(record.run_directory, dir.path().canonicalize().unwrap());
        assert_eq!(record.attributes["job_id"], "slurm-4471");
        assert_eq!(record.hash, workflow_hash(&record.run_directory));
    }

    #[test]
    fn re_register_keeps_identity_and_resets_stage() {
        let dir = tempfile::tempdir().unwrap();
        let db = WorkflowDb::new_in_memory().unwrap();

        let first = register(&db, dir.path(), serde_json::Map::new()).unwrap();
        db.update(&first.hash, &WorkflowUpdate::new().stage("failed at step 3"))
            .unwrap();

        let second = register(&db, dir.path(), serde_json::Map::new()).unwrap();
        assert_eq!(second.hash, first.hash);
        assert_eq!(second.stage, INITIAL_STAGE);
        assert_eq!(db.count().unwrap(), 1);
    }
}
