use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tracked calculation workflow.
///
/// The typed fields (`hash`, `run_directory`, `stage`) are the ones this
/// crate reads. Everything else a launcher attaches (job IDs, node names,
/// timestamps of its own) lives in `attributes` and survives round-trips
/// without schema changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRecord {
    /// Stable identifier, unique across the store.
    pub hash: String,
    /// Absolute run directory. Set once at registration, never changed.
    pub run_directory: PathBuf,
    /// Latest self-reported status. Last writer wins.
    pub stage: String,
    /// Open-ended extension fields.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Field merge payload for [`WorkflowDb::update`](super::WorkflowDb::update).
///
/// Unset fields leave the stored value untouched; `attributes` entries are
/// merged key-by-key into the record's existing map.
#[derive(Debug, Clone, Default)]
pub struct WorkflowUpdate {
    pub run_directory: Option<PathBuf>,
    pub stage: Option<String>,
    pub attributes: Map<String, Value>,
}

impl WorkflowUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stage field.
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Set the run directory. Only meaningful on the call that creates the
    /// record; later calls should leave it unset.
    pub fn run_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_directory = Some(dir.into());
        self
    }

    /// Attach one extension attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Check whether the update carries any fields at all.
    pub fn is_empty(&self) -> bool {
        self.run_directory.is_none() && self.stage.is_none() && self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_builder_collects_fields() {
        let update = WorkflowUpdate::new()
            .stage("optimizing")
            .attr("job_id", "slurm-4471")
            .attr("node", "cn-0042");
        assert_eq!(update.stage.as_deref(), Some("optimizing"));
        assert!(update.run_directory.is_none());
        assert_eq!(update.attributes.len(), 2);
        assert_eq!(update.attributes["job_id"], "slurm-4471");
    }

    #[test]
    fn empty_update_is_empty() {
        assert!(WorkflowUpdate::new().is_empty());
        assert!(!WorkflowUpdate::new().stage("queued").is_empty());
    }

    #[test]
    fn record_serializes_with_attributes() {
        let mut attributes = Map::new();
        attributes.insert("scheduler".to_string(), Value::from("slurm"));
        let record = WorkflowRecord {
            hash: "ab12cd34ef56".to_string(),
            run_directory: PathBuf::from("/scratch/opt_h2o"),
            stage: "converged".to_string(),
            attributes,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T01:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: WorkflowRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.attributes["scheduler"], "slurm");
    }
}
