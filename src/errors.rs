//! Typed error hierarchy for the workflow tracker.
//!
//! `StoreError` covers the identity store. An absent record or an
//! unresolvable directory is modeled as `Option::None` by the callers,
//! never as an error variant here.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the workflow identity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow store at {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Workflow store at {path} is still locked by another writer")]
    Busy { path: PathBuf },

    #[error("Corrupt workflow record '{hash}': {message}")]
    Corrupt { hash: String, message: String },
}
