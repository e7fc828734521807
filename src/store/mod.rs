//! The workflow identity store: durable, process-external persistence for
//! [`WorkflowRecord`]s, safe to reach from many independent cluster
//! processes at once.

mod db;
mod models;

pub use db::WorkflowDb;
pub use models::{WorkflowRecord, WorkflowUpdate};
