use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Name of the per-project configuration file, searched for in the current
/// directory and its ancestors.
const CONFIG_FILE: &str = "qcflow.toml";

/// Runtime configuration for the workflow tracker.
///
/// The only setting that matters is where the shared store lives. Every
/// process of a tracked workflow must see the same file, so the location is
/// resolved the same way everywhere: an explicit `--db` flag beats the
/// `QCFLOW_DB` environment variable, which beats a `store_path` entry in a
/// `qcflow.toml` found walking up from the working directory, which beats
/// the per-user data directory default.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    store_path: Option<PathBuf>,
}

impl Config {
    /// Resolve configuration for the current process.
    pub fn new(explicit_db: Option<PathBuf>) -> Result<Self> {
        let cwd = env::current_dir().context("Failed to get current directory")?;
        let env_db = env::var_os("QCFLOW_DB").map(PathBuf::from);
        Ok(Self::resolve(explicit_db, env_db, &cwd))
    }

    fn resolve(explicit_db: Option<PathBuf>, env_db: Option<PathBuf>, start_dir: &Path) -> Self {
        let db_path = explicit_db
            .or(env_db)
            .or_else(|| Self::find_file_config(start_dir))
            .unwrap_or_else(Self::default_db_path);
        Self { db_path }
    }

    /// Look for a `qcflow.toml` with a `store_path` entry, starting at
    /// `start_dir` and walking up. Relative paths are taken relative to the
    /// file that declares them.
    fn find_file_config(start_dir: &Path) -> Option<PathBuf> {
        for dir in start_dir.ancestors() {
            let candidate = dir.join(CONFIG_FILE);
            if !candidate.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&candidate).ok()?;
            let parsed: FileConfig = toml::from_str(&content).ok()?;
            return parsed.store_path.map(|p| {
                if p.is_absolute() { p } else { dir.join(p) }
            });
        }
        None
    }

    fn default_db_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qcflow")
            .join("workflows.db")
    }

    /// Create the store's parent directory if it does not exist yet.
    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create store directory")?;
        }
        Ok(())
    }
}
