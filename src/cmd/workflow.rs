//! Workflow registration, stage reporting, and directory resolution
//! commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use qcflow::config::Config;
use qcflow::report::StageReporter;
use qcflow::resolve::resolve;
use qcflow::store::WorkflowDb;
use qcflow::workflow::register;

fn open_store(config: &Config) -> Result<WorkflowDb> {
    config.ensure_directories()?;
    Ok(WorkflowDb::new(&config.db_path)?)
}

fn target_dir(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(d) => Ok(d.to_path_buf()),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

pub fn cmd_register(config: &Config, dir: Option<&Path>, attrs: &[String]) -> Result<()> {
    let dir = target_dir(dir)?;
    let attributes = parse_attrs(attrs)?;

    let db = open_store(config)?;
    let record = register(&db, &dir, attributes)?;

    println!("Registered workflow {}", record.hash);
    println!("  run directory: {}", record.run_directory.display());
    println!("  stage:         {}", record.stage);
    Ok(())
}

pub fn cmd_report(config: &Config, dir: Option<&Path>, message: &str) -> Result<()> {
    let db = open_store(config)?;
    let reporter = StageReporter::new(db);
    match dir {
        Some(d) => reporter.report_stage_from(d, message)?,
        None => reporter.report_stage(message)?,
    }
    Ok(())
}

pub fn cmd_resolve(config: &Config, dir: Option<&Path>) -> Result<()> {
    let dir = target_dir(dir)?;
    let db = open_store(config)?;

    match resolve(&db, &dir)? {
        Some(hash) => println!("{}", hash),
        None => {
            println!(
                "{} is not inside any tracked workflow",
                console::style(dir.display()).dim()
            );
        }
    }
    Ok(())
}

/// Parse `key=value` pairs. Values that parse as JSON are stored typed;
/// everything else is kept as a string.
fn parse_attrs(attrs: &[String]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for attr in attrs {
        let Some((key, value)) = attr.split_once('=') else {
            bail!("Invalid attribute '{}': expected KEY=VALUE", attr);
        };
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        map.insert(key.to_string(), value);
    }
    Ok(map)
}
