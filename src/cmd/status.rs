//! Workflow listing and inspection commands.

use anyhow::{Result, bail};

use qcflow::config::Config;
use qcflow::store::WorkflowDb;

pub fn cmd_list(config: &Config) -> Result<()> {
    let db = WorkflowDb::new(&config.db_path)?;
    let records = db.read_all()?;

    if records.is_empty() {
        println!();
        println!("No workflows tracked in {}", config.db_path.display());
        println!();
        return Ok(());
    }

    println!();
    println!("Workflows in {}", config.db_path.display());
    println!();
    println!("{:<14} {:<24} Run directory", "Hash", "Stage");
    println!("{:<14} {:<24} -------------", "------------", "-----");
    for record in records.values() {
        println!(
            "{:<14} {:<24} {}",
            record.hash,
            record.stage,
            console::style(record.run_directory.display()).dim()
        );
    }
    println!();
    println!("{} workflows", records.len());
    println!();
    Ok(())
}

pub fn cmd_show(config: &Config, hash: &str) -> Result<()> {
    let db = WorkflowDb::new(&config.db_path)?;
    match db.read(hash)? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("No workflow with hash '{}'", hash),
    }
}
