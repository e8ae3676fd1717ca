//! Crash recovery command

use anyhow::{Context, Result};
use console::style;
use picstore::config::PicstoreConfig;

/// Rebuild or discard artifacts left by an interrupted run
pub struct ReconcileCommand;

impl ReconcileCommand {
    /// Execute the command
    pub async fn execute(config: &PicstoreConfig) -> Result<()> {
        let store = config
            .build_store()
            .context("Failed to prepare storage directories")?;
        let report = store.reconcile().await.context("Reconcile failed")?;

        if report.is_noop() {
            println!("{}", style("✓ Nothing to repair").green().bold());
            return Ok(());
        }

        for name in &report.regenerated {
            println!("  {} {name}", style("rebuilt thumbnail").cyan());
        }
        for name in &report.discarded {
            println!("  {} {name}", style("discarded").yellow());
        }
        for name in &report.failed {
            println!("  {} {name}", style("could not rebuild, kept image").red());
        }
        for name in &report.orphaned_thumbnails {
            println!("  {} {name}", style("removed orphan thumbnail").yellow());
        }
        if report.temp_files_removed > 0 {
            println!(
                "  {} {}",
                style("removed temporary files:").yellow(),
                report.temp_files_removed
            );
        }
        Ok(())
    }
}
