//! Removal command

use anyhow::{bail, Context, Result};
use console::style;
use picstore::config::PicstoreConfig;
use picstore::name::ImageName;
use picstore::storage::ImageStore;

/// Remove a stored image and its thumbnail
pub struct RmCommand {
    name: String,
}

impl RmCommand {
    /// Create a new command instance
    pub const fn new(name: String) -> Self {
        Self { name }
    }

    /// Execute the command
    pub async fn execute(&self, config: &PicstoreConfig) -> Result<()> {
        let name = ImageName::normalize(&self.name, config.thumbnails.format)?;
        let store = config
            .build_store()
            .context("Failed to prepare storage directories")?;

        let cleanup = store.delete(&name).await;
        if cleanup.is_clean() {
            println!("{} {}", style("✓ Removed").green().bold(), style(&name).cyan());
            return Ok(());
        }

        for failure in &cleanup.failures {
            eprintln!(
                "{} {} {}: {}",
                style("✗").red().bold(),
                failure.artifact,
                failure.path.display(),
                failure.error
            );
        }
        bail!("{} artifact(s) of {name} could not be removed", cleanup.failures.len())
    }
}
