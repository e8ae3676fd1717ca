//! Local ingestion command

use anyhow::{Context, Result};
use console::style;
use picstore::config::PicstoreConfig;
use picstore::name::ImageName;
use picstore::storage::{ImageStore, RasterFormat};
use std::path::{Path, PathBuf};

/// Store a local file the same way an upload would
pub struct PutCommand {
    file: PathBuf,
    name: Option<String>,
}

impl PutCommand {
    /// Create a new command instance
    pub const fn new(file: PathBuf, name: Option<String>) -> Self {
        Self { file, name }
    }

    /// Execute the command
    pub async fn execute(&self, config: &PicstoreConfig) -> Result<()> {
        let name = target_name(&self.file, self.name.as_deref(), config.thumbnails.format)?;
        let store = config
            .build_store()
            .context("Failed to prepare storage directories")?;

        let file = tokio::fs::File::open(&self.file)
            .await
            .with_context(|| format!("Failed to open {}", self.file.display()))?;
        store
            .append(&name, Box::pin(file))
            .await
            .with_context(|| format!("Failed to store {name}"))?;

        println!(
            "{} {}",
            style("✓ Stored").green().bold(),
            style(&name).cyan().bold()
        );
        println!("  {} {}", style("image:").dim(), store.image_path(&name).display());
        println!("  {} {}", style("thumbnail:").dim(), store.thumbnail_path(&name).display());
        Ok(())
    }
}

fn target_name(file: &Path, explicit: Option<&str>, format: RasterFormat) -> Result<ImageName> {
    let name = match explicit {
        Some(raw) => ImageName::normalize(raw, format)?,
        None => {
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("{} has no usable file name", file.display()))?;
            ImageName::from_upload_filename(file_name, format)?
        }
    };
    Ok(name)
}
