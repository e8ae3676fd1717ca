//! Configuration management for picstore
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `PICSTORE_` prefix, `__` for nesting)
//! 2. A file passed explicitly (e.g. `picstore serve --config prod.toml`)
//! 3. `./picstore.toml`
//! 4. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # picstore.toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! body_limit_bytes = 10485760
//!
//! [storage]
//! images_dir = "./static/images"
//! thumbnails_dir = "./static/thumbnails"
//! reconcile_on_start = true
//!
//! [thumbnails]
//! size = 100
//! format = "jpeg"
//! quality = 90
//! max_concurrent = 4
//!
//! [fetch]
//! timeout_secs = 30
//! ```
//!
//! Overriding a nested key from the environment:
//!
//! ```text
//! PICSTORE_THUMBNAILS__SIZE=256 picstore serve
//! ```

use crate::storage::{
    LocalImageStore, RasterFormat, StorageResult, ThumbnailEngine, DEFAULT_GENERATION_LIMIT,
};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "picstore.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "PICSTORE_";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Explicitly requested file does not exist
    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),

    /// A source could not be parsed or merged
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Largest accepted request body
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Storage root settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory of canonical images
    pub images_dir: PathBuf,

    /// Directory of thumbnails
    pub thumbnails_dir: PathBuf,

    /// Run crash recovery before serving
    pub reconcile_on_start: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("./static/images"),
            thumbnails_dir: PathBuf::from("./static/thumbnails"),
            reconcile_on_start: true,
        }
    }
}

/// Thumbnail derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSettings {
    /// Side of the square thumbnail in pixels
    pub size: u32,

    /// Raster format of uploads and thumbnails
    pub format: RasterFormat,

    /// JPEG quality (1-100)
    pub quality: u8,

    /// Thumbnails derived at the same time
    pub max_concurrent: usize,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            size: 100,
            format: RasterFormat::Jpeg,
            quality: crate::storage::thumbnail::DEFAULT_JPEG_QUALITY,
            max_concurrent: DEFAULT_GENERATION_LIMIT,
        }
    }
}

/// Remote URL ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Timeout for the whole remote download
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl FetchSettings {
    /// Timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete picstore configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PicstoreConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Storage roots
    #[serde(default)]
    pub storage: StorageSettings,

    /// Thumbnail derivation
    #[serde(default)]
    pub thumbnails: ThumbnailSettings,

    /// Remote URL ingestion
    #[serde(default)]
    pub fetch: FetchSettings,
}

impl PicstoreConfig {
    /// Layered configuration sources, lowest precedence first
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true))
    }

    /// Loads and validates configuration
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use picstore::config::PicstoreConfig;
    /// use std::path::Path;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = PicstoreConfig::load(Some(Path::new("./config/production.toml")))?;
    /// println!("thumbnails are {0}x{0}", config.thumbnails.size);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, a source is malformed,
    /// or the merged values fail [`PicstoreConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
        }
        let config: Self = Self::figment(path).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot work
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.size == 0 {
            return Err(ConfigError::Invalid("thumbnails.size must be positive".into()));
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Invalid(
                "thumbnails.quality must be between 1 and 100".into(),
            ));
        }
        if self.thumbnails.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "thumbnails.max_concurrent must be positive".into(),
            ));
        }
        if self.storage.images_dir == self.storage.thumbnails_dir {
            return Err(ConfigError::Invalid(
                "storage.images_dir and storage.thumbnails_dir must differ".into(),
            ));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.body_limit_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Thumbnail generator described by this configuration
    #[must_use]
    pub fn engine(&self) -> ThumbnailEngine {
        ThumbnailEngine::new(self.thumbnails.size, self.thumbnails.format)
            .with_quality(self.thumbnails.quality)
    }

    /// Storage manager described by this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the storage roots cannot be prepared.
    pub fn build_store(&self) -> StorageResult<LocalImageStore> {
        Ok(LocalImageStore::new(
            &self.storage.images_dir,
            &self.storage.thumbnails_dir,
            Arc::new(self.engine()),
        )?
        .with_generation_limit(self.thumbnails.max_concurrent))
    }

    /// `host:port` to bind the HTTP listener on
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PicstoreConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.thumbnails.size, 100);
        assert_eq!(config.thumbnails.format, RasterFormat::Jpeg);
        assert_eq!(config.thumbnails.quality, 90);
        assert_eq!(config.storage.images_dir, PathBuf::from("./static/images"));
        assert!(config.storage.reconcile_on_start);
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("picstore.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            port = 9000

            [thumbnails]
            size = 256
            format = "png"
            "#,
        )
        .unwrap();

        let config = PicstoreConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.thumbnails.size, 256);
        assert_eq!(config.thumbnails.format, RasterFormat::Png);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp = TempDir::new().unwrap();
        let result = PicstoreConfig::load(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[thumbnails]\nformat = \"tiff\"\n").unwrap();

        let result = PicstoreConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = PicstoreConfig::default();
        config.thumbnails.size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PicstoreConfig::default();
        config.thumbnails.quality = 0;
        assert!(config.validate().is_err());

        let mut config = PicstoreConfig::default();
        config.storage.thumbnails_dir = config.storage.images_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_store() {
        let temp = TempDir::new().unwrap();
        let mut config = PicstoreConfig::default();
        config.storage.images_dir = temp.path().join("images");
        config.storage.thumbnails_dir = temp.path().join("thumbnails");

        let store = config.build_store().unwrap();
        assert_eq!(store.images_dir(), temp.path().join("images"));
        assert!(temp.path().join("thumbnails").is_dir());
        assert_eq!(config.engine().size(), 100);
    }
}
