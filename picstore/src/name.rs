//! Basename normalization for stored images
//!
//! Every artifact pair is keyed by a basename that is safe to join onto both
//! storage roots. [`ImageName`] can only be built through normalization, so
//! the storage layer never sees traversal sequences, hidden names (reserved
//! for in-flight temporary files) or a foreign extension.
//!
//! # Examples
//!
//! ```rust
//! use picstore::name::ImageName;
//! use picstore::storage::RasterFormat;
//!
//! let name = ImageName::normalize("dog", RasterFormat::Jpeg)?;
//! assert_eq!(name.as_str(), "dog.jpg");
//!
//! assert!(ImageName::normalize("../etc/passwd", RasterFormat::Jpeg).is_err());
//! # Ok::<(), picstore::name::NameError>(())
//! ```

use crate::storage::RasterFormat;
use std::fmt;
use thiserror::Error;

/// Longest basename accepted (common filesystem limit)
pub const MAX_NAME_LEN: usize = 255;

/// Reasons a requested name is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// Name is empty after trimming
    #[error("Image name can't be empty")]
    Empty,

    /// Name contains separators, control characters or is a dot entry
    #[error("Image name contains invalid characters: {0}")]
    InvalidCharacters(String),

    /// Name starts with a dot
    #[error("Image name can't start with '.': {0}")]
    Hidden(String),

    /// Extension is not one the deployment format recognizes
    #[error("Invalid target file extension '{extension}', expected {expected}")]
    UnsupportedExtension {
        /// Extension that was given
        extension: String,
        /// Format the deployment accepts
        expected: RasterFormat,
    },

    /// Stem carries its own extension (`photo.png.jpg`)
    #[error("Image name must carry a single extension: {0}")]
    MultipleExtensions(String),

    /// Name exceeds [`MAX_NAME_LEN`] bytes
    #[error("Image name is longer than {MAX_NAME_LEN} bytes")]
    TooLong,
}

/// A validated basename with exactly one recognized extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageName(String);

impl ImageName {
    /// Validates a requested name, appending the format's extension when absent
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] describing the first rule the name breaks.
    pub fn normalize(raw: &str, format: RasterFormat) -> Result<Self, NameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name == "." || name == ".." || name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
            return Err(NameError::InvalidCharacters(name.to_string()));
        }
        if name.starts_with('.') {
            return Err(NameError::Hidden(name.to_string()));
        }

        let normalized = match name.rsplit_once('.') {
            None => format!("{name}.{}", format.canonical_extension()),
            Some((stem, ext)) => {
                if !format.recognizes(ext) {
                    return Err(NameError::UnsupportedExtension {
                        extension: ext.to_string(),
                        expected: format,
                    });
                }
                if stem.is_empty() || stem.contains('.') {
                    return Err(NameError::MultipleExtensions(name.to_string()));
                }
                name.to_string()
            }
        };

        if normalized.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }
        Ok(Self(normalized))
    }

    /// Normalizes the filename a client attached to an upload
    ///
    /// Browsers may send a full client-side path; only its last component is kept.
    ///
    /// # Errors
    ///
    /// Same as [`ImageName::normalize`].
    pub fn from_upload_filename(filename: &str, format: RasterFormat) -> Result<Self, NameError> {
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename);
        Self::normalize(base, format)
    }

    /// Recognizes a file name already present in a storage root
    ///
    /// Accepts only names that normalization would leave unchanged under some
    /// supported format, so temporary files and foreign files are skipped.
    pub(crate) fn from_stored(file_name: &str) -> Option<Self> {
        [RasterFormat::Jpeg, RasterFormat::Png]
            .into_iter()
            .find_map(|format| Self::normalize(file_name, format).ok())
            .filter(|name| name.as_str() == file_name)
    }

    /// The basename as stored on disk
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
