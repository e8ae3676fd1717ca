//! The raster format a deployment ingests and derives

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single raster format accepted for uploads and produced for thumbnails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    /// JPEG (`.jpg`, `.jpeg`)
    #[default]
    Jpeg,
    /// PNG (`.png`)
    Png,
}

impl RasterFormat {
    /// The `image` crate format used for decoding and encoding
    #[must_use]
    pub const fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }

    /// Extension appended to names that carry none
    #[must_use]
    pub const fn canonical_extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Extensions recognized for this format (lowercase)
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
        }
    }

    /// Whether `ext` (without the dot, any case) names this format
    #[must_use]
    pub fn recognizes(self, ext: &str) -> bool {
        self.extensions()
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
        }
    }
}
