//! Square thumbnail generation
//!
//! A thumbnail is derived in four steps:
//! - decode the source in the deployment's raster format
//! - crop the longer axis symmetrically around the center
//! - resample the square to `size × size` with a Lanczos filter
//! - encode in the same format with fixed encoder settings
//!
//! Fixed encoder settings make the output a pure function of the source bytes
//! and the target size.
//!
//! # Examples
//!
//! ```rust,no_run
//! use picstore::storage::{RasterFormat, ThumbnailEngine, ThumbnailGenerator};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ThumbnailEngine::new(100, RasterFormat::Jpeg);
//! engine.execute(Path::new("/srv/images/dog.jpg"), Path::new("/srv/thumbnails/dog.jpg"))?;
//! # Ok(())
//! # }
//! ```

use super::format::RasterFormat;
use super::traits::ThumbnailGenerator;
use super::types::{StorageError, StorageResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{imageops::FilterType, DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Default JPEG quality for thumbnails
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Thumbnail generator producing fixed-size square images
#[derive(Debug, Clone)]
pub struct ThumbnailEngine {
    /// Side of the generated square in pixels
    size: u32,
    format: RasterFormat,
    quality: u8,
    filter: FilterType,
}

impl ThumbnailEngine {
    /// Creates an engine for `size × size` thumbnails
    ///
    /// Uses `FilterType::Lanczos3` and a JPEG quality of [`DEFAULT_JPEG_QUALITY`].
    #[must_use]
    pub const fn new(size: u32, format: RasterFormat) -> Self {
        Self {
            size,
            format,
            quality: DEFAULT_JPEG_QUALITY,
            filter: FilterType::Lanczos3,
        }
    }

    /// Sets the JPEG quality (clamped to 1..=100, ignored for PNG)
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Side of the generated square in pixels
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Raster format read and written
    #[must_use]
    pub const fn format(&self) -> RasterFormat {
        self.format
    }

    fn decode(&self, source: &Path) -> StorageResult<DynamicImage> {
        let file = File::open(source)?;
        ImageReader::with_format(BufReader::new(file), self.format.image_format())
            .decode()
            .map_err(StorageError::Decode)
    }

    /// Crops to the centered square and resamples it to the target size
    fn derive(&self, img: &DynamicImage) -> StorageResult<DynamicImage> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(StorageError::Degenerate { width, height });
        }
        if self.size == 0 {
            return Err(StorageError::Degenerate {
                width: self.size,
                height: self.size,
            });
        }

        let (x, y, side) = center_crop(width, height);
        debug!(width, height, x, y, side, size = self.size, "Deriving thumbnail");

        let square = if width == height {
            img.resize_exact(self.size, self.size, self.filter)
        } else {
            img.crop_imm(x, y, side, side)
                .resize_exact(self.size, self.size, self.filter)
        };
        Ok(square)
    }

    fn encode(&self, img: DynamicImage) -> StorageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        match self.format {
            RasterFormat::Jpeg => {
                // JPEG has no alpha channel
                let img = if img.color().has_alpha() {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                } else {
                    img
                };
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
                img.write_with_encoder(encoder).map_err(StorageError::Encode)?;
            }
            RasterFormat::Png => {
                let encoder =
                    PngEncoder::new_with_quality(&mut buffer, CompressionType::Default, PngFilter::Adaptive);
                img.write_with_encoder(encoder).map_err(StorageError::Encode)?;
            }
        }
        Ok(buffer)
    }
}

impl ThumbnailGenerator for ThumbnailEngine {
    fn execute(&self, source: &Path, destination: &Path) -> StorageResult<()> {
        let img = self.decode(source)?;
        let thumbnail = self.derive(&img)?;
        drop(img);
        let data = self.encode(thumbnail)?;

        let mut out = BufWriter::new(File::create(destination)?);
        out.write_all(&data)?;
        out.into_inner().map_err(std::io::IntoInnerError::into_error)?.sync_all()?;
        Ok(())
    }
}

/// Centered square crop of a `width × height` image
///
/// Returns `(x, y, side)` where `side = min(width, height)` and the excess on
/// the longer axis is discarded equally from both ends (the odd pixel, if any,
/// from the far end).
#[must_use]
pub const fn center_crop(width: u32, height: u32) -> (u32, u32, u32) {
    let side = if width < height { width } else { height };
    ((width - side) / 2, (height - side) / 2, side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, Rgba};
    use tempfile::TempDir;

    /// Writes a 200x100 PNG with four vertical 50px bands: red, green, blue, yellow
    fn write_banded_png(path: &Path) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(200, 100, |x, _| match x {
            0..=49 => Rgb([255, 0, 0]),
            50..=99 => Rgb([0, 255, 0]),
            100..=149 => Rgb([0, 0, 255]),
            _ => Rgb([255, 255, 0]),
        });
        DynamicImage::ImageRgb8(img)
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn write_solid(path: &Path, width: u32, height: u32, format: ImageFormat) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |_, _| Rgb([200, 40, 40]));
        DynamicImage::ImageRgb8(img).save_with_format(path, format).unwrap();
    }

    #[test]
    fn test_center_crop() {
        assert_eq!(center_crop(200, 100), (50, 0, 100));
        assert_eq!(center_crop(100, 200), (0, 50, 100));
        assert_eq!(center_crop(64, 64), (0, 0, 64));
        assert_eq!(center_crop(101, 100), (0, 0, 100));
        assert_eq!(center_crop(1, 9), (0, 4, 1));
    }

    #[test]
    fn test_jpeg_thumbnail_dimensions() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.jpg");
        let dst = temp.path().join("dst.jpg");
        write_solid(&src, 320, 240, ImageFormat::Jpeg);

        let engine = ThumbnailEngine::new(100, RasterFormat::Jpeg);
        engine.execute(&src, &dst).unwrap();

        let thumb = image::open(&dst).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (100, 100));
    }

    #[test]
    fn test_crop_discards_outer_bands() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("bands.png");
        let dst = temp.path().join("thumb.png");
        write_banded_png(&src);

        let engine = ThumbnailEngine::new(10, RasterFormat::Png);
        engine.execute(&src, &dst).unwrap();

        let thumb = image::open(&dst).unwrap().to_rgb8();
        assert_eq!(thumb.dimensions(), (10, 10));
        // Red and yellow bands lie outside the centered crop; neither has red=0
        for pixel in thumb.pixels() {
            assert_eq!(pixel[0], 0, "pixel {pixel:?} carries red from an outer band");
        }
        let left = thumb.get_pixel(0, 5);
        let right = thumb.get_pixel(9, 5);
        assert!(left[1] > left[2], "left edge should be green, got {left:?}");
        assert!(right[2] > right[1], "right edge should be blue, got {right:?}");
    }

    #[test]
    fn test_square_source_is_only_resized() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("square.png");
        let dst = temp.path().join("thumb.png");
        write_solid(&src, 40, 40, ImageFormat::Png);

        ThumbnailEngine::new(20, RasterFormat::Png).execute(&src, &dst).unwrap();

        let thumb = image::open(&dst).unwrap().to_rgb8();
        assert_eq!(thumb.dimensions(), (20, 20));
        assert_eq!(thumb.get_pixel(10, 10), &Rgb([200, 40, 40]));
    }

    #[test]
    fn test_output_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.jpg");
        write_solid(&src, 300, 150, ImageFormat::Jpeg);

        let engine = ThumbnailEngine::new(64, RasterFormat::Jpeg);
        let first = temp.path().join("a.jpg");
        let second = temp.path().join("b.jpg");
        engine.execute(&src, &first).unwrap();
        engine.execute(&src, &second).unwrap();

        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    }

    #[test]
    fn test_alpha_is_flattened_for_jpeg() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("alpha.png");
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_fn(30, 30, |_, _| Rgba([10, 20, 30, 128]));
        DynamicImage::ImageRgba8(img).save_with_format(&src, ImageFormat::Png).unwrap();

        let engine = ThumbnailEngine::new(8, RasterFormat::Png);
        let rgba = engine.derive(&engine.decode(&src).unwrap()).unwrap();
        assert!(rgba.color().has_alpha());

        let jpeg = ThumbnailEngine::new(8, RasterFormat::Jpeg).encode(rgba).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn test_non_image_is_decode_error() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("notes.jpg");
        let dst = temp.path().join("thumb.jpg");
        std::fs::write(&src, b"just some text, not a picture").unwrap();

        let err = ThumbnailEngine::new(100, RasterFormat::Jpeg)
            .execute(&src, &dst)
            .unwrap_err();
        assert!(matches!(err, StorageError::Decode(_)), "got {err:?}");
        assert!(!dst.exists());
    }

    #[test]
    fn test_foreign_format_is_decode_error() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("actually_png.jpg");
        let dst = temp.path().join("thumb.jpg");
        write_solid(&src, 10, 10, ImageFormat::Png);

        let err = ThumbnailEngine::new(5, RasterFormat::Jpeg)
            .execute(&src, &dst)
            .unwrap_err();
        assert!(matches!(err, StorageError::Decode(_)));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = ThumbnailEngine::new(5, RasterFormat::Jpeg)
            .execute(&temp.path().join("absent.jpg"), &temp.path().join("out.jpg"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn test_zero_size_is_degenerate() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.png");
        write_solid(&src, 10, 10, ImageFormat::Png);

        let err = ThumbnailEngine::new(0, RasterFormat::Png)
            .execute(&src, &temp.path().join("out.png"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Degenerate { width: 0, height: 0 }));
    }

    #[test]
    fn test_quality_is_clamped() {
        let engine = ThumbnailEngine::new(10, RasterFormat::Jpeg).with_quality(0);
        assert_eq!(engine.quality, 1);
        let engine = engine.with_quality(250);
        assert_eq!(engine.quality, 100);
    }
}
