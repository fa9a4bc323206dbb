//! Shared test utilities for the htmlimg test suite.
//!
//! Synthetic image writers and a throwaway source tree, so tests never
//! depend on fixture files checked into the repository.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_source_tree();
//! let session = Session::open(tmp.path(), ".img", false).unwrap();
//! // tmp/img/photo.jpg (400x300) and tmp/img/clear.png (8x8, transparent)
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a small valid JPEG with a gradient so resampling has work to do.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a fully transparent blue PNG.
pub fn create_test_png_with_alpha(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 255, 0]));
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

// =========================================================================
// Source tree
// =========================================================================

/// A temp source root holding `img/photo.jpg` (400x300) and
/// `img/clear.png` (8x8, transparent).
pub fn setup_source_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let img_dir = tmp.path().join("img");
    std::fs::create_dir_all(&img_dir).unwrap();
    create_test_jpeg(&img_dir.join("photo.jpg"), 400, 300);
    create_test_png_with_alpha(&img_dir.join("clear.png"), 8, 8);
    tmp
}
