//! Codec trait and shared types.
//!
//! The [`ImageCodec`] trait is the seam between deciding *what* to produce
//! (the planner) and producing it (pixel work). A codec answers two kinds of
//! questions:
//!
//! - Cheap, pure ones the planner asks while naming outputs:
//!   [`supported_formats`](ImageCodec::supported_formats) and
//!   [`applied_options`](ImageCodec::applied_options).
//! - Expensive ones the executor asks while generating: [`open`](ImageCodec::open)
//!   returns a [`CodecImage`] handle that is resized, flattened, encoded and
//!   written.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests use the recording
//! `MockCodec` in this module's test submodule.

use super::color::HexColor;
use super::format::{EncodeOptions, OutputFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error("{format} encoding failed: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
    #[error("Unsupported source format: {0}")]
    Unsupported(String),
}

/// What an encode will actually do, as far as naming is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedOptions {
    /// Output quality, reported only when it differs from the encoder's own
    /// default.
    pub quality: Option<u8>,
}

/// Trait for image codecs.
pub trait ImageCodec: Sync {
    type Image: CodecImage;

    /// Formats this codec can encode.
    fn supported_formats(&self) -> &[OutputFormat];

    fn supports(&self, format: OutputFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Resolve the options an encode with `options` would apply, without
    /// touching any pixels.
    fn applied_options(&self, options: &EncodeOptions) -> AppliedOptions;

    /// Decode the source image at `path`.
    fn open(&self, path: &Path) -> Result<Self::Image, CodecError>;
}

/// A decoded image being transformed.
///
/// Operations are recorded or applied in call order; nothing reaches disk
/// until [`write_to`](CodecImage::write_to).
pub trait CodecImage {
    /// Resize to the given edges. One edge keeps the aspect ratio; two edges
    /// crop to fill.
    fn resize(&mut self, width: Option<u32>, height: Option<u32>) -> Result<(), CodecError>;

    /// Flatten any transparency onto `color`. Opaque images are already flat
    /// and pass through unchanged.
    fn set_background(&mut self, color: HexColor) -> Result<(), CodecError>;

    /// Select the output encoding. Without this call the image is written in
    /// its source format with encoder defaults.
    fn encode(&mut self, options: &EncodeOptions) -> Result<AppliedOptions, CodecError>;

    /// Encode and write to `path`. The path's extension is not consulted.
    fn write_to(&mut self, path: &Path) -> Result<(), CodecError>;
}
