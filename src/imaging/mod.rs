//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from content) |
//! | **Resize** | Lanczos3; one edge keeps aspect, two edges crop to fill |
//! | **Background** | alpha flattening onto an opaque color |
//! | **Encode** | JPEG, PNG, WebP (lossless), AVIF (rav1e), GIF, TIFF |
//!
//! The module is split into:
//! - **Format**: [`OutputFormat`] and the per-format option records
//! - **Color**: background color normalization ([`HexColor`])
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Codec**: [`ImageCodec`] / [`CodecImage`] traits + [`RustCodec`]

pub mod calculations;
pub mod codec;
pub mod color;
pub mod format;
pub mod rust_codec;

pub use codec::{AppliedOptions, CodecError, CodecImage, ImageCodec};
pub use color::HexColor;
pub use format::{EncodeOptions, FormatDefaults, OutputFormat, Quality};
pub use rust_codec::RustCodec;
