//! Pure Rust codec built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF, TIFF) | `image::ImageReader` with content sniffing |
//! | Resize, one edge | `DynamicImage::resize_exact` (Lanczos3, aspect kept) |
//! | Resize, both edges | `DynamicImage::resize_to_fill` (Lanczos3, center crop) |
//! | Background | alpha-blend onto an opaque RGB canvas |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality` (compression level → zlib effort) |
//! | Encode → WebP | `WebPEncoder::new_lossless` |
//! | Encode → AVIF | `AvifEncoder::new_with_speed_quality` (rav1e) |
//! | Encode → GIF / TIFF | `GifEncoder` / `TiffEncoder` |
//!
//! AVIF is encode-only: the `image` crate's `"avif"` feature does not bring a
//! decoder, so AVIF sources fail to open.

use super::calculations::fit_to_edge;
use super::codec::{AppliedOptions, CodecError, CodecImage, ImageCodec};
use super::color::HexColor;
use super::format::{AvifOptions, EncodeOptions, JpegOptions, OutputFormat, PngOptions};
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, ImageFormat, ImageReader, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const SUPPORTED_FORMATS: &[OutputFormat] = &[
    OutputFormat::Jpeg,
    OutputFormat::Png,
    OutputFormat::Webp,
    OutputFormat::Avif,
    OutputFormat::Gif,
    OutputFormat::Tiff,
];

/// Quality `JpegEncoder::new` uses when none is given.
const JPEG_ENCODER_DEFAULT_QUALITY: u8 = 75;
/// Quality `AvifEncoder::new` uses when none is given.
const AVIF_ENCODER_DEFAULT_QUALITY: u8 = 80;
const AVIF_ENCODER_DEFAULT_SPEED: u8 = 4;

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for RustCodec {
    type Image = RustImage;

    fn supported_formats(&self) -> &[OutputFormat] {
        SUPPORTED_FORMATS
    }

    fn applied_options(&self, options: &EncodeOptions) -> AppliedOptions {
        let quality = match options {
            EncodeOptions::Jpeg(o) => Some(o.quality).filter(|q| *q != JPEG_ENCODER_DEFAULT_QUALITY),
            EncodeOptions::Avif(o) => Some(o.quality).filter(|q| *q != AVIF_ENCODER_DEFAULT_QUALITY),
            _ => None,
        };
        AppliedOptions { quality }
    }

    fn open(&self, path: &Path) -> Result<RustImage, CodecError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let source_format = reader
            .format()
            .and_then(output_format_of)
            .ok_or_else(|| CodecError::Unsupported(path.display().to_string()))?;
        let image = reader.decode().map_err(|e| CodecError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(RustImage {
            image,
            source: path.to_path_buf(),
            encoding: plain_options(source_format),
        })
    }
}

/// An image decoded by [`RustCodec`], plus the encoding it will be written with.
pub struct RustImage {
    image: DynamicImage,
    source: PathBuf,
    encoding: EncodeOptions,
}

impl RustImage {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

impl CodecImage for RustImage {
    fn resize(&mut self, width: Option<u32>, height: Option<u32>) -> Result<(), CodecError> {
        self.image = match (width, height) {
            (None, None) => return Ok(()),
            (Some(w), Some(h)) => self.image.resize_to_fill(w, h, FilterType::Lanczos3),
            _ => {
                let (w, h) = fit_to_edge(self.dimensions(), width, height);
                self.image.resize_exact(w, h, FilterType::Lanczos3)
            }
        };
        Ok(())
    }

    fn set_background(&mut self, color: HexColor) -> Result<(), CodecError> {
        if self.image.color().has_alpha() {
            self.image = flatten(&self.image, color);
        }
        Ok(())
    }

    fn encode(&mut self, options: &EncodeOptions) -> Result<AppliedOptions, CodecError> {
        self.encoding = options.clone();
        Ok(RustCodec.applied_options(options))
    }

    fn write_to(&mut self, path: &Path) -> Result<(), CodecError> {
        let format = self.encoding.format();
        let mut writer = BufWriter::new(File::create(path)?);
        let encoded = match &self.encoding {
            EncodeOptions::Jpeg(o) => {
                let encoder = JpegEncoder::new_with_quality(&mut writer, o.quality);
                DynamicImage::ImageRgb8(self.image.to_rgb8()).write_with_encoder(encoder)
            }
            EncodeOptions::Png(o) => {
                let encoder = PngEncoder::new_with_quality(
                    &mut writer,
                    png_compression(o.compression_level),
                    PngFilter::Adaptive,
                );
                self.image.write_with_encoder(encoder)
            }
            EncodeOptions::Webp(_) => {
                let encoder = WebPEncoder::new_lossless(&mut writer);
                if self.image.color().has_alpha() {
                    DynamicImage::ImageRgba8(self.image.to_rgba8()).write_with_encoder(encoder)
                } else {
                    DynamicImage::ImageRgb8(self.image.to_rgb8()).write_with_encoder(encoder)
                }
            }
            EncodeOptions::Avif(o) => {
                let encoder = AvifEncoder::new_with_speed_quality(&mut writer, o.speed, o.quality);
                self.image.write_with_encoder(encoder)
            }
            EncodeOptions::Gif(_) => {
                let mut encoder = GifEncoder::new(&mut writer);
                encoder.encode_frame(Frame::new(self.image.to_rgba8()))
            }
            EncodeOptions::Tiff(_) => {
                let encoder = TiffEncoder::new(&mut writer);
                self.image.write_with_encoder(encoder)
            }
        };
        encoded.map_err(|e| CodecError::Encode {
            format,
            message: format!("{} ({})", e, self.source.display()),
        })?;
        writer.flush()?;
        Ok(())
    }
}

fn output_format_of(format: ImageFormat) -> Option<OutputFormat> {
    match format {
        ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
        ImageFormat::Png => Some(OutputFormat::Png),
        ImageFormat::WebP => Some(OutputFormat::Webp),
        ImageFormat::Avif => Some(OutputFormat::Avif),
        ImageFormat::Gif => Some(OutputFormat::Gif),
        ImageFormat::Tiff => Some(OutputFormat::Tiff),
        _ => None,
    }
}

/// Encoder-default options, used when a plan only resizes.
fn plain_options(format: OutputFormat) -> EncodeOptions {
    match format {
        OutputFormat::Jpeg => EncodeOptions::Jpeg(JpegOptions {
            quality: JPEG_ENCODER_DEFAULT_QUALITY,
            background: None,
        }),
        OutputFormat::Png => EncodeOptions::Png(PngOptions {
            compression_level: 6,
            background: None,
        }),
        OutputFormat::Avif => EncodeOptions::Avif(AvifOptions {
            quality: AVIF_ENCODER_DEFAULT_QUALITY,
            speed: AVIF_ENCODER_DEFAULT_SPEED,
            background: None,
        }),
        OutputFormat::Webp => EncodeOptions::Webp(Default::default()),
        OutputFormat::Gif => EncodeOptions::Gif(Default::default()),
        OutputFormat::Tiff => EncodeOptions::Tiff(Default::default()),
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Alpha-blend every pixel onto an opaque `color` canvas.
fn flatten(image: &DynamicImage, color: HexColor) -> DynamicImage {
    let [bg_r, bg_g, bg_b] = color.rgb();
    let rgba = image.to_rgba8();
    let blend = |fg: u8, bg: u8, alpha: u32| -> u8 {
        ((fg as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8
    };
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        Rgb([
            blend(r, bg_r, alpha),
            blend(g, bg_g, alpha),
            blend(b, bg_b, alpha),
        ])
    });
    DynamicImage::ImageRgb8(flat)
}
