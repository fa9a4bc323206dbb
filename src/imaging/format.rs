//! Output formats and their encoder settings.
//!
//! Every format the pipeline can write is a variant of [`OutputFormat`], and
//! every variant has its own strongly typed options record. The records double
//! as the `[formats.*]` tables in `htmlimg.toml`, so the stock defaults here are
//! also the stock config values.
//!
//! ## Types
//!
//! - [`OutputFormat`]: closed set of encodable formats, with name lookup
//!   (`jpg` → JPEG, `tif` → TIFF).
//! - [`Quality`]: lossy encoding quality (1–100).
//! - [`FormatDefaults`]: one options record per format, loaded from config.
//! - [`EncodeOptions`]: the options for one encode call: a format-tagged copy
//!   of a defaults record with explicit overrides laid over it field by field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An image format the codec can be asked to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
    Gif,
    Tiff,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Avif,
        OutputFormat::Gif,
        OutputFormat::Tiff,
    ];

    /// Look up a format by name or file extension, case-insensitively.
    ///
    /// `jpg` and `tif` resolve to their canonical formats; the caller keeps
    /// the literal token for naming.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "gif" => Some(Self::Gif),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Parse a query-parameter value. Anything that is not an integer in
    /// 1..=100 is rejected rather than clamped.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().parse::<u8>() {
            Ok(value @ 1..=100) => Some(Self(value)),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

fn default_jpeg_quality() -> u8 {
    81
}

fn default_png_compression() -> u8 {
    9
}

fn default_avif_quality() -> u8 {
    80
}

fn default_avif_speed() -> u8 {
    6
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegOptions {
    pub quality: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: default_jpeg_quality(),
            background: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngOptions {
    /// zlib effort, 0 (fastest) to 9 (smallest).
    pub compression_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            compression_level: default_png_compression(),
            background: None,
        }
    }
}

/// WebP is written lossless, so there is no quality knob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebpOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvifOptions {
    pub quality: u8,
    /// rav1e speed preset, 1 (slowest) to 10 (fastest).
    pub speed: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: default_avif_quality(),
            speed: default_avif_speed(),
            background: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GifOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TiffOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// Per-format encoder defaults (`[formats.*]` in config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatDefaults {
    pub jpeg: JpegOptions,
    pub png: PngOptions,
    pub webp: WebpOptions,
    pub avif: AvifOptions,
    pub gif: GifOptions,
    pub tiff: TiffOptions,
}

impl FormatDefaults {
    /// The configured defaults for `format`, ready for overrides.
    pub fn options_for(&self, format: OutputFormat) -> EncodeOptions {
        match format {
            OutputFormat::Jpeg => EncodeOptions::Jpeg(self.jpeg.clone()),
            OutputFormat::Png => EncodeOptions::Png(self.png.clone()),
            OutputFormat::Webp => EncodeOptions::Webp(self.webp.clone()),
            OutputFormat::Avif => EncodeOptions::Avif(self.avif.clone()),
            OutputFormat::Gif => EncodeOptions::Gif(self.gif.clone()),
            OutputFormat::Tiff => EncodeOptions::Tiff(self.tiff.clone()),
        }
    }
}

/// Settings for a single encode, tagged with the target format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOptions {
    Jpeg(JpegOptions),
    Png(PngOptions),
    Webp(WebpOptions),
    Avif(AvifOptions),
    Gif(GifOptions),
    Tiff(TiffOptions),
}

impl EncodeOptions {
    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Jpeg(_) => OutputFormat::Jpeg,
            Self::Png(_) => OutputFormat::Png,
            Self::Webp(_) => OutputFormat::Webp,
            Self::Avif(_) => OutputFormat::Avif,
            Self::Gif(_) => OutputFormat::Gif,
            Self::Tiff(_) => OutputFormat::Tiff,
        }
    }

    /// Requested lossy quality, for formats that have one.
    pub fn quality(&self) -> Option<u8> {
        match self {
            Self::Jpeg(o) => Some(o.quality),
            Self::Avif(o) => Some(o.quality),
            Self::Png(_) | Self::Webp(_) | Self::Gif(_) | Self::Tiff(_) => None,
        }
    }

    /// Overlay an explicit quality. Returns `false` (and changes nothing)
    /// when the format has no quality setting.
    pub fn set_quality(&mut self, quality: Quality) -> bool {
        match self {
            Self::Jpeg(o) => o.quality = quality.value(),
            Self::Avif(o) => o.quality = quality.value(),
            Self::Png(_) | Self::Webp(_) | Self::Gif(_) | Self::Tiff(_) => return false,
        }
        true
    }

    /// Default background from config, not yet validated.
    pub fn background(&self) -> Option<&str> {
        let background = match self {
            Self::Jpeg(o) => &o.background,
            Self::Png(o) => &o.background,
            Self::Webp(o) => &o.background,
            Self::Avif(o) => &o.background,
            Self::Gif(o) => &o.background,
            Self::Tiff(o) => &o.background,
        };
        background.as_deref()
    }
}
