//! Transform planning.
//!
//! Turns a parsed [`ImageReference`] into a [`PlanAction`]: leave the
//! reference alone, swap in another path, or generate an artifact. Planning is
//! pure. It never touches the filesystem or pixels, and it reports invalid
//! parameters as [`PlanWarning`]s next to the result instead of printing them.
//!
//! ## Rules, in order
//!
//! 1. `width` / `height` add a resize step and `.w<N>` / `.h<N>` name
//!    fragments for each value that parses as a positive integer.
//! 2. `format`, `quality` or `background` add a format step. The target is
//!    the `format` parameter, else the source extension. `jpg` resolves to the
//!    JPEG encoder but the literal token is kept for the file extension.
//! 3. The format's configured defaults are overlaid with the explicit quality
//!    and background.
//! 4. A valid background adds `.x<rrggbb>`; a quality the codec reports as
//!    non-default adds `.q<N>`. The background fragment follows the request,
//!    not the source pixels: an opaque source is flattened as a no-op but
//!    still named `.x<rrggbb>`, so names stay a function of the reference.
//!
//! ```text
//! img/photo.jpg?width=800&format=webp&background=fff
//!   → photo.w800.xffffff.webp
//! ```
//!
//! The operating mode is consulted once, up front: `skip` substitutes the
//! decoded path, `format-only` keeps just the extension rename, and
//! `transform` runs every rule.

use crate::imaging::{EncodeOptions, FormatDefaults, HexColor, ImageCodec, OutputFormat, Quality};
use crate::reference::ImageReference;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// How much work the pipeline does per reference.
///
/// Only honoured for interactive runs; see [`OperatingMode::effective`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum OperatingMode {
    /// Resize, convert and encode.
    #[default]
    Transform,
    /// Point every reference at its original file.
    Skip,
    /// Rename extensions only; no pixel work.
    #[serde(alias = "formatOnly")]
    FormatOnly,
}

impl OperatingMode {
    /// One-shot builds always transform fully.
    pub fn effective(self, interactive: bool) -> Self {
        if interactive { self } else { Self::Transform }
    }
}

/// A parameter problem. Planning carries on without the offending value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    #[error("parameter {name} with value `{value}` is not a positive integer")]
    InvalidDimension { name: &'static str, value: String },
    #[error("image format `{0}` is not supported")]
    UnsupportedFormat(String),
    #[error("image quality `{0}` is not an integer between 1 and 100")]
    InvalidQuality(String),
    #[error("{0} has no quality setting; quality ignored")]
    QualityIgnored(OutputFormat),
    #[error("background `{0}` is not a 3 or 6 digit hex color")]
    InvalidBackground(String),
}

/// One transformation, applied in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformStep {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },
    Format {
        options: EncodeOptions,
        background: Option<HexColor>,
    },
}

/// Everything needed to generate one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformPlan {
    /// Source path relative to the source root.
    pub source: PathBuf,
    /// Resize before format. Empty means a plain copy.
    pub steps: Vec<TransformStep>,
    /// Original stem plus resize fragments, e.g. `photo.w100`.
    pub base_name: String,
    /// Background and quality fragments plus the extension, e.g. `.q60.jpg`.
    pub extension: String,
}

impl TransformPlan {
    pub fn output_name(&self) -> String {
        format!("{}{}", self.base_name, self.extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// Leave the matched text untouched.
    Keep,
    /// Replace the matched text with this path; nothing is generated.
    Substitute(String),
    Generate(TransformPlan),
}

/// A plan with the warnings raised while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planned {
    pub action: PlanAction,
    pub warnings: Vec<PlanWarning>,
}

/// What the planner needs besides the reference.
pub struct PlanContext<'a, C: ImageCodec> {
    pub codec: &'a C,
    pub formats: &'a FormatDefaults,
    /// Already resolved through [`OperatingMode::effective`].
    pub mode: OperatingMode,
}

pub fn plan_reference<C: ImageCodec>(
    reference: &ImageReference,
    ctx: &PlanContext<'_, C>,
) -> Planned {
    let mut warnings = Vec::new();
    let action = match ctx.mode {
        OperatingMode::Skip => PlanAction::Substitute(reference.decoded_path.clone()),
        OperatingMode::FormatOnly => plan_format_only(reference, ctx.codec, &mut warnings),
        OperatingMode::Transform => plan_transform(reference, ctx, &mut warnings),
    };
    Planned { action, warnings }
}

fn plan_transform<C: ImageCodec>(
    reference: &ImageReference,
    ctx: &PlanContext<'_, C>,
    warnings: &mut Vec<PlanWarning>,
) -> PlanAction {
    let (stem, source_ext) = reference.split_file_name();
    let mut steps = Vec::new();
    let mut base_name = stem.to_string();
    let mut extension = source_ext.to_string();

    // Resize
    let width = dimension(reference, "width", warnings);
    let height = dimension(reference, "height", warnings);
    if width.is_some() || height.is_some() {
        if let Some(w) = width {
            base_name.push_str(&format!(".w{w}"));
        }
        if let Some(h) = height {
            base_name.push_str(&format!(".h{h}"));
        }
        steps.push(TransformStep::Resize { width, height });
    }

    // Format, quality, background
    let wants_format = ["format", "quality", "background"]
        .iter()
        .any(|name| reference.param(name).is_some());
    if wants_format && let Some((token, format)) = target_format(reference, ctx.codec, warnings) {
        let mut options = ctx.formats.options_for(format);

        if let Some(raw) = reference.param("quality") {
            match Quality::parse(raw) {
                Some(quality) => {
                    if !options.set_quality(quality) {
                        warnings.push(PlanWarning::QualityIgnored(format));
                    }
                }
                None => warnings.push(PlanWarning::InvalidQuality(raw.to_string())),
            }
        }

        let background = match reference.param("background").or(options.background()) {
            Some(raw) => {
                let parsed = HexColor::parse(raw);
                if parsed.is_none() {
                    warnings.push(PlanWarning::InvalidBackground(raw.to_string()));
                }
                parsed
            }
            None => None,
        };

        extension.clear();
        if let Some(color) = background {
            extension.push_str(&format!(".x{}", color.hex()));
        }
        if let Some(quality) = ctx.codec.applied_options(&options).quality {
            extension.push_str(&format!(".q{quality}"));
        }
        extension.push('.');
        extension.push_str(token);

        steps.push(TransformStep::Format {
            options,
            background,
        });
    }

    let plan = TransformPlan {
        source: reference.relative_path().to_path_buf(),
        steps,
        base_name,
        extension,
    };
    if plan.steps.is_empty() || plan.output_name() == reference.path {
        PlanAction::Keep
    } else {
        PlanAction::Generate(plan)
    }
}

/// Extension rename only. A changed name is generated as a byte copy so the
/// new path resolves; an unchanged name or an unsupported format points at
/// the original file.
fn plan_format_only<C: ImageCodec>(
    reference: &ImageReference,
    codec: &C,
    warnings: &mut Vec<PlanWarning>,
) -> PlanAction {
    let (stem, _) = reference.split_file_name();
    let Some(token) = reference.param("format").filter(|t| !t.is_empty()) else {
        return PlanAction::Substitute(reference.decoded_path.clone());
    };
    if !OutputFormat::from_name(token).is_some_and(|f| codec.supports(f)) {
        warnings.push(PlanWarning::UnsupportedFormat(token.to_string()));
        return PlanAction::Substitute(reference.decoded_path.clone());
    }
    let output_name = format!("{stem}.{token}");
    if output_name == reference.file_name() {
        return PlanAction::Substitute(reference.decoded_path.clone());
    }
    PlanAction::Generate(TransformPlan {
        source: reference.relative_path().to_path_buf(),
        steps: Vec::new(),
        base_name: stem.to_string(),
        extension: format!(".{token}"),
    })
}

fn dimension(
    reference: &ImageReference,
    name: &'static str,
    warnings: &mut Vec<PlanWarning>,
) -> Option<u32> {
    let raw = reference.param(name)?;
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warnings.push(PlanWarning::InvalidDimension {
                name,
                value: raw.to_string(),
            });
            None
        }
    }
}

/// The literal extension token and the encoder it resolves to.
///
/// An unsupported `format` parameter falls back to the source extension.
fn target_format<'r, C: ImageCodec>(
    reference: &'r ImageReference,
    codec: &C,
    warnings: &mut Vec<PlanWarning>,
) -> Option<(&'r str, OutputFormat)> {
    let (_, source_ext) = reference.split_file_name();
    let source_token = source_ext.trim_start_matches('.');

    if let Some(requested) = reference.param("format") {
        match OutputFormat::from_name(requested).filter(|f| codec.supports(*f)) {
            Some(format) => return Some((requested, format)),
            None => warnings.push(PlanWarning::UnsupportedFormat(requested.to_string())),
        }
    }

    match OutputFormat::from_name(source_token).filter(|f| codec.supports(*f)) {
        Some(format) => Some((source_token, format)),
        None => {
            if reference.param("format").is_none() {
                warnings.push(PlanWarning::UnsupportedFormat(source_token.to_string()));
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::tests::MockCodec;
    use crate::imaging::format::JpegOptions;
    use crate::reference::parse_reference;

    fn plan_with(codec: &MockCodec, formats: &FormatDefaults, mode: OperatingMode, src: &str) -> Planned {
        let reference = parse_reference(src).unwrap();
        let ctx = PlanContext {
            codec,
            formats,
            mode,
        };
        plan_reference(&reference, &ctx)
    }

    fn plan(src: &str) -> Planned {
        plan_with(
            &MockCodec::new(),
            &FormatDefaults::default(),
            OperatingMode::Transform,
            src,
        )
    }

    fn output_name(planned: &Planned) -> String {
        match &planned.action {
            PlanAction::Generate(plan) => plan.output_name(),
            other => panic!("expected Generate, got {other:?}"),
        }
    }

    // =========================================================================
    // Resize
    // =========================================================================

    #[test]
    fn width_adds_resize_and_fragment() {
        let planned = plan("img/photo.jpg?width=100");
        assert!(planned.warnings.is_empty());
        let PlanAction::Generate(plan) = &planned.action else {
            panic!("expected Generate");
        };
        assert_eq!(plan.output_name(), "photo.w100.jpg");
        assert_eq!(plan.source, PathBuf::from("img/photo.jpg"));
        assert_eq!(
            plan.steps,
            vec![TransformStep::Resize {
                width: Some(100),
                height: None
            }]
        );
    }

    #[test]
    fn width_and_height_fragments_in_order() {
        assert_eq!(
            output_name(&plan("img/photo.jpg?height=50&width=100")),
            "photo.w100.h50.jpg"
        );
    }

    #[test]
    fn invalid_dimension_warns_and_keeps_valid_one() {
        let planned = plan("img/photo.jpg?width=wide&height=40");
        assert_eq!(output_name(&planned), "photo.h40.jpg");
        assert_eq!(
            planned.warnings,
            vec![PlanWarning::InvalidDimension {
                name: "width",
                value: "wide".into()
            }]
        );
    }

    #[test]
    fn only_invalid_dimensions_is_a_no_op() {
        let planned = plan("img/photo.jpg?width=0");
        assert_eq!(planned.action, PlanAction::Keep);
        assert_eq!(planned.warnings.len(), 1);
    }

    // =========================================================================
    // Format, quality, background
    // =========================================================================

    #[test]
    fn no_parameters_is_a_no_op() {
        let planned = plan("img/photo.jpg");
        assert_eq!(planned.action, PlanAction::Keep);
        assert!(planned.warnings.is_empty());
    }

    #[test]
    fn format_param_changes_extension() {
        let planned = plan("img/photo.jpg?format=webp");
        let PlanAction::Generate(plan) = &planned.action else {
            panic!("expected Generate");
        };
        assert_eq!(plan.output_name(), "photo.webp");
        assert!(matches!(
            plan.steps[0],
            TransformStep::Format {
                options: EncodeOptions::Webp(_),
                background: None
            }
        ));
    }

    #[test]
    fn jpg_alias_keeps_literal_token() {
        let planned = plan("img/photo.png?format=jpg");
        let PlanAction::Generate(plan) = &planned.action else {
            panic!("expected Generate");
        };
        assert_eq!(plan.extension, ".jpg");
        assert_eq!(
            plan.steps[0],
            TransformStep::Format {
                options: EncodeOptions::Jpeg(JpegOptions::default()),
                background: None
            }
        );
    }

    #[test]
    fn quality_without_format_uses_source_extension() {
        let codec = MockCodec::reporting_quality();
        let planned = plan_with(
            &codec,
            &FormatDefaults::default(),
            OperatingMode::Transform,
            "img/photo.JPG?quality=60",
        );
        assert_eq!(output_name(&planned), "photo.q60.JPG");
    }

    #[test]
    fn unreported_quality_adds_no_fragment() {
        assert_eq!(output_name(&plan("img/photo.jpg?quality=60&width=10")), "photo.w10.jpg");
    }

    #[test]
    fn invalid_quality_warns_and_uses_default() {
        let codec = MockCodec::reporting_quality();
        let planned = plan_with(
            &codec,
            &FormatDefaults::default(),
            OperatingMode::Transform,
            "img/photo.jpg?quality=best&format=jpeg",
        );
        assert_eq!(output_name(&planned), "photo.q81.jpeg");
        assert_eq!(planned.warnings, vec![PlanWarning::InvalidQuality("best".into())]);
    }

    #[test]
    fn quality_on_lossless_format_warns() {
        let planned = plan("img/clear.png?format=gif&quality=50");
        assert_eq!(output_name(&planned), "clear.gif");
        assert_eq!(
            planned.warnings,
            vec![PlanWarning::QualityIgnored(OutputFormat::Gif)]
        );
    }

    #[test]
    fn unsupported_format_falls_back_to_source() {
        let planned = plan("img/photo.jpg?format=bmp&width=10");
        assert_eq!(output_name(&planned), "photo.w10.jpg");
        assert_eq!(planned.warnings, vec![PlanWarning::UnsupportedFormat("bmp".into())]);
    }

    #[test]
    fn format_missing_from_codec_is_unsupported() {
        let codec = MockCodec {
            formats: vec![OutputFormat::Jpeg, OutputFormat::Png],
            ..MockCodec::default()
        };
        let planned = plan_with(
            &codec,
            &FormatDefaults::default(),
            OperatingMode::Transform,
            "img/photo.jpg?format=avif",
        );
        assert_eq!(planned.warnings, vec![PlanWarning::UnsupportedFormat("avif".into())]);
    }

    #[test]
    fn background_param_is_normalized_into_name() {
        let planned = plan("img/clear.png?background=%23abc");
        let PlanAction::Generate(plan) = &planned.action else {
            panic!("expected Generate");
        };
        assert_eq!(plan.output_name(), "clear.xaabbcc.png");
        assert!(matches!(
            &plan.steps[0],
            TransformStep::Format { background: Some(c), .. } if c.hex() == "aabbcc"
        ));
    }

    #[test]
    fn background_fragment_ignores_source_transparency() {
        let planned = plan("img/photo.jpg?background=fff");
        let PlanAction::Generate(plan) = &planned.action else {
            panic!("expected Generate");
        };
        assert_eq!(plan.output_name(), "photo.xffffff.jpg");
        assert!(matches!(
            &plan.steps[..],
            [TransformStep::Format { background: Some(_), .. }]
        ));
        assert!(planned.warnings.is_empty());
    }

    #[test]
    fn invalid_background_warns_and_is_not_applied() {
        let planned = plan("img/clear.png?background=zz0000&format=webp");
        assert_eq!(output_name(&planned), "clear.webp");
        assert_eq!(
            planned.warnings,
            vec![PlanWarning::InvalidBackground("zz0000".into())]
        );
    }

    #[test]
    fn configured_background_applies_to_format_step() {
        let formats = FormatDefaults {
            jpeg: JpegOptions {
                background: Some("000".into()),
                ..JpegOptions::default()
            },
            ..FormatDefaults::default()
        };
        let planned = plan_with(
            &MockCodec::new(),
            &formats,
            OperatingMode::Transform,
            "img/clear.png?format=jpeg",
        );
        assert_eq!(output_name(&planned), "clear.x000000.jpeg");
    }

    #[test]
    fn full_naming_order() {
        let codec = MockCodec::reporting_quality();
        let planned = plan_with(
            &codec,
            &FormatDefaults::default(),
            OperatingMode::Transform,
            "img/photo.png?format=jpg&quality=70&background=fff&height=20&width=30",
        );
        assert_eq!(output_name(&planned), "photo.w30.h20.xffffff.q70.jpg");
    }

    #[test]
    fn planning_is_idempotent() {
        let src = "/img/photo.jpg?width=320&format=webp&background=123";
        assert_eq!(plan(src), plan(src));
    }

    #[test]
    fn name_equal_to_reference_is_a_no_op() {
        // Reference relative to the root whose plan resolves to itself.
        let planned = plan("photo.jpg?format=jpg");
        assert_eq!(planned.action, PlanAction::Keep);
    }

    // =========================================================================
    // Operating modes
    // =========================================================================

    #[test]
    fn mode_is_ignored_outside_interactive_runs() {
        assert_eq!(OperatingMode::Skip.effective(false), OperatingMode::Transform);
        assert_eq!(OperatingMode::Skip.effective(true), OperatingMode::Skip);
        assert_eq!(
            OperatingMode::FormatOnly.effective(true),
            OperatingMode::FormatOnly
        );
    }

    #[test]
    fn skip_substitutes_decoded_path() {
        let planned = plan_with(
            &MockCodec::new(),
            &FormatDefaults::default(),
            OperatingMode::Skip,
            "/img/my%20photo.jpg?width=100",
        );
        assert_eq!(
            planned.action,
            PlanAction::Substitute("/img/my photo.jpg".into())
        );
    }

    #[test]
    fn format_only_drops_resize() {
        let planned = plan_with(
            &MockCodec::new(),
            &FormatDefaults::default(),
            OperatingMode::FormatOnly,
            "img/photo.jpg?width=100&format=webp",
        );
        let PlanAction::Generate(plan) = &planned.action else {
            panic!("expected Generate");
        };
        assert_eq!(plan.output_name(), "photo.webp");
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn format_only_rejects_unsupported_format() {
        for token in ["bmp", "exe"] {
            let planned = plan_with(
                &MockCodec::new(),
                &FormatDefaults::default(),
                OperatingMode::FormatOnly,
                &format!("img/photo.jpg?format={token}"),
            );
            assert_eq!(
                planned.action,
                PlanAction::Substitute("img/photo.jpg".into())
            );
            assert_eq!(
                planned.warnings,
                vec![PlanWarning::UnsupportedFormat(token.into())]
            );
        }
    }

    #[test]
    fn format_only_respects_codec_formats() {
        let codec = MockCodec {
            formats: vec![OutputFormat::Jpeg],
            ..MockCodec::new()
        };
        let planned = plan_with(
            &codec,
            &FormatDefaults::default(),
            OperatingMode::FormatOnly,
            "img/photo.jpg?format=webp",
        );
        assert_eq!(
            planned.warnings,
            vec![PlanWarning::UnsupportedFormat("webp".into())]
        );
    }

    #[test]
    fn format_only_without_rename_points_at_original() {
        let planned = plan_with(
            &MockCodec::new(),
            &FormatDefaults::default(),
            OperatingMode::FormatOnly,
            "img/photo.jpg?width=100",
        );
        assert_eq!(
            planned.action,
            PlanAction::Substitute("img/photo.jpg".into())
        );
    }

    #[test]
    fn mode_parses_from_config_spellings() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: OperatingMode,
        }
        let parse = |s: &str| toml::from_str::<Wrapper>(&format!("mode = \"{s}\"")).unwrap().mode;
        assert_eq!(parse("transform"), OperatingMode::Transform);
        assert_eq!(parse("skip"), OperatingMode::Skip);
        assert_eq!(parse("format-only"), OperatingMode::FormatOnly);
        assert_eq!(parse("formatOnly"), OperatingMode::FormatOnly);
    }
}
