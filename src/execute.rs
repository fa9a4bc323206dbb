//! Transformation executor.
//!
//! Realizes a [`TransformPlan`] against its source file and writes the result
//! to the output path. Encoding goes to a temporary file in the output
//! directory that is renamed into place only on success, so a failed or
//! abandoned generation never leaves a partial file at the output path.

use crate::imaging::calculations::size_in_kb;
use crate::imaging::{CodecError, CodecImage, ImageCodec};
use crate::plan::{TransformPlan, TransformStep};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Source image not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// What one generation cost. Reported per artifact.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GenerationStats {
    /// Output file name.
    pub name: String,
    pub original_kb: u64,
    pub new_kb: u64,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

pub(crate) fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub struct Executor<'a, C: ImageCodec> {
    codec: &'a C,
    source_root: &'a Path,
}

impl<'a, C: ImageCodec> Executor<'a, C> {
    pub fn new(codec: &'a C, source_root: &'a Path) -> Self {
        Self { codec, source_root }
    }

    /// Generate `plan` into `output`.
    pub fn generate(&self, plan: &TransformPlan, output: &Path) -> Result<GenerationStats, ExecuteError> {
        let source = self.source_root.join(&plan.source);
        if !source.is_file() {
            return Err(ExecuteError::SourceNotFound(plan.source.clone()));
        }
        let original_kb = size_in_kb(fs::metadata(&source)?.len());
        let dir = output.parent().unwrap_or(Path::new("."));

        let start = Instant::now();
        let staging = NamedTempFile::new_in(dir)?;
        if plan.steps.is_empty() {
            fs::copy(&source, staging.path())?;
        } else {
            let mut image = self.codec.open(&source)?;
            apply_steps(&mut image, &plan.steps)?;
            image.write_to(staging.path())?;
        }
        staging.persist(output).map_err(|e| e.error)?;
        let duration = start.elapsed();

        let new_kb = size_in_kb(fs::metadata(output)?.len());
        tracing::debug!(
            source = %plan.source.display(),
            output = %output.display(),
            ms = duration.as_millis() as u64,
            "generated artifact"
        );
        Ok(GenerationStats {
            name: plan.output_name(),
            original_kb,
            new_kb,
            duration,
        })
    }
}

/// Resize steps precede format steps in every plan; apply them as listed.
fn apply_steps<I: CodecImage>(image: &mut I, steps: &[TransformStep]) -> Result<(), CodecError> {
    for step in steps {
        match step {
            TransformStep::Resize { width, height } => image.resize(*width, *height)?,
            TransformStep::Format {
                options,
                background,
            } => {
                if let Some(color) = background {
                    image.set_background(*color)?;
                }
                image.encode(options)?;
            }
        }
    }
    Ok(())
}
