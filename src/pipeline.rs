//! Pipeline orchestration.
//!
//! Drives one HTML document through scan → parse → plan → cache → substitute:
//!
//! ```text
//! html ──scan──▶ matches ──parse/plan──▶ actions ──par_iter──▶ artifacts
//!                                                                  │
//! rewritten html ◀──────────── substitute, left to right ◀────────┘
//! ```
//!
//! Planning is cheap and runs in match order. Generation fans out over the
//! rayon pool; results are collected back in match order, so the rewritten
//! text never depends on which artifact finished first. Events (warnings,
//! failures, per-artifact stats) go to an optional channel, also in match
//! order.
//!
//! A [`Pipeline`] is `Sync` and is meant to be shared: several documents can
//! be rewritten at once and will still generate each artifact only once.

use crate::cache::{ArtifactCache, ArtifactStatus, CacheStats, OutputKey};
use crate::config::Config;
use crate::execute::{ExecuteError, Executor, GenerationStats, serialize_millis};
use crate::imaging::{FormatDefaults, ImageCodec, RustCodec};
use crate::plan::{OperatingMode, PlanAction, PlanContext, PlanWarning, Planned, plan_reference};
use crate::reference::{ReferenceError, parse_reference};
use crate::scan::ReferenceScanner;
use crate::session::Session;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid reference pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Counts for one rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Artifacts generated by this rewrite (cache misses).
    pub generated: usize,
    /// References matched in the document.
    pub processed: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub cache: CacheStats,
}

/// Reported while rewriting, in match order.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Warning {
        reference: String,
        warning: PlanWarning,
    },
    Malformed(ReferenceError),
    Generated(GenerationStats),
    Failed {
        reference: String,
        error: Arc<ExecuteError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    /// Nothing matched; the caller should use its input as is.
    Unchanged,
    Rewritten { html: String, stats: PipelineStats },
}

/// The planned outcome for one match, as shown by a dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub matched: String,
    pub planned: Result<Planned, ReferenceError>,
}

/// One match and what to do with it.
struct Resolution {
    /// Byte range to replace, quotes excluded.
    start: usize,
    end: usize,
    matched: String,
    action: PlanAction,
}

enum Realized {
    Keep,
    Replace(String, Option<ArtifactStatus>),
    Failed(Arc<ExecuteError>),
}

pub struct Pipeline<C: ImageCodec = RustCodec> {
    session: Session,
    scanner: ReferenceScanner,
    formats: FormatDefaults,
    mode: OperatingMode,
    codec: C,
    cache: ArtifactCache,
}

impl Pipeline<RustCodec> {
    pub fn new(session: Session, config: &Config) -> Result<Self, PipelineError> {
        Self::with_codec(session, config, RustCodec::new())
    }
}

impl<C: ImageCodec> Pipeline<C> {
    pub fn with_codec(session: Session, config: &Config, codec: C) -> Result<Self, PipelineError> {
        let scanner = ReferenceScanner::new(&config.pattern)?;
        let mode = config.mode.effective(session.is_interactive());
        Ok(Self {
            session,
            scanner,
            formats: config.formats.clone(),
            mode,
            codec,
            cache: ArtifactCache::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Mode in force after the interactive check.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Rewrite every image reference in `html`.
    ///
    /// Per-reference problems are reported through `events` and leave that
    /// reference untouched. Only a temp directory that cannot be created
    /// fails the whole call.
    pub fn rewrite(
        &self,
        html: &str,
        events: Option<&Sender<PipelineEvent>>,
    ) -> Result<Rewrite, PipelineError> {
        let started = Instant::now();
        let emit = |event: PipelineEvent| {
            if let Some(tx) = events {
                tx.send(event).ok();
            }
        };

        let matches: Vec<_> = self.scanner.scan(html).collect();
        if matches.is_empty() {
            return Ok(Rewrite::Unchanged);
        }
        self.session.ensure_temp_dir()?;

        let mut resolutions = Vec::with_capacity(matches.len());
        for raw in &matches {
            let (start, end) = unquoted_range(raw.text, raw.start);
            match self.resolve(raw.text) {
                Ok(planned) => {
                    for warning in planned.warnings {
                        emit(PipelineEvent::Warning {
                            reference: raw.text.to_string(),
                            warning,
                        });
                    }
                    resolutions.push(Resolution {
                        start,
                        end,
                        matched: raw.text.to_string(),
                        action: planned.action,
                    });
                }
                Err(e) => {
                    tracing::warn!(reference = raw.text, "{e}");
                    emit(PipelineEvent::Malformed(e));
                }
            }
        }

        let realized: Vec<Realized> = resolutions
            .par_iter()
            .map(|resolution| self.realize(&resolution.action))
            .collect();

        let mut stats = PipelineStats {
            processed: matches.len(),
            ..PipelineStats::default()
        };
        let mut out = String::with_capacity(html.len());
        let mut cursor = 0;
        for (resolution, outcome) in resolutions.iter().zip(realized) {
            let replacement = match outcome {
                Realized::Keep => continue,
                Realized::Replace(replacement, status) => {
                    match status {
                        Some(ArtifactStatus::Generated(generation)) => {
                            stats.generated += 1;
                            stats.cache.generated += 1;
                            emit(PipelineEvent::Generated(generation));
                        }
                        Some(other) => stats.cache.record(&other),
                        None => {}
                    }
                    replacement
                }
                Realized::Failed(error) => {
                    tracing::warn!(reference = %resolution.matched, "generation failed: {error}");
                    stats.cache.fail();
                    emit(PipelineEvent::Failed {
                        reference: resolution.matched.clone(),
                        error,
                    });
                    continue;
                }
            };
            out.push_str(&html[cursor..resolution.start]);
            out.push_str(&replacement);
            cursor = resolution.end;
        }
        out.push_str(&html[cursor..]);

        stats.elapsed = started.elapsed();
        tracing::debug!(
            processed = stats.processed,
            generated = stats.generated,
            ms = stats.elapsed.as_millis() as u64,
            "rewrite finished"
        );
        Ok(Rewrite::Rewritten { html: out, stats })
    }

    /// Plan every reference in `html` without generating anything.
    pub fn preview(&self, html: &str) -> Vec<Preview> {
        self.scanner
            .scan(html)
            .map(|raw| Preview {
                matched: raw.text.to_string(),
                planned: self.resolve(raw.text),
            })
            .collect()
    }

    /// Output path for `output_name`, as written into the document.
    pub fn public_path(&self, output_name: &str) -> String {
        format!("{}/{}", self.session.temp_dir(), output_name).replace('\\', "/")
    }

    fn resolve(&self, matched: &str) -> Result<Planned, ReferenceError> {
        let reference = parse_reference(matched)?;
        let ctx = PlanContext {
            codec: &self.codec,
            formats: &self.formats,
            mode: self.mode,
        };
        Ok(plan_reference(&reference, &ctx))
    }

    fn realize(&self, action: &PlanAction) -> Realized {
        match action {
            PlanAction::Keep => Realized::Keep,
            PlanAction::Substitute(path) => Realized::Replace(path.clone(), None),
            PlanAction::Generate(plan) => {
                let output_name = plan.output_name();
                let key = OutputKey::new(self.session.temp_path(), &output_name);
                let executor = Executor::new(&self.codec, self.session.source_root());
                match self
                    .cache
                    .obtain(&key, |path| executor.generate(plan, path))
                {
                    Ok(handle) => Realized::Replace(self.public_path(&output_name), Some(handle.status)),
                    Err(error) => Realized::Failed(error),
                }
            }
        }
    }
}

/// Byte range of `text` (found at `offset`) without surrounding quotes, so
/// attribute delimiters caught by the pattern survive substitution.
fn unquoted_range(text: &str, offset: usize) -> (usize, usize) {
    let is_quote = |c: char| c == '"' || c == '\'';
    let leading = text.len() - text.trim_start_matches(is_quote).len();
    let trailing = text.len() - text.trim_end_matches(is_quote).len();
    let end = (offset + text.len()).saturating_sub(trailing).max(offset + leading);
    (offset + leading, end)
}
