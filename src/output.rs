//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Rewrite
//!
//! Per-artifact lines are shown in dev runs only; the batch line is shown for
//! every document that had matches.
//!
//! ```text
//! Generated photo.w800.webp                          (412 kB → 96 kB)   in 0.31s
//! warning: img/a.jpg?width=wide: parameter width with value `wide` is not a positive integer
//! index.html: generated 1 of 3 images in 0.35s (1 generated, 2 reused)
//! 2 documents rewritten (1 generated, 4 reused)
//! ```
//!
//! ## Check
//!
//! ```text
//! index.html
//!     img/photo.jpg?width=800 → generate .img/photo.w800.jpg
//!     img/logo.png → keep
//!     img/a.jpg?width=wide → keep
//!         warning: parameter width with value `wide` is not a positive integer
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `String` or `Vec<String>`)
//! for testability and a `print_*` wrapper that writes to stdout or stderr.
//! Format functions are pure and do no I/O.

use crate::cache::CacheStats;
use crate::execute::GenerationStats;
use crate::pipeline::{PipelineEvent, PipelineStats, Preview};
use crate::plan::PlanAction;

/// Longest artifact name shown before truncation.
const MAX_LABEL_CHARS: usize = 30;

/// Truncate to [`MAX_LABEL_CHARS`] characters, ending in `…` if cut.
pub fn truncate_label(name: &str) -> String {
    if name.chars().count() <= MAX_LABEL_CHARS {
        return name.to_string();
    }
    let mut label: String = name.chars().take(MAX_LABEL_CHARS - 1).collect();
    label.push('…');
    label
}

fn seconds(duration: std::time::Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

// ============================================================================
// Rewrite output
// ============================================================================

/// One generated artifact.
pub fn format_generated(stats: &GenerationStats) -> String {
    let head = format!(
        "Generated {:<40} ({} kB → {} kB)",
        truncate_label(&stats.name),
        stats.original_kb,
        stats.new_kb
    );
    format!("{head:<80} in {}", seconds(stats.duration))
}

/// Summary for one document.
pub fn format_batch(label: &str, stats: &PipelineStats) -> String {
    format!(
        "{label}: generated {} of {} images in {} ({})",
        stats.generated,
        stats.processed,
        seconds(stats.elapsed),
        stats.cache
    )
}

/// Run total across every rewritten document. `None` when no artifact was
/// touched.
pub fn format_run_summary(documents: usize, cache: &CacheStats) -> Option<String> {
    if cache.total() == 0 {
        return None;
    }
    let noun = if documents == 1 { "document" } else { "documents" };
    Some(format!("{documents} {noun} rewritten ({cache})"))
}

/// Display lines for one pipeline event. Per-artifact lines are dropped
/// unless `verbose`.
pub fn format_event(event: &PipelineEvent, verbose: bool) -> Vec<String> {
    match event {
        PipelineEvent::Warning { reference, warning } => {
            vec![format!("warning: {reference}: {warning}")]
        }
        PipelineEvent::Malformed(e) => vec![format!("warning: {e}")],
        PipelineEvent::Generated(stats) if verbose => vec![format_generated(stats)],
        PipelineEvent::Generated(_) => Vec::new(),
        PipelineEvent::Failed { reference, error } => {
            vec![format!("error: {reference}: {error}")]
        }
    }
}

pub fn print_event(event: &PipelineEvent, verbose: bool) {
    for line in format_event(event, verbose) {
        eprintln!("{}", line);
    }
}

pub fn print_batch(label: &str, stats: &PipelineStats) {
    println!("{}", format_batch(label, stats));
}

pub fn print_run_summary(documents: usize, cache: &CacheStats) {
    if let Some(line) = format_run_summary(documents, cache) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Dry-run listing for one document. `public_path` maps an output name to
/// the path it would be rewritten to.
pub fn format_preview(
    label: &str,
    previews: &[Preview],
    public_path: impl Fn(&str) -> String,
) -> Vec<String> {
    let mut lines = vec![label.to_string()];
    if previews.is_empty() {
        lines.push("    (no image references)".to_string());
    }
    for preview in previews {
        match &preview.planned {
            Ok(planned) => {
                let action = match &planned.action {
                    PlanAction::Keep => "keep".to_string(),
                    PlanAction::Substitute(path) => format!("substitute {path}"),
                    PlanAction::Generate(plan) => {
                        format!("generate {}", public_path(&plan.output_name()))
                    }
                };
                lines.push(format!("    {} → {}", preview.matched, action));
                for warning in &planned.warnings {
                    lines.push(format!("        warning: {warning}"));
                }
            }
            Err(e) => {
                lines.push(format!("    {} → skip", preview.matched));
                lines.push(format!("        warning: {e}"));
            }
        }
    }
    lines
}

pub fn print_preview(label: &str, previews: &[Preview], public_path: impl Fn(&str) -> String) {
    for line in format_preview(label, previews, public_path) {
        println!("{}", line);
    }
}
