//! # htmlimg
//!
//! Rewrites image references in HTML into references to transformed,
//! optimized artifacts. The transformation is requested in the reference
//! itself, as query parameters:
//!
//! ```text
//! <img src="img/photo.jpg?width=800&format=webp">
//!   → <img src=".img/photo.w800.webp">     (and .img/photo.w800.webp is written)
//! ```
//!
//! # Architecture: One Pass per Document
//!
//! ```text
//! 1. Scan        html       →  matches        (regex, no HTML parsing)
//! 2. Parse       match      →  reference      (path + query parameters)
//! 3. Plan        reference  →  action         (steps + deterministic output name)
//! 4. Generate    plan       →  artifact       (at most once per output path)
//! 5. Substitute  artifacts  →  html           (left to right, by byte range)
//! ```
//!
//! Steps 1–3 are pure and run in match order. Step 4 fans out over rayon and
//! shares one [`cache::ArtifactCache`] across every document being rewritten.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Finds reference substrings with the configured pattern |
//! | [`reference`] | Splits one reference into source path and parameters |
//! | [`plan`] | Turns parameters into transform steps and an output name; operating modes |
//! | [`cache`] | Claim-or-join map from output path to generation outcome |
//! | [`execute`] | Runs a plan through the codec and writes the artifact atomically |
//! | [`pipeline`] | Orchestrates one document; statistics and events |
//! | [`session`] | Source root, temp directory lifecycle, dev flag |
//! | [`imaging`] | Output formats, encoder options, colors, the codec trait and its `image` crate implementation |
//! | [`config`] | `htmlimg.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Name Is the Cache Key
//!
//! Every output file name is a pure function of the source file name and the
//! requested transformation:
//!
//! ```text
//! <basename>[.w<width>][.h<height>][.x<background>][.q<quality>].<format>
//! ```
//!
//! So an artifact on disk from an earlier run is reused without any manifest,
//! and two references asking for the same thing share one file.
//!
//! ## Warnings, Not Errors
//!
//! A bad parameter, a missing source, or a failing encode affects one
//! reference. The planner returns warnings next to its result; the pipeline
//! reports them as [`pipeline::PipelineEvent`]s and leaves the reference as it
//! was. Only the temp directory failing to appear aborts a rewrite.
//!
//! ## Modes Are Decided Once
//!
//! `skip` and `format-only` exist for fast iterative work. The planner
//! consults the mode once and emits an already-simplified plan; the executor
//! never checks it. Outside dev runs the mode is ignored.
//!
//! ## Pure-Rust Imaging
//!
//! [`imaging::RustCodec`] is built on the `image` crate (Lanczos3 resampling,
//! rav1e for AVIF). No system libraries are needed.

pub mod cache;
pub mod config;
pub mod execute;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod reference;
pub mod scan;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;
