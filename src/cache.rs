//! In-flight artifact cache.
//!
//! Many references can resolve to the same output file, within one document
//! or across documents rewritten at the same time. The cache makes sure each
//! output path is generated at most once per process.
//!
//! # Design
//!
//! The cache is a map from [`OutputKey`] (the absolute output path) to a
//! single-assignment slot. [`ArtifactCache::obtain`] claims the slot under a
//! short lock and releases the lock before any pixel work. The first caller
//! through [`OnceLock::get_or_init`] runs the generator; every other caller
//! blocks on the same slot and shares its outcome.
//!
//! ```text
//! obtain(key) ──lock──▶ slot = map.entry(key).or_default() ──unlock──▶
//!     slot.get_or_init(|| if exists(key) { Existing } else { generate() })
//! ```
//!
//! A file already on disk at the key's path is never regenerated and yields
//! no statistics. Failures are cached too: a failed output is not retried
//! until the next run, when no file exists yet.
//!
//! Entries are never evicted. The map lives as long as the pipeline.

use crate::execute::{ExecuteError, GenerationStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Absolute output path; the cache key and the artifact's final location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey(PathBuf);

impl OutputKey {
    pub fn new(temp_path: &Path, output_name: &str) -> Self {
        Self(temp_path.join(output_name))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// How a caller's request for an artifact was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactStatus {
    /// This call ran the generator.
    Generated(GenerationStats),
    /// The file was already on disk; nothing ran.
    Existing,
    /// Another call owned the slot; this one shared its outcome.
    Joined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactHandle {
    pub key: OutputKey,
    pub status: ArtifactStatus,
}

type Outcome = Result<Option<GenerationStats>, Arc<ExecuteError>>;

#[derive(Default)]
pub struct ArtifactCache {
    slots: Mutex<HashMap<OutputKey, Arc<OnceLock<Outcome>>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the artifact at `key`, running `generate` only if no other call
    /// has claimed it and no file exists there.
    ///
    /// `generate` must not re-enter the cache for the same key.
    pub fn obtain<F>(&self, key: &OutputKey, generate: F) -> Result<ArtifactHandle, Arc<ExecuteError>>
    where
        F: FnOnce(&Path) -> Result<GenerationStats, ExecuteError>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut ran = false;
        let outcome = slot.get_or_init(|| {
            ran = true;
            if key.path().exists() {
                tracing::debug!(output = %key, "artifact already on disk");
                return Ok(None);
            }
            generate(key.path()).map(Some).map_err(Arc::new)
        });

        let status = match (ran, outcome) {
            (_, Err(e)) => return Err(Arc::clone(e)),
            (true, Ok(Some(stats))) => ArtifactStatus::Generated(stats.clone()),
            (true, Ok(None)) => ArtifactStatus::Existing,
            (false, Ok(_)) => {
                tracing::trace!(output = %key, "joined in-flight artifact");
                ArtifactStatus::Joined
            }
        };
        Ok(ArtifactHandle {
            key: key.clone(),
            status,
        })
    }

    /// Number of distinct keys claimed so far.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tally of artifact outcomes across one or more rewrites.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub generated: u32,
    pub existing: u32,
    pub joined: u32,
    pub failed: u32,
}

impl CacheStats {
    pub fn record(&mut self, status: &ArtifactStatus) {
        match status {
            ArtifactStatus::Generated(_) => self.generated += 1,
            ArtifactStatus::Existing => self.existing += 1,
            ArtifactStatus::Joined => self.joined += 1,
        }
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    pub fn merge(&mut self, other: &CacheStats) {
        self.generated += other.generated;
        self.existing += other.existing;
        self.joined += other.joined;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u32 {
        self.generated + self.existing + self.joined + self.failed
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reused = self.existing + self.joined;
        if reused > 0 {
            write!(f, "{} generated, {} reused", self.generated, reused)?;
        } else {
            write!(f, "{} generated", self.generated)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}
