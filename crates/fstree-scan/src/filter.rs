//! Glob based exclusion.

use std::io::BufRead;
use std::path::Path;

use fstree_core::TreeNode;
use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

use crate::callback::{Admission, KeepAll, ScanCallback};

/// Errors building an [`ExcludeFilter`].
#[derive(Debug, Error)]
pub enum FilterError {
    /// A pattern is not a valid glob.
    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Reading a pattern list failed.
    #[error("reading exclude list: {0}")]
    Io(#[from] std::io::Error),
}

/// Callback that discards nodes whose scan-relative path matches any glob.
///
/// Non-matching nodes are handed to an inner callback, [`KeepAll`] by
/// default. A discarded directory is never descended into.
#[derive(Debug, Clone)]
pub struct ExcludeFilter<C = KeepAll> {
    set: GlobSet,
    patterns: Vec<String>,
    inner: C,
}

impl ExcludeFilter {
    /// Build a filter from glob patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern).map_err(|source| FilterError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| FilterError::Pattern {
            pattern: patterns.join(","),
            source,
        })?;

        Ok(Self {
            set,
            patterns,
            inner: KeepAll,
        })
    }

    /// Build a filter from a pattern list, one glob per line.
    ///
    /// Surrounding whitespace is trimmed; blank lines and lines starting
    /// with `#` are ignored.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, FilterError> {
        let mut patterns = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            patterns.push(line.to_string());
        }
        Self::new(patterns)
    }
}

impl<C> ExcludeFilter<C> {
    /// Hand non-excluded nodes to `inner` instead.
    pub fn with_inner<D: ScanCallback>(self, inner: D) -> ExcludeFilter<D> {
        ExcludeFilter {
            set: self.set,
            patterns: self.patterns,
            inner,
        }
    }

    /// Check if a scan-relative path is excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }

    /// The patterns this filter was built from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl<C: ScanCallback> ScanCallback for ExcludeFilter<C> {
    fn admit(&mut self, path: &Path, node: &mut TreeNode) -> Admission {
        if self.is_excluded(path) {
            tracing::trace!(path = %path.display(), "excluded by pattern");
            return Admission::Discard;
        }
        self.inner.admit(path, node)
    }
}
