//! Result types shared by the scanner, the renderer and their consumers.
//!
//! - [`Match`]: a file that passed classification and contains the query. The scanner hands
//!   these back by value, in traversal order.
//! - [`Markup`]: one located occurrence inside one line.
//! - [`MarkedFile`]: a file's lines together with all of its markups. Only exists when the
//!   query occurs at least once.
//! - [`SearchOutput`]: the batch produced by one search, plus the root it ran under.
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::metrics::ScanStats;

/// A file that contains the query. Equality is path equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Match {
    pub path: PathBuf,
}

impl Match {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A single occurrence: 0-based line, byte column and byte length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Markup {
    pub line_number: usize,
    pub range_start: usize,
    pub range_length: usize,
}

impl Markup {
    pub fn new(line_number: usize, range_start: usize, range_length: usize) -> Self {
        Self {
            line_number,
            range_start,
            range_length,
        }
    }

    /// Exclusive end column
    pub fn range_end(&self) -> usize {
        self.range_start + self.range_length
    }
}

/// A file's lines and the markups found in them
#[derive(Debug, Clone, Serialize)]
pub struct MarkedFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub markups: Vec<Markup>,
}

impl MarkedFile {
    /// Builds a marked file, or `None` when there is nothing to mark
    pub fn new(path: impl Into<PathBuf>, lines: Vec<String>, markups: Vec<Markup>) -> Option<Self> {
        if markups.is_empty() {
            return None;
        }
        Some(Self {
            path: path.into(),
            lines,
            markups,
        })
    }

    /// Markups grouped by line number, each group ordered by start column
    pub fn markups_by_line(&self) -> BTreeMap<usize, Vec<Markup>> {
        let mut grouped: BTreeMap<usize, Vec<Markup>> = BTreeMap::new();
        for markup in &self.markups {
            grouped.entry(markup.line_number).or_default().push(*markup);
        }
        for group in grouped.values_mut() {
            group.sort_unstable();
        }
        grouped
    }
}

impl PartialEq for MarkedFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for MarkedFile {}

/// The complete product of one search
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    /// Root the search ran under
    pub root: PathBuf,
    /// Matching files in traversal order
    pub matches: Vec<Match>,
    /// Counters collected while scanning
    pub stats: ScanStats,
}

impl SearchOutput {
    /// Creates a new empty search output for `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            matches: Vec::new(),
            stats: ScanStats::default(),
        }
    }

    /// Appends a match; the caller supplies them in traversal order
    pub fn add_match(&mut self, found: Match) {
        self.matches.push(found);
    }

    /// Matching paths in traversal order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.matches.iter().map(|m| m.path.clone()).collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.matches.iter().any(|m| m.path == path)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
