use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use super::matcher::PatternMatcher;
use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::ScanMetrics;
use crate::results::MarkedFile;

// Constants for file processing
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// A file selected by the walk, on its way to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// Size reported by the walk, when it was cheap to get
    pub size: Option<u64>,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Splits text into lines, accepting LF, CRLF and CR terminators.
///
/// Terminators are not kept. A trailing terminator does not produce an extra empty line,
/// so `"a\n"` and `"a"` both give `["a"]`, and `""` gives no lines at all.
pub fn split_lines(content: &str) -> Vec<String> {
    let bytes = content.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(content[start..i].to_string());
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(content[start..i].to_string());
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push(content[start..].to_string());
    }
    lines
}

/// Decodes bytes according to the encoding mode
fn decode_bytes<'a>(
    bytes: &'a [u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> SearchResult<Cow<'a, str>> {
    match encoding_mode {
        EncodingMode::Skip => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| SearchError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            // If it's Owned, at least one invalid sequence was replaced.
            if let Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow)
        }
    }
}

fn open(path: &Path) -> SearchResult<File> {
    File::open(path).map_err(|e| SearchError::read_error(path, e))
}

/// Reads candidate files into line sequences and runs the matcher over them
#[derive(Debug)]
pub struct FileProcessor {
    matcher: PatternMatcher,
    metrics: ScanMetrics,
    encoding_mode: EncodingMode,
}

impl FileProcessor {
    /// Creates a new FileProcessor with the given pattern matcher
    pub fn new(matcher: PatternMatcher, encoding_mode: EncodingMode) -> Self {
        Self::with_metrics(matcher, encoding_mode, ScanMetrics::new())
    }

    /// Creates a FileProcessor that reports into existing metrics
    pub fn with_metrics(
        matcher: PatternMatcher,
        encoding_mode: EncodingMode,
        metrics: ScanMetrics,
    ) -> Self {
        Self {
            matcher,
            metrics,
            encoding_mode,
        }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Gets the metrics this processor records into
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Reads a small file in one call
    fn read_small_file(&self, path: &Path) -> SearchResult<Vec<String>> {
        trace!("Using simple file processing for: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| SearchError::read_error(path, e))?;
        let contents = decode_bytes(&bytes, path, self.encoding_mode)?;
        Ok(split_lines(&contents))
    }

    /// Reads a file through a large buffer
    fn read_file_buffered(&self, path: &Path) -> SearchResult<Vec<String>> {
        trace!("Using buffered file processing for: {}", path.display());
        let file = open(path)?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| SearchError::read_error(path, e))?;
        let contents = decode_bytes(&bytes, path, self.encoding_mode)?;
        Ok(split_lines(&contents))
    }

    /// Reads a file through a memory map. The map is released before returning.
    fn read_mmap_file(&self, path: &Path) -> SearchResult<Vec<String>> {
        trace!("Using memory-mapped file processing for: {}", path.display());
        let file = open(path)?;
        // SAFETY: the map is read-only and dropped before this function returns. A
        // concurrent truncation by another process is the usual mmap caveat.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::read_error(path, e))?;
        let contents = decode_bytes(&mmap, path, self.encoding_mode)?;
        Ok(split_lines(&contents))
    }

    /// Reads a file as a line sequence, choosing a strategy by size.
    ///
    /// `size_hint` comes from the walk when available; otherwise the file is stat-ed.
    pub fn read_lines(&self, path: &Path, size_hint: Option<u64>) -> SearchResult<Vec<String>> {
        let size = match size_hint {
            Some(size) => Some(size),
            None => match path.metadata() {
                Ok(metadata) => Some(metadata.len()),
                Err(e) => {
                    warn!("Failed to get metadata for {}: {}", path.display(), e);
                    None
                }
            },
        };

        match size {
            Some(size) => {
                self.metrics.record_file_processing(size);
                if size < SMALL_FILE_THRESHOLD {
                    self.read_small_file(path)
                } else if size >= LARGE_FILE_THRESHOLD {
                    self.read_mmap_file(path)
                } else {
                    self.read_file_buffered(path)
                }
            }
            None => self.read_file_buffered(path),
        }
    }

    /// Tests whether the candidate contains the query anywhere
    pub fn contains_query(&self, candidate: &Candidate) -> SearchResult<bool> {
        trace!("Processing file: {}", candidate.path.display());
        let lines = self.read_lines(&candidate.path, candidate.size)?;
        Ok(self.matcher.is_match(&lines))
    }

    /// Reads the file and marks every occurrence. `None` when there are none.
    pub fn process_file(&self, path: &Path) -> SearchResult<Option<MarkedFile>> {
        let lines = self.read_lines(path, None)?;
        let markups = self.matcher.markup(&lines);
        Ok(MarkedFile::new(path, lines, markups))
    }
}
