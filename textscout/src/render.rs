use serde::Serialize;
use std::path::Path;
use tracing::{debug, trace};

use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::results::{MarkedFile, Markup};
use crate::search::{FileProcessor, PatternMatcher};

/// A run of text in a rendered file, either plain or one highlighted occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub highlighted: bool,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: false,
        }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: true,
        }
    }
}

/// Builds the segment stream for `lines` with their `markups`.
///
/// Every line ends with one `"\n"`, appended to its last plain segment or emitted as a
/// plain segment of its own after a highlight. Empty plain segments are never emitted.
///
/// Markups of a self-overlapping query overlap each other (`"aa"` at 0, 1 and 2 in
/// `"aaaa"`). Each highlight starts where the previous one ended, so the stream for that
/// line is `"aa"`, `"a"`, `"a"` (all highlighted) and then `"\n"`, and concatenating the
/// segments still gives back the line exactly once.
pub fn segments<S: AsRef<str>>(lines: &[S], markups: &[Markup]) -> Vec<Segment> {
    let mut sorted = markups.to_vec();
    sorted.sort_unstable();
    let mut pending = sorted.into_iter().peekable();

    let mut out = Vec::new();
    for (line_number, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        let mut cursor = 0;
        let mut last_highlighted = false;

        while let Some(markup) = pending.next_if(|m| m.line_number <= line_number) {
            if markup.line_number < line_number {
                continue;
            }
            let start = markup.range_start.max(cursor).min(line.len());
            let end = markup.range_end().min(line.len());
            if !line.is_char_boundary(start) || !line.is_char_boundary(end) {
                continue;
            }
            if start > cursor {
                out.push(Segment::plain(&line[cursor..start]));
                cursor = start;
                last_highlighted = false;
            }
            if end > start {
                out.push(Segment::highlighted(&line[start..end]));
                cursor = end;
                last_highlighted = true;
            }
        }

        if cursor < line.len() {
            out.push(Segment::plain(format!("{}\n", &line[cursor..])));
        } else if last_highlighted || line.is_empty() {
            out.push(Segment::plain("\n"));
        } else if let Some(last) = out.last_mut() {
            last.text.push('\n');
        }
    }
    out
}

impl MarkedFile {
    /// The rendered segment stream of this file
    pub fn segments(&self) -> Vec<Segment> {
        segments(&self.lines, &self.markups)
    }
}

/// Concatenates the text of a segment stream
pub fn to_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// Re-reads `path` and renders every occurrence of `query`; `None` when there are none.
///
/// Files that are not valid UTF-8 fail with an encoding error.
pub fn render(path: &Path, query: &str) -> SearchResult<Option<Vec<Segment>>> {
    render_with(path, query, EncodingMode::Skip)
}

/// Like [`render`], with an explicit decoding policy
pub fn render_with(
    path: &Path,
    query: &str,
    encoding_mode: EncodingMode,
) -> SearchResult<Option<Vec<Segment>>> {
    Ok(mark_file(path, query, encoding_mode)?.map(|marked| marked.segments()))
}

/// Re-reads `path` and locates every occurrence of `query`
pub fn mark_file(
    path: &Path,
    query: &str,
    encoding_mode: EncodingMode,
) -> SearchResult<Option<MarkedFile>> {
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    trace!("Rendering {} for '{}'", path.display(), query);

    let processor = FileProcessor::new(PatternMatcher::new(query), encoding_mode);
    let marked = processor.process_file(path)?;
    match &marked {
        Some(file) => debug!(
            "{} occurrences of '{}' in {}",
            file.markups.len(),
            query,
            path.display()
        ),
        None => debug!("No occurrences of '{}' in {}", query, path.display()),
    }
    Ok(marked)
}
