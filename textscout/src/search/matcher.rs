use crate::results::Markup;

/// Locates every occurrence of a literal query inside a sequence of lines.
///
/// Occurrences may overlap: after a hit at byte `p` the search resumes one character past
/// `p`, not at `p + query.len()`. For `"aa"` in `"aaaa"` that yields starts 0, 1 and 2.
/// Columns are byte offsets into the line, so every span slices the line on char
/// boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatcher {
    query: String,
}

impl PatternMatcher {
    /// Creates a matcher for a non-empty literal.
    ///
    /// An empty query would match at every position; callers validate it away through
    /// [`crate::Query`], and [`Self::find_matches`] returns nothing for it.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Finds all (possibly overlapping) match start offsets in a single line
    pub fn find_matches(&self, line: &str) -> Vec<usize> {
        let mut starts = Vec::new();
        if self.query.is_empty() {
            return starts;
        }

        let mut from = 0;
        while let Some(offset) = line[from..].find(self.query.as_str()) {
            let start = from + offset;
            starts.push(start);
            // Resume one character past the hit so overlapping occurrences are kept
            let step = line[start..].chars().next().map_or(1, char::len_utf8);
            from = start + step;
        }
        starts
    }

    /// Returns true as soon as any line contains the query
    pub fn is_match<S: AsRef<str>>(&self, lines: &[S]) -> bool {
        !self.query.is_empty() && lines.iter().any(|line| line.as_ref().contains(&self.query))
    }

    /// Produces markups for every occurrence, ordered by (line, start)
    pub fn markup<S: AsRef<str>>(&self, lines: &[S]) -> Vec<Markup> {
        let length = self.query.len();
        lines
            .iter()
            .enumerate()
            .flat_map(|(line_number, line)| {
                self.find_matches(line.as_ref())
                    .into_iter()
                    .map(move |range_start| Markup::new(line_number, range_start, length))
            })
            .collect()
    }
}

/// Convenience wrapper: `markup(lines, query)`
pub fn markup<S: AsRef<str>>(lines: &[S], query: &str) -> Vec<Markup> {
    PatternMatcher::new(query).markup(lines)
}
