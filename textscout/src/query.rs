use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{unify_path, SearchError, SearchResult};
use crate::filters::is_searchable_dir;

/// A validated search request: where to look, which files, and what text.
///
/// Construction is the only place validation happens, so holding a `Query` means the root
/// was an executable directory at construction time, the extension is non-empty and
/// dot-free, and the text is non-empty. The root is stored in canonical absolute form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    root: PathBuf,
    extension: String,
    text: String,
}

impl Query {
    pub fn new(
        root: impl AsRef<Path>,
        extension: impl Into<String>,
        text: impl Into<String>,
    ) -> SearchResult<Self> {
        let root = root.as_ref();
        let extension = extension.into();
        let text = text.into();
        debug!(
            "Query(root = {}, extension = {}, text = {})",
            root.display(),
            extension,
            text
        );

        if !is_searchable_dir(root) {
            return Err(SearchError::invalid_root(root));
        }
        if extension.is_empty() || extension.contains('.') {
            return Err(SearchError::invalid_extension(extension));
        }
        if text.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        Ok(Self {
            root: unify_path(root),
            extension,
            text,
        })
    }

    /// Absolute, canonical search root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extension without the leading dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The literal text to look for
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' in *.{} under {}",
            self.text,
            self.extension,
            self.root.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_valid_query() {
        let dir = tempdir().unwrap();
        let query = Query::new(dir.path(), "log", "error").unwrap();
        assert!(query.root().is_absolute());
        assert_eq!(query.root(), unify_path(dir.path()));
        assert_eq!(query.extension(), "log");
        assert_eq!(query.text(), "error");
    }

    #[test]
    fn test_invalid_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.log");
        std::fs::write(&file, "x").unwrap();

        let err = Query::new(&file, "log", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRoot);

        let err = Query::new(dir.path().join("missing"), "log", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRoot);
    }

    #[test]
    fn test_invalid_extension() {
        let dir = tempdir().unwrap();
        for ext in ["", ".log", "tar.gz"] {
            let err = Query::new(dir.path(), ext, "x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidExtension, "extension {:?}", ext);
        }
    }

    #[test]
    fn test_empty_query() {
        let dir = tempdir().unwrap();
        let err = Query::new(dir.path(), "log", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyQuery);
    }

    #[test]
    fn test_root_checked_before_extension() {
        let dir = tempdir().unwrap();
        let err = Query::new(dir.path().join("missing"), "", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRoot);
    }
}
