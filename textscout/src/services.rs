//! Task constructors for the three long-running operations.
//!
//! Each constructor validates its input synchronously and returns a [`TaskBuilder`], so a bad
//! request fails before any thread is started. The caller attaches callbacks and builds the
//! task against its own consumer queue:
//!
//! ```rust,ignore
//! let queue = ConsumerQueue::new();
//! let task = search_task(&config)?
//!     .on_progress(|p| bar.set(p))
//!     .on_succeeded(|output| show(output))
//!     .build(queue.poster());
//! task.start();
//! ```
use std::io;
use std::path::PathBuf;
use tracing::debug;

use crate::config::{EncodingMode, SearchConfig};
use crate::errors::{SearchError, SearchResult};
use crate::filters::is_readable_file;
use crate::render::{render_with, Segment};
use crate::results::SearchOutput;
use crate::search::Scanner;
use crate::task::{Progress, TaskBuilder};
use crate::tree::{TreeBuilder, TreeNode};

pub const LOOKING_FOR_FILES: &str = "Looking for files...";
pub const READING_FILES: &str = "Reading files...";
pub const DONE: &str = "Done";

/// A task that scans `config.root_path` for files containing `config.query`.
///
/// Fails immediately with `InvalidRoot`, `InvalidExtension` or `EmptyQuery`.
pub fn search_task(config: &SearchConfig) -> SearchResult<TaskBuilder<SearchOutput>> {
    let query = config.to_query()?;
    let scanner = Scanner::with_options(query, config.scan_options());

    Ok(TaskBuilder::new("search", move |ctx| {
        ctx.update_message(LOOKING_FOR_FILES);
        let mut reading = false;
        let output = scanner.run(
            |progress| {
                if !reading && matches!(progress, Progress::Determinate { .. }) {
                    reading = true;
                    ctx.update_message(READING_FILES);
                }
                ctx.update_progress(progress);
            },
            ctx.cancel_token(),
        )?;
        ctx.update_message(DONE);
        Ok(output)
    }))
}

/// A task that shapes `paths` into a tree under `root`.
///
/// Fails immediately with `PathOutsideRoot` if any path is not below `root`.
pub fn tree_task(root: PathBuf, paths: Vec<PathBuf>) -> SearchResult<TaskBuilder<TreeNode>> {
    if let Some(outside) = paths.iter().find(|p| !p.starts_with(&root)) {
        return Err(SearchError::path_outside_root(outside, &root));
    }

    Ok(TaskBuilder::new("shape", move |ctx| {
        let total = paths.len();
        debug!("Shaping {} paths under {}", total, root.display());
        let mut builder = TreeBuilder::new(root);
        for (i, path) in paths.iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            builder.insert(path)?;
            ctx.update_progress(Progress::determinate(i + 1, total));
        }
        Ok(builder.finish())
    }))
}

/// A [`tree_task`] over the matches of a finished search
pub fn tree_task_for(output: &SearchOutput) -> SearchResult<TaskBuilder<TreeNode>> {
    tree_task(output.root.clone(), output.paths())
}

/// A task that re-reads `path` and renders the occurrences of `query`.
///
/// The value is `None` when the file no longer contains the query. Fails immediately with
/// `EmptyQuery`, or with an I/O error if `path` is not a readable regular file.
pub fn render_task(
    path: PathBuf,
    query: String,
    encoding_mode: EncodingMode,
) -> SearchResult<TaskBuilder<Option<Vec<Segment>>>> {
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if !is_readable_file(&path) {
        return Err(SearchError::read_error(
            &path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a readable regular file"),
        ));
    }

    Ok(TaskBuilder::new("render", move |ctx| {
        if ctx.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        ctx.update_progress(Progress::Indeterminate);
        render_with(&path, &query, encoding_mode)
    }))
}
