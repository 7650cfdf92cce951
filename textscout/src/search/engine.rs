use ignore::WalkBuilder;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use super::matcher::PatternMatcher;
use super::processor::{Candidate, FileProcessor};
use crate::config::{ScanOptions, SearchConfig};
use crate::errors::{panic_message, SearchError, SearchResult};
use crate::filters::{accept, has_valid_extension, should_ignore};
use crate::metrics::ScanMetrics;
use crate::pool::worker_pool;
use crate::query::Query;
use crate::results::{Match, SearchOutput};
use crate::task::{CancelToken, Progress};

/// What a worker reports back for one candidate
#[derive(Debug)]
enum Outcome {
    Matched(PathBuf),
    NoMatch,
    /// Could not be read or decoded; already logged
    Skipped,
    /// Cancellation was observed before the file was touched
    Aborted,
    /// The worker panicked
    Fault(String),
}

/// Runs a [`Query`] over its directory tree.
///
/// The walk itself is sequential and sorted by file name, which fixes the traversal order.
/// Each accepted candidate is handed to the shared worker pool; completions come back over a
/// channel in whatever order the workers finish and are put back into submission order before
/// progress is reported and results are assembled.
///
/// [`Scanner::run`] blocks until every submitted worker has reported, so it belongs on a
/// coordinator thread (a task), never on a worker-pool thread.
#[derive(Debug, Clone)]
pub struct Scanner {
    query: Query,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(query: Query) -> Self {
        Self::with_options(query, ScanOptions::default())
    }

    pub fn with_options(query: Query, options: ScanOptions) -> Self {
        Self { query, options }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Searches the tree, reporting progress and honouring `cancel`.
    ///
    /// `progress` sees `Indeterminate` once while walking, then `Determinate { done, total }`
    /// exactly once per submitted candidate, in submission order.
    pub fn run<F>(&self, mut progress: F, cancel: &CancelToken) -> SearchResult<SearchOutput>
    where
        F: FnMut(Progress),
    {
        let root = self.query.root();
        info!("Starting search for {}", self.query);

        // The only I/O failure that fails the scan: the root cannot be listed at all.
        fs::read_dir(root)?;
        progress(Progress::Indeterminate);

        let pool = worker_pool()?;
        let metrics = ScanMetrics::new();
        let processor = Arc::new(FileProcessor::with_metrics(
            PatternMatcher::new(self.query.text()),
            self.options.encoding_mode,
            metrics.clone(),
        ));

        let (tx, rx) = mpsc::channel::<(usize, Outcome)>();
        let mut submitted = 0usize;

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(self.options.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            if cancel.is_cancelled() {
                debug!("Cancel observed after {} submissions", submitted);
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping entry: {}", err);
                    metrics.record_walk_error();
                    continue;
                }
            };
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                continue;
            }

            let path = entry.path();
            if should_ignore(path, root, &self.options.ignore_patterns) {
                trace!("Ignoring {}", path.display());
                continue;
            }
            if !accept(path, self.query.extension()) {
                if has_valid_extension(path, self.query.extension()) {
                    warn!("Skipping {}: not a readable regular file", path.display());
                    metrics.record_skipped();
                }
                continue;
            }

            let size = entry.metadata().ok().map(|m| m.len());
            let candidate = Candidate::new(entry.into_path(), size);
            let index = submitted;
            submitted += 1;
            metrics.record_submitted();

            let tx = tx.clone();
            let processor = Arc::clone(&processor);
            let cancel = cancel.clone();
            pool.spawn(move || {
                let outcome = process_candidate(candidate, processor.metrics(), &cancel, |c| {
                    processor.contains_query(c)
                });
                // The receiver outlives every sender, see the drain below.
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);
        debug!("Walk finished, {} candidates submitted", submitted);

        // Drain: the iterator ends once every worker has dropped its sender.
        let mut slots: Vec<Option<Outcome>> = Vec::with_capacity(submitted);
        slots.resize_with(submitted, || None);
        let mut done = 0;
        for (index, outcome) in rx.iter() {
            slots[index] = Some(outcome);
            while done < submitted && slots[done].is_some() {
                done += 1;
                progress(Progress::determinate(done, submitted));
            }
        }

        metrics.log_stats();

        if cancel.is_cancelled() {
            info!("Search cancelled, discarding partial results");
            return Err(SearchError::Cancelled);
        }

        let mut output = assemble(root, slots)?;
        output.stats = metrics.get_stats();

        info!(
            "Search complete. Found {} matching files out of {} candidates",
            output.len(),
            submitted
        );
        Ok(output)
    }
}

/// Worker body: check cancellation, then run `check` on one candidate.
/// A panic inside `check` becomes [`Outcome::Fault`].
fn process_candidate<F>(
    candidate: Candidate,
    metrics: &ScanMetrics,
    cancel: &CancelToken,
    check: F,
) -> Outcome
where
    F: FnOnce(&Candidate) -> SearchResult<bool>,
{
    if cancel.is_cancelled() {
        metrics.record_aborted();
        return Outcome::Aborted;
    }

    match panic::catch_unwind(AssertUnwindSafe(|| check(&candidate))) {
        Ok(Ok(true)) => {
            metrics.record_matched();
            Outcome::Matched(candidate.path)
        }
        Ok(Ok(false)) => Outcome::NoMatch,
        Ok(Err(e)) => {
            warn!("Skipping {}: {}", candidate.path.display(), e);
            metrics.record_skipped();
            Outcome::Skipped
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Worker panicked on {}: {}", candidate.path.display(), message);
            Outcome::Fault(format!("{}: {}", candidate.path.display(), message))
        }
    }
}

/// Collects matches in submission order. Any fault or missing completion fails the whole
/// batch, so no partial result escapes.
fn assemble(root: &Path, slots: Vec<Option<Outcome>>) -> SearchResult<SearchOutput> {
    let mut output = SearchOutput::new(root);
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Outcome::Matched(path)) => output.add_match(Match::new(path)),
            Some(Outcome::NoMatch) | Some(Outcome::Skipped) | Some(Outcome::Aborted) => {}
            Some(Outcome::Fault(message)) => return Err(SearchError::worker_fault(message)),
            None => {
                return Err(SearchError::worker_fault(format!(
                    "no completion for candidate #{}",
                    index
                )))
            }
        }
    }
    Ok(output)
}

/// Runs a search described by a [`SearchConfig`] to completion on the calling thread
pub fn search(config: &SearchConfig) -> SearchResult<SearchOutput> {
    let query = config.to_query()?;
    Scanner::with_options(query, config.scan_options()).run(|_| {}, &CancelToken::new())
}
