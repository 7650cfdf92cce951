//! Finding files that contain a literal query.
//!
//! The work splits into three layers:
//!
//! 1. [`matcher`]: pure substring location inside a line sequence. After a hit at byte `p`
//!    the search resumes one character later, so self-overlapping queries report every
//!    occurrence (`"aa"` in `"aaaa"` starts at 0, 1 and 2).
//! 2. [`processor`]: turns one candidate file into lines. Small files are read in one call,
//!    medium files through a large buffer and large files through a memory map. Content that
//!    is not UTF-8 is skipped or lossily decoded depending on [`crate::config::EncodingMode`].
//! 3. [`engine`]: the [`Scanner`]. A sorted, sequential walk classifies entries and feeds the
//!    shared rayon pool; completions are reordered into walk order before anything is
//!    reported.
//!
//! ```rust,ignore
//! let query = Query::new("/var/log", "log", "error")?;
//! let output = Scanner::new(query).run(|p| println!("{}", p), &CancelToken::new())?;
//! for path in output.paths() {
//!     println!("{}", path.display());
//! }
//! ```
//!
//! Per-file problems (unreadable, undecodable, vanished between walk and read) are logged
//! and counted in [`crate::metrics::ScanStats`]; they never fail the scan.
pub mod engine;
pub mod matcher;
pub mod processor;

pub use engine::{search, Scanner};
pub use matcher::{markup, PatternMatcher};
pub use processor::{split_lines, Candidate, FileProcessor};
