pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod pool;
pub mod query;
pub mod render;
pub mod results;
pub mod search;
pub mod services;
pub mod task;
pub mod tree;

pub use config::{CliOverrides, EncodingMode, ScanOptions, SearchConfig};
pub use errors::{ErrorKind, SearchError, SearchResult};
pub use metrics::ScanStats;
pub use pool::{init_worker_pool, worker_pool};
pub use query::Query;
pub use render::{render, render_with, Segment};
pub use results::{MarkedFile, Markup, Match, SearchOutput};
pub use search::{markup, search, Scanner};
pub use services::{render_task, search_task, tree_task, tree_task_for};
pub use task::{CancelToken, ConsumerQueue, EventPoster, Progress, Task, TaskBuilder, TaskState};
pub use tree::{shape, TreeBuilder, TreeNode};
