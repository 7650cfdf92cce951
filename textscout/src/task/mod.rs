//! Long-running work with progress, a single result and cooperative cancellation.
//!
//! A [`Task`] wraps a job closure and runs it on its own named coordinator thread. Everything
//! the consumer gets to see is delivered as an event on a [`ConsumerQueue`], so callbacks run
//! on the consumer thread and never on the task's thread:
//!
//! ```text
//! Ready -start-> Scheduled -thread picks up-> Running
//! Running -Ok-> Succeeded
//! Running -Err / panic-> Failed
//! Running -cancel observed-> Cancelled
//! Ready -cancel-> Cancelled
//! ```
//!
//! Terminal states are absorbing and exactly one terminal event is posted. `on_running` is
//! posted before any progress event and the terminal event after all of them.
//!
//! ```rust,ignore
//! let queue = ConsumerQueue::new();
//! let task = TaskBuilder::new("count", |ctx| {
//!     ctx.update_progress(Progress::determinate(1, 1));
//!     Ok(42)
//! })
//! .on_succeeded(|n| println!("got {}", n))
//! .build(queue.poster());
//! task.start();
//! queue.run_until(|| task.state().is_terminal(), Duration::from_secs(5));
//! ```

pub mod cancel;
pub mod progress;
pub mod queue;

pub use cancel::CancelToken;
pub use progress::Progress;
pub use queue::{ConsumerQueue, EventPoster};

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

use crate::errors::{panic_message, SearchError, SearchResult};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> u64 {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Locks a mutex, recovering the data if a previous holder panicked
fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle of a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Ready,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

type Job<T> = Box<dyn FnOnce(&TaskContext) -> SearchResult<T> + Send + 'static>;
type ProgressCallback = Arc<Mutex<Box<dyn FnMut(Progress) + Send + 'static>>>;
type MessageCallback = Arc<Mutex<Box<dyn FnMut(&str) + Send + 'static>>>;

struct Callbacks<T> {
    on_running: Option<Box<dyn FnOnce() + Send + 'static>>,
    on_progress: Option<ProgressCallback>,
    on_message: Option<MessageCallback>,
    on_succeeded: Option<Box<dyn FnOnce(T) + Send + 'static>>,
    on_failed: Option<Box<dyn FnOnce(Arc<SearchError>) + Send + 'static>>,
    on_cancelled: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            on_running: None,
            on_progress: None,
            on_message: None,
            on_succeeded: None,
            on_failed: None,
            on_cancelled: None,
        }
    }
}

struct Inner<T> {
    state: TaskState,
    progress: Progress,
    message: String,
    result: Option<T>,
    failure: Option<Arc<SearchError>>,
}

enum Finish<T> {
    Succeeded(T),
    Failed(SearchError),
    Cancelled,
}

struct Shared<T> {
    id: u64,
    name: String,
    cancel: CancelToken,
    poster: EventPoster,
    // Lock order: `inner` before `callbacks`.
    inner: Mutex<Inner<T>>,
    callbacks: Mutex<Callbacks<T>>,
    job: Mutex<Option<Job<T>>>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn finish(&self, finish: Finish<T>) {
        let mut inner = lock(&self.inner);
        self.finish_locked(&mut inner, finish);
    }

    /// Moves to a terminal state and posts the matching event, unless already terminal
    fn finish_locked(&self, inner: &mut Inner<T>, finish: Finish<T>) {
        if inner.state.is_terminal() {
            return;
        }
        let mut callbacks = lock(&self.callbacks);
        match finish {
            Finish::Succeeded(value) => {
                info!("Task {} ({}) succeeded", self.id, self.name);
                inner.state = TaskState::Succeeded;
                inner.result = Some(value.clone());
                if let Some(callback) = callbacks.on_succeeded.take() {
                    self.poster.post(move || callback(value));
                }
            }
            Finish::Failed(err) => {
                warn!("Task {} ({}) failed: {}", self.id, self.name, err);
                let err = Arc::new(err);
                inner.state = TaskState::Failed;
                inner.failure = Some(Arc::clone(&err));
                if let Some(callback) = callbacks.on_failed.take() {
                    self.poster.post(move || callback(err));
                }
            }
            Finish::Cancelled => {
                info!("Task {} ({}) cancelled", self.id, self.name);
                inner.state = TaskState::Cancelled;
                if let Some(callback) = callbacks.on_cancelled.take() {
                    self.poster.post(callback);
                }
            }
        }
        // Nothing else will be delivered; release whatever the callbacks captured.
        *callbacks = Callbacks::default();
    }
}

/// What a running job can see of its task
trait Reporter: Send + Sync {
    fn report_progress(&self, progress: Progress);
    fn report_message(&self, message: &str);
}

impl<T: Clone + Send + 'static> Reporter for Shared<T> {
    fn report_progress(&self, progress: Progress) {
        let mut inner = lock(&self.inner);
        if inner.state != TaskState::Running {
            return;
        }
        if !progress.follows(&inner.progress) {
            debug!(
                "Task {} dropping non-monotonic progress {} after {}",
                self.id, progress, inner.progress
            );
            return;
        }
        inner.progress = progress;
        if let Some(callback) = &lock(&self.callbacks).on_progress {
            let callback = Arc::clone(callback);
            self.poster.post(move || {
                let mut callback = lock(&callback);
                (*callback)(progress)
            });
        }
    }

    fn report_message(&self, message: &str) {
        let mut inner = lock(&self.inner);
        if inner.state != TaskState::Running {
            return;
        }
        debug!("Task {}: {}", self.id, message);
        inner.message = message.to_string();
        if let Some(callback) = &lock(&self.callbacks).on_message {
            let callback = Arc::clone(callback);
            let message = message.to_string();
            self.poster.post(move || {
                let mut callback = lock(&callback);
                (*callback)(&message)
            });
        }
    }
}

/// Handle passed to a running job
#[derive(Clone)]
pub struct TaskContext {
    cancel: CancelToken,
    reporter: Arc<dyn Reporter>,
}

impl TaskContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The task's cancel flag, for handing down to the scanner
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Publishes progress. Updates that would move progress backwards are dropped.
    pub fn update_progress(&self, progress: Progress) {
        self.reporter.report_progress(progress);
    }

    /// Publishes a short status line such as "Reading files..."
    pub fn update_message(&self, message: &str) {
        self.reporter.report_message(message);
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A cancellable unit of background work producing one `T`
pub struct Task<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Schedules the job on a dedicated thread. A no-op unless the task is `Ready`.
    pub fn start(&self) {
        {
            let mut inner = lock(&self.shared.inner);
            if inner.state != TaskState::Ready {
                debug!(
                    "Task {} not started, already {}",
                    self.shared.id, inner.state
                );
                return;
            }
            inner.state = TaskState::Scheduled;
        }

        let job = match lock(&self.shared.job).take() {
            Some(job) => job,
            None => return,
        };

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("textscout-task-{}", self.shared.id))
            .spawn(move || run(shared, job));

        if let Err(e) = spawned {
            error!("Failed to spawn thread for task {}: {}", self.shared.id, e);
            self.shared.finish(Finish::Failed(SearchError::IoError(e)));
        }
    }

    /// Requests cancellation.
    ///
    /// A task that was never started is cancelled immediately. Otherwise the flag is set
    /// and the job observes it at its next check. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
        let mut inner = lock(&self.shared.inner);
        if inner.state == TaskState::Ready {
            lock(&self.shared.job).take();
            self.shared.finish_locked(&mut inner, Finish::Cancelled);
        }
    }

    pub fn state(&self) -> TaskState {
        lock(&self.shared.inner).state
    }

    /// Latest accepted progress
    pub fn progress(&self) -> Progress {
        lock(&self.shared.inner).progress
    }

    /// Latest status line
    pub fn message(&self) -> String {
        lock(&self.shared.inner).message.clone()
    }

    /// The value, once `Succeeded`
    pub fn result(&self) -> Option<T> {
        lock(&self.shared.inner).result.clone()
    }

    /// The error, once `Failed`
    pub fn failure(&self) -> Option<Arc<SearchError>> {
        lock(&self.shared.inner).failure.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

fn run<T: Clone + Send + 'static>(shared: Arc<Shared<T>>, job: Job<T>) {
    if shared.cancel.is_cancelled() {
        shared.finish(Finish::Cancelled);
        return;
    }

    {
        let mut inner = lock(&shared.inner);
        if inner.state.is_terminal() {
            return;
        }
        inner.state = TaskState::Running;
        if let Some(callback) = lock(&shared.callbacks).on_running.take() {
            shared.poster.post(callback);
        }
    }
    debug!("Task {} ({}) running", shared.id, shared.name);

    let ctx = TaskContext {
        cancel: shared.cancel.clone(),
        reporter: Arc::clone(&shared) as Arc<dyn Reporter>,
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&ctx)));
    let finish = match outcome {
        Ok(Ok(_)) if shared.cancel.is_cancelled() => Finish::Cancelled,
        Ok(Ok(value)) => Finish::Succeeded(value),
        Ok(Err(e)) if e.is_cancelled() || shared.cancel.is_cancelled() => Finish::Cancelled,
        Ok(Err(e)) => Finish::Failed(e),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Task {} ({}) panicked: {}", shared.id, shared.name, message);
            Finish::Failed(SearchError::worker_fault(message))
        }
    };
    shared.finish(finish);
}

/// Assembles a [`Task`] from a job and its callbacks
pub struct TaskBuilder<T> {
    name: String,
    job: Job<T>,
    callbacks: Callbacks<T>,
}

impl<T> std::fmt::Debug for TaskBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskBuilder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> TaskBuilder<T> {
    pub fn new<F>(name: impl Into<String>, job: F) -> Self
    where
        F: FnOnce(&TaskContext) -> SearchResult<T> + Send + 'static,
    {
        Self {
            name: name.into(),
            job: Box::new(job),
            callbacks: Callbacks::default(),
        }
    }

    pub fn on_running(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.callbacks.on_running = Some(Box::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(Progress) + Send + 'static) -> Self {
        self.callbacks.on_progress = Some(Arc::new(Mutex::new(Box::new(callback))));
        self
    }

    pub fn on_message(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.callbacks.on_message = Some(Arc::new(Mutex::new(Box::new(callback))));
        self
    }

    pub fn on_succeeded(mut self, callback: impl FnOnce(T) + Send + 'static) -> Self {
        self.callbacks.on_succeeded = Some(Box::new(callback));
        self
    }

    pub fn on_failed(mut self, callback: impl FnOnce(Arc<SearchError>) + Send + 'static) -> Self {
        self.callbacks.on_failed = Some(Box::new(callback));
        self
    }

    pub fn on_cancelled(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.callbacks.on_cancelled = Some(Box::new(callback));
        self
    }

    /// Creates the task in `Ready`; events go to the queue behind `poster`
    pub fn build(self, poster: EventPoster) -> Task<T> {
        let id = next_task_id();
        debug!("Task {} ({}) created", id, self.name);
        Task {
            shared: Arc::new(Shared {
                id,
                name: self.name,
                cancel: CancelToken::new(),
                poster,
                inner: Mutex::new(Inner {
                    state: TaskState::Ready,
                    progress: Progress::Indeterminate,
                    message: String::new(),
                    result: None,
                    failure: None,
                }),
                callbacks: Mutex::new(self.callbacks),
                job: Mutex::new(Some(self.job)),
            }),
        }
    }
}
