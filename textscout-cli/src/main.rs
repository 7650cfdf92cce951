use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use textscout::{
    init_worker_pool, render_task, search_task, tree_task_for, CliOverrides, ConsumerQueue,
    EncodingMode, Progress, SearchConfig, SearchError, SearchOutput, Segment, TaskBuilder,
    TreeNode,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML), layered over the global and local ones
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SearchArgs {
    /// Directory to search under
    root: Option<PathBuf>,

    /// Extension of candidate files, without the dot (e.g. log)
    #[arg(short = 'e', long)]
    extension: Option<String>,

    /// Literal text a file must contain
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Show matches as a tree under the root
    #[arg(short, long)]
    tree: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Print scan statistics after the result
    #[arg(short, long)]
    stats: bool,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Patterns to ignore (glob format, relative to the root)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Do not follow symbolic links while walking
    #[arg(long)]
    no_follow_links: bool,

    /// How to handle files that are not valid UTF-8 (skip|lossy)
    #[arg(long)]
    encoding: Option<EncodingMode>,

    /// Cancel the search after this long (e.g. 500ms, 10s)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

#[derive(Args)]
struct ShowArgs {
    /// File to render
    path: PathBuf,

    /// Literal text to highlight
    #[arg(short = 'q', long)]
    query: String,

    /// How to handle files that are not valid UTF-8 (skip|lossy)
    #[arg(long)]
    encoding: Option<EncodingMode>,

    /// Give up after this long
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find files with a given extension that contain a literal text
    Search(SearchArgs),

    /// Print a file with every occurrence of a text highlighted
    Show(ShowArgs),
}

/// How a task ended, as seen from the consumer thread
enum Finished<T> {
    Succeeded(T),
    Failed(Arc<SearchError>),
    Cancelled,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let file_config = SearchConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Search(args) => run_search(args, file_config),
        Commands::Show(args) => run_show(args, file_config),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

/// Runs a task to completion with this thread as its consumer.
///
/// Events are dispatched here, the optional bar follows progress, and the task is
/// cancelled once `timeout` elapses.
fn drive<T: Clone + Send + 'static>(
    builder: TaskBuilder<T>,
    bar: Option<&ProgressBar>,
    timeout: Option<Duration>,
) -> Finished<T> {
    let queue = ConsumerQueue::new();
    let finished: Arc<Mutex<Option<Finished<T>>>> = Arc::new(Mutex::new(None));

    let mut builder = builder;
    if let Some(bar) = bar {
        let (message_bar, tick_bar) = (bar.clone(), bar.clone());
        builder = builder
            .on_message(move |message| message_bar.set_message(message.to_string()))
            .on_progress(move |progress| match progress {
                Progress::Indeterminate => tick_bar.tick(),
                Progress::Determinate { done, total } => {
                    tick_bar.set_length(total as u64);
                    tick_bar.set_position(done as u64);
                }
            });
    }

    let (f1, f2, f3) = (
        Arc::clone(&finished),
        Arc::clone(&finished),
        Arc::clone(&finished),
    );
    let task = builder
        .on_succeeded(move |value| *lock(&f1) = Some(Finished::Succeeded(value)))
        .on_failed(move |err| *lock(&f2) = Some(Finished::Failed(err)))
        .on_cancelled(move || *lock(&f3) = Some(Finished::Cancelled))
        .build(queue.poster());

    let started = Instant::now();
    task.start();
    debug!("Driving task {} ({})", task.id(), task.name());

    loop {
        if let Some(done) = lock(&finished).take() {
            return done;
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit && !task.is_cancel_requested() {
                warn!(
                    "Timed out after {}, cancelling",
                    humantime::format_duration(limit)
                );
                task.cancel();
            }
        }
        queue.dispatch_next(Duration::from_millis(50));
    }
}

fn run_search(args: SearchArgs, file_config: SearchConfig) -> Result<ExitCode> {
    let overrides = CliOverrides {
        root_path: args.root,
        extension: args.extension,
        query: args.query,
        follow_links: args.no_follow_links.then_some(false),
        ignore_patterns: args.ignore,
        thread_count: args.threads,
        log_level: None,
        encoding_mode: args.encoding,
    };
    let config = file_config.merge_with_cli(overrides);
    init_logging(&config.log_level);
    init_worker_pool(config.thread_count)?;

    // Bad roots, extensions and queries are reported here, before anything starts
    let builder = search_task(&config)?;

    let bar = if args.json { None } else { Some(progress_bar()?) };
    let finished = drive(builder, bar.as_ref(), args.timeout);
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    let output = match finished {
        Finished::Succeeded(output) => output,
        Finished::Failed(err) => bail!("search failed: {}", err),
        Finished::Cancelled => bail!("search cancelled"),
    };

    let tree = if args.tree {
        match drive(tree_task_for(&output)?, None, None) {
            Finished::Succeeded(tree) => Some(tree),
            Finished::Failed(err) => bail!("failed to shape results: {}", err),
            Finished::Cancelled => bail!("shaping cancelled"),
        }
    } else {
        None
    };

    if args.json {
        print_json(&output, tree.as_ref())?;
    } else if let Some(tree) = &tree {
        print_tree(tree);
    } else {
        for path in output.paths() {
            println!("{}", path.display());
        }
    }

    if args.stats && !args.json {
        print_stats(&output);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_show(args: ShowArgs, file_config: SearchConfig) -> Result<ExitCode> {
    init_logging(&file_config.log_level);
    let encoding = args.encoding.unwrap_or(file_config.encoding_mode);

    let builder = render_task(args.path.clone(), args.query.clone(), encoding)?;
    match drive(builder, None, args.timeout) {
        Finished::Succeeded(Some(segments)) => {
            print_segments(&segments)?;
            Ok(ExitCode::SUCCESS)
        }
        Finished::Succeeded(None) => {
            eprintln!(
                "No occurrences of '{}' in {}",
                args.query,
                args.path.display()
            );
            Ok(ExitCode::from(1))
        }
        Finished::Failed(err) => bail!("failed to render {}: {}", args.path.display(), err),
        Finished::Cancelled => bail!("rendering cancelled"),
    }
}

fn print_json(output: &SearchOutput, tree: Option<&TreeNode>) -> Result<()> {
    let mut value = serde_json::to_value(output)?;
    if let Some(tree) = tree {
        value["tree"] = serde_json::to_value(tree)?;
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_tree(tree: &TreeNode) {
    for (depth, node) in tree.iter() {
        let indent = "  ".repeat(depth);
        if depth == 0 {
            println!("{}", node.label().blue().bold());
        } else if node.is_leaf() {
            println!("{}{}", indent, node.label());
        } else {
            println!("{}{}/", indent, node.label().blue());
        }
    }
}

fn print_segments(segments: &[Segment]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for segment in segments {
        if segment.highlighted {
            write!(out, "{}", segment.text.red().bold())?;
        } else {
            write!(out, "{}", segment.text)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn print_stats(output: &SearchOutput) {
    let stats = &output.stats;
    println!(
        "\nFound {} matching files out of {} candidates",
        output.len(),
        stats.files_submitted
    );
    println!(
        "Skipped {} unreadable files, {} walk errors, {} bytes read",
        stats.files_skipped, stats.walk_errors, stats.bytes_read
    );
}
