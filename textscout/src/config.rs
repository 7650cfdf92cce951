use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::SearchResult;
use crate::query::Query;

/// Configuration for a search run.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.textscout.yaml` in the current directory
/// 3. Global `$HOME/.config/textscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to search under
/// root_path: "/var/log"
///
/// # Extension of candidate files, without the dot
/// extension: "log"
///
/// # Literal text to look for
/// query: "error"
///
/// # Follow symbolic links while walking (default: true)
/// follow_links: true
///
/// # Glob patterns (relative to root_path) excluded from the search
/// ignore_patterns:
///   - "archive/**"
///
/// # Worker threads (default: CPU cores)
/// thread_count: 4
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # What to do with files that are not valid UTF-8 (skip, lossy)
/// encoding_mode: "skip"
/// ```
///
/// Command-line arguments take precedence over file values, see [`SearchConfig::merge_with_cli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Root directory to start search from
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Extension of candidate files, without the leading dot (e.g. "log")
    #[serde(default)]
    pub extension: String,

    /// Literal text that a file must contain
    #[serde(default)]
    pub query: String,

    /// Whether the walk follows symbolic links
    #[serde(default = "default_follow_links")]
    pub follow_links: bool,

    /// Patterns to ignore (glob syntax, relative to the root)
    /// Examples:
    /// - "target/**": Ignore everything under target/
    /// - "**/*.old.log": Ignore rotated logs anywhere
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of worker threads in the shared pool
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How to treat files that are not valid UTF-8
    #[serde(default)]
    pub encoding_mode: EncodingMode,
}

/// How file content that is not valid UTF-8 is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Log a warning and skip the file
    #[default]
    Skip,
    /// Replace invalid sequences with U+FFFD and keep going
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = crate::errors::SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "lossy" => Ok(Self::Lossy),
            other => Err(crate::errors::SearchError::config_error(format!(
                "unknown encoding mode '{}' (expected skip or lossy)",
                other
            ))),
        }
    }
}

/// Values given on the command line; `None` means the flag was absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub root_path: Option<PathBuf>,
    pub extension: Option<String>,
    pub query: Option<String>,
    pub follow_links: Option<bool>,
    pub ignore_patterns: Vec<String>,
    pub thread_count: Option<NonZeroUsize>,
    pub log_level: Option<String>,
    pub encoding_mode: Option<EncodingMode>,
}

/// Tunables the scanner needs beyond the [`Query`] itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub follow_links: bool,
    pub ignore_patterns: Vec<String>,
    pub encoding_mode: EncodingMode,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_links: true,
            ignore_patterns: Vec::new(),
            encoding_mode: EncodingMode::default(),
        }
    }
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_follow_links() -> bool {
    true
}

pub(crate) fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            extension: String::new(),
            query: String::new(),
            follow_links: default_follow_links(),
            ignore_patterns: Vec::new(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            encoding_mode: EncodingMode::default(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional explicit file.
    /// An explicit file that does not exist is an error.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("textscout/config.yaml")),
            Some(PathBuf::from(".textscout.yaml")),
        ];

        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Overlays command-line values onto configuration file values.
    /// Every value that was given wins, even when it equals the default.
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(root_path) = cli.root_path {
            self.root_path = root_path;
        }
        if let Some(extension) = cli.extension {
            self.extension = extension;
        }
        if let Some(query) = cli.query {
            self.query = query;
        }
        if let Some(follow_links) = cli.follow_links {
            self.follow_links = follow_links;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns = cli.ignore_patterns;
        }
        if let Some(thread_count) = cli.thread_count {
            self.thread_count = thread_count;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        if let Some(encoding_mode) = cli.encoding_mode {
            self.encoding_mode = encoding_mode;
        }
        self
    }

    /// Validates root, extension and query, producing the immutable search request
    pub fn to_query(&self) -> SearchResult<Query> {
        Query::new(&self.root_path, &self.extension, &self.query)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            follow_links: self.follow_links,
            ignore_patterns: self.ignore_patterns.clone(),
            encoding_mode: self.encoding_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            root_path: "/var/log"
            extension: "log"
            query: "error"
            follow_links: false
            ignore_patterns: ["archive/*"]
            thread_count: 4
            log_level: "debug"
            encoding_mode: "lossy"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("/var/log"));
        assert_eq!(config.extension, "log");
        assert_eq!(config.query, "error");
        assert!(!config.follow_links);
        assert_eq!(config.ignore_patterns, vec!["archive/*".to_string()]);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.encoding_mode, EncodingMode::Lossy);
    }

    #[test]
    fn test_merge_with_cli() {
        let config_file = SearchConfig {
            root_path: PathBuf::from("/var/log"),
            extension: "log".to_string(),
            query: "error".to_string(),
            follow_links: true,
            ignore_patterns: vec!["archive/*".to_string()],
            thread_count: NonZeroUsize::new(4).unwrap(),
            log_level: "info".to_string(),
            encoding_mode: EncodingMode::Lossy,
        };

        let cli = CliOverrides {
            root_path: Some(PathBuf::from("/srv/logs")),
            query: Some("panic".to_string()),
            follow_links: Some(false),
            log_level: Some("debug".to_string()),
            ..CliOverrides::default()
        };

        let merged = config_file.clone().merge_with_cli(cli);
        assert_eq!(merged.root_path, PathBuf::from("/srv/logs")); // CLI value
        assert_eq!(merged.extension, "log"); // File value (flag absent)
        assert_eq!(merged.query, "panic"); // CLI value
        assert!(!merged.follow_links); // CLI value
        assert_eq!(merged.ignore_patterns, vec!["archive/*".to_string()]); // File value
        assert_eq!(merged.thread_count, NonZeroUsize::new(4).unwrap()); // File value
        assert_eq!(merged.log_level, "debug"); // CLI value
        assert_eq!(merged.encoding_mode, EncodingMode::Lossy); // File value

        let untouched = config_file.clone().merge_with_cli(CliOverrides::default());
        assert_eq!(untouched.encoding_mode, EncodingMode::Lossy);
        assert_eq!(untouched.root_path, config_file.root_path);
    }

    #[test]
    fn test_merge_with_cli_default_values_still_win() {
        let config_file = SearchConfig {
            root_path: PathBuf::from("/var/log"),
            thread_count: NonZeroUsize::new(4).unwrap(),
            encoding_mode: EncodingMode::Lossy,
            ..SearchConfig::default()
        };

        let cli = CliOverrides {
            root_path: Some(default_root_path()),
            thread_count: Some(default_thread_count()),
            encoding_mode: Some(EncodingMode::Skip),
            ..CliOverrides::default()
        };

        let merged = config_file.merge_with_cli(cli);
        assert_eq!(merged.root_path, PathBuf::from("."));
        assert_eq!(merged.thread_count, default_thread_count());
        assert_eq!(merged.encoding_mode, EncodingMode::Skip);
    }

    #[test]
    fn test_default_values() {
        let config_content = r#"
            extension: "txt"
            query: "needle"
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("."));
        assert!(config.follow_links);
        assert!(config.ignore_patterns.is_empty());
        assert_eq!(
            config.thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.encoding_mode, EncodingMode::Skip);
    }

    #[test]
    fn test_invalid_config() {
        let config_content = r#"
            root_path: []  # Should be string
            thread_count: "invalid"  # Should be number
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let result = SearchConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SearchConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_encoding_mode_from_str() {
        assert_eq!("skip".parse::<EncodingMode>().unwrap(), EncodingMode::Skip);
        assert_eq!("LOSSY".parse::<EncodingMode>().unwrap(), EncodingMode::Lossy);
        assert!("utf16".parse::<EncodingMode>().is_err());
    }

    #[test]
    fn test_to_query_validates() {
        let dir = tempdir().unwrap();
        let config = SearchConfig {
            root_path: dir.path().to_path_buf(),
            extension: "log".to_string(),
            query: String::new(),
            ..SearchConfig::default()
        };
        assert!(config.to_query().is_err());

        let config = SearchConfig {
            query: "x".to_string(),
            ..config
        };
        let query = config.to_query().unwrap();
        assert_eq!(query.extension(), "log");
        assert_eq!(config.scan_options(), ScanOptions::default());
    }
}
