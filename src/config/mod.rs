//! Configuration management for binexport
//!
//! This module handles loading, parsing, and validating configuration:
//! - Configuration file (TOML format, `~/.binexport/config.toml` by default)
//! - Command-line arguments (applied on top by the CLI layer)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values
//!
//! The raw [`Config`] keeps durations and timestamps as text so the file stays
//! readable; [`ExportSettings::resolve`] turns it into typed values and reports
//! every configuration error before any remote call is made.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::executor::retry::RetryPolicy;
use crate::planner::PlannerSettings;
use crate::utils::fs::ensure_writable_dir;
use crate::utils::time::{parse_duration, parse_timestamp};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// MongoDB connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Connect and server selection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// What to export and how to slice it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Database (workspace) holding the collection
    #[serde(default)]
    pub database: Option<String>,

    /// Collection (table) to export
    #[serde(default)]
    pub collection: Option<String>,

    /// Field holding the record timestamp
    #[serde(default = "default_time_field")]
    pub time_field: String,

    /// Extra filter in Extended JSON, combined with the time predicate
    #[serde(default)]
    pub filter: Option<String>,

    /// Inclusive start of the export range (RFC 3339)
    #[serde(default)]
    pub start: Option<String>,

    /// Exclusive end of the export range (RFC 3339)
    #[serde(default)]
    pub end: Option<String>,

    /// First slice width tried by the planner
    #[serde(default = "default_initial_slice")]
    pub initial_slice: String,

    /// Narrowest slice the planner will bisect to
    #[serde(default = "default_min_slice")]
    pub min_slice: String,

    /// Record ceiling per bin
    #[serde(default = "default_max_records_per_bin")]
    pub max_records_per_bin: u64,

    /// Attempts per remote operation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout per remote operation
    #[serde(default = "default_query_timeout")]
    pub query_timeout: String,

    /// Extra time allowed past the timeout before an attempt is cancelled
    #[serde(default = "default_retry_grace")]
    pub retry_grace: String,

    /// Delay after the first failed attempt; doubles after each further one
    #[serde(default = "default_backoff_base")]
    pub backoff_base: String,

    /// Pause after every count request
    #[serde(default = "default_count_pause")]
    pub count_pause: String,

    /// Directory receiving the compressed files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Manifest file; relative paths are resolved inside `output_dir`
    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,

    /// Gzip level (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_app_name() -> String {
    "binexport".to_string()
}

fn default_time_field() -> String {
    "timestamp".to_string()
}

fn default_initial_slice() -> String {
    "1d".to_string()
}

fn default_min_slice() -> String {
    "1m".to_string()
}

fn default_max_records_per_bin() -> u64 {
    500_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_query_timeout() -> String {
    "10m".to_string()
}

fn default_retry_grace() -> String {
    "5s".to_string()
}

fn default_backoff_base() -> String {
    "1s".to_string()
}

fn default_count_pause() -> String {
    "50ms".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("export")
}

fn default_manifest_file() -> PathBuf {
    PathBuf::from("manifest.csv")
}

fn default_compression_level() -> u32 {
    6
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            timeout: default_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            database: None,
            collection: None,
            time_field: default_time_field(),
            filter: None,
            start: None,
            end: None,
            initial_slice: default_initial_slice(),
            min_slice: default_min_slice(),
            max_records_per_bin: default_max_records_per_bin(),
            max_retries: default_max_retries(),
            query_timeout: default_query_timeout(),
            retry_grace: default_retry_grace(),
            backoff_base: default_backoff_base(),
            count_pause: default_count_pause(),
            output_dir: default_output_dir(),
            manifest_file: default_manifest_file(),
            compression_level: default_compression_level(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from an explicit path or the default location
    ///
    /// An explicit path must exist. When no path is given, a missing default
    /// file yields the default configuration.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".binexport")
            .join("config.toml")
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Generic(e.to_string()).into())
    }

    /// Validate every value that does not depend on the requested range
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, the first problem otherwise
    pub fn validate(&self) -> Result<()> {
        if self.connection.uri.trim().is_empty() {
            return Err(ConfigError::MissingField("connection.uri".to_string()).into());
        }
        if self.connection.timeout == 0 {
            return Err(invalid("connection.timeout", "0"));
        }

        self.export.planner_settings()?;
        self.export.retry_policy()?;
        self.export.count_pause()?;
        self.export.parsed_filter()?;

        if self.export.time_field.trim().is_empty() {
            return Err(ConfigError::MissingField("export.time_field".to_string()).into());
        }
        if self.export.compression_level > 9 {
            return Err(invalid(
                "export.compression_level",
                &self.export.compression_level.to_string(),
            ));
        }

        Ok(())
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.timeout)
    }
}

impl ExportConfig {
    /// Planner sizing, checked for positive slices, `min <= initial` and a non-zero ceiling.
    pub fn planner_settings(&self) -> Result<PlannerSettings> {
        let initial_slice = positive_duration("export.initial_slice", &self.initial_slice)?;
        let min_slice = positive_duration("export.min_slice", &self.min_slice)?;

        if min_slice > initial_slice {
            return Err(ConfigError::Generic(format!(
                "export.min_slice ({}) must not exceed export.initial_slice ({})",
                self.min_slice, self.initial_slice
            ))
            .into());
        }
        if self.max_records_per_bin == 0 {
            return Err(invalid("export.max_records_per_bin", "0"));
        }

        Ok(PlannerSettings {
            initial_slice,
            min_slice,
            max_records_per_bin: self.max_records_per_bin,
        })
    }

    /// Retry policy, checked for at least one attempt and a positive timeout.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        if self.max_retries == 0 {
            return Err(invalid("export.max_retries", "0"));
        }

        Ok(RetryPolicy {
            max_retries: self.max_retries,
            timeout: to_std(
                "export.query_timeout",
                positive_duration("export.query_timeout", &self.query_timeout)?,
            )?,
            grace: to_std(
                "export.retry_grace",
                any_duration("export.retry_grace", &self.retry_grace)?,
            )?,
            backoff_base: to_std(
                "export.backoff_base",
                any_duration("export.backoff_base", &self.backoff_base)?,
            )?,
        })
    }

    pub fn count_pause(&self) -> Result<Duration> {
        to_std(
            "export.count_pause",
            any_duration("export.count_pause", &self.count_pause)?,
        )
    }

    /// The user filter as a BSON document, if one is configured.
    pub fn parsed_filter(&self) -> Result<Option<Document>> {
        match self.filter.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_filter(text).map(Some),
        }
    }

    /// Manifest location, resolved inside `output_dir` when relative.
    pub fn manifest_path(&self) -> PathBuf {
        if self.manifest_file.is_absolute() {
            self.manifest_file.clone()
        } else {
            self.output_dir.join(&self.manifest_file)
        }
    }
}

/// Parse an Extended JSON filter, requiring a JSON object.
pub fn parse_filter(text: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| ConfigError::InvalidValue {
        field: "export.filter".to_string(),
        value: e.to_string(),
    })?;

    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(ConfigError::InvalidValue {
            field: "export.filter".to_string(),
            value: format!("expected an object, found {}", other),
        }
        .into()),
        Err(e) => Err(ConfigError::InvalidValue {
            field: "export.filter".to_string(),
            value: e.to_string(),
        }
        .into()),
    }
}

/// Fully resolved, typed settings for one export run
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub database: String,
    pub collection: String,
    pub time_field: String,
    pub filter: Option<Document>,
    /// Inclusive start; equal to `end` when there is nothing to export
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
    pub planner: PlannerSettings,
    pub retry: RetryPolicy,
    pub count_pause: Duration,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub compression_level: u32,
    /// Stop after planning and consolidation
    pub plan_only: bool,
    /// Draw progress bars
    pub show_progress: bool,
}

impl ExportSettings {
    /// Resolve and validate the export section of `config`
    ///
    /// # Returns
    /// * `Result<ExportSettings>` - Typed settings, or the first configuration error
    pub fn resolve(config: &Config) -> Result<Self> {
        config.validate()?;
        let export = &config.export;

        let database = required("export.database", export.database.as_deref())?;
        let collection = required("export.collection", export.collection.as_deref())?;
        let start = timestamp("export.start", export.start.as_deref())?;
        let end = timestamp("export.end", export.end.as_deref())?;

        if start > end {
            return Err(ConfigError::InvalidRange {
                start: export.start.clone().unwrap_or_default(),
                end: export.end.clone().unwrap_or_default(),
            }
            .into());
        }

        // Stored dates have millisecond resolution; widen the range onto that grid.
        let start = floor_millis("export.start", start)?;
        let end = ceil_millis("export.end", end)?;

        Ok(Self {
            database,
            collection,
            time_field: export.time_field.clone(),
            filter: export.parsed_filter()?,
            start,
            end,
            planner: export.planner_settings()?,
            retry: export.retry_policy()?,
            count_pause: export.count_pause()?,
            output_dir: export.output_dir.clone(),
            manifest_path: export.manifest_path(),
            compression_level: export.compression_level,
            plan_only: false,
            show_progress: true,
        })
    }

    /// Create the output directory and check it accepts files
    ///
    /// Does nothing in plan-only mode, which never writes.
    pub fn prepare_output_dir(&self) -> Result<()> {
        if self.plan_only {
            return Ok(());
        }
        ensure_writable_dir(&self.output_dir)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn invalid(field: &str, value: &str) -> crate::error::BinExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn any_duration(field: &str, value: &str) -> Result<TimeDelta> {
    match parse_duration(value) {
        Some(d) if d >= TimeDelta::zero() => Ok(d),
        _ => Err(invalid(field, value)),
    }
}

fn positive_duration(field: &str, value: &str) -> Result<TimeDelta> {
    match any_duration(field, value)? {
        d if d > TimeDelta::zero() => Ok(d),
        _ => Err(invalid(field, value)),
    }
}

fn to_std(field: &str, delta: TimeDelta) -> Result<Duration> {
    delta
        .to_std()
        .map_err(|_| invalid(field, &delta.to_string()))
}

fn required(field: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingField(field.to_string()).into()),
    }
}

fn timestamp(field: &str, value: Option<&str>) -> Result<DateTime<Utc>> {
    let text = required(field, value)?;
    parse_timestamp(&text).ok_or_else(|| invalid(field, &text))
}

fn floor_millis(field: &str, ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    ts.duration_trunc(TimeDelta::milliseconds(1))
        .map_err(|_| invalid(field, &ts.to_rfc3339()))
}

fn ceil_millis(field: &str, ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let floor = floor_millis(field, ts)?;
    if floor < ts {
        Ok(floor + TimeDelta::milliseconds(1))
    } else {
        Ok(floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BinExportError;
    use chrono::TimeZone;

    fn export_config() -> Config {
        let mut config = Config::default();
        config.export.database = Some("telemetry".to_string());
        config.export.collection = Some("events".to_string());
        config.export.start = Some("2024-01-01T00:00:00Z".to_string());
        config.export.end = Some("2024-01-02T00:00:00Z".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.uri, "mongodb://localhost:27017");
        assert_eq!(config.export.time_field, "timestamp");
        assert_eq!(config.export.max_records_per_bin, 500_000);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [export]
            collection = "events"
            min_slice = "30s"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.export.collection.as_deref(), Some("events"));
        assert_eq!(config.export.min_slice, "30s");
        assert_eq!(config.export.initial_slice, "1d");
        assert_eq!(config.connection.timeout, 30);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[export\nbroken").unwrap_err();
        assert!(matches!(
            err,
            BinExportError::Config(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = export_config();
        let text = config.to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.export.collection.as_deref(), Some("events"));
        assert_eq!(parsed.export.count_pause, "50ms");
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/binexport.toml")))
            .unwrap_err();
        assert!(matches!(
            err,
            BinExportError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\nuri = \"mongodb://db:27017\"\n").unwrap();

        let config = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(config.connection.uri, "mongodb://db:27017");
    }

    #[test]
    fn test_resolve() {
        let settings = ExportSettings::resolve(&export_config()).unwrap();
        assert_eq!(settings.collection, "events");
        assert_eq!(
            settings.start,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(settings.planner.initial_slice, TimeDelta::days(1));
        assert_eq!(settings.planner.min_slice, TimeDelta::minutes(1));
        assert_eq!(settings.retry.timeout, Duration::from_secs(600));
        assert_eq!(settings.retry.grace, Duration::from_secs(5));
        assert_eq!(settings.count_pause, Duration::from_millis(50));
        assert_eq!(settings.manifest_path, PathBuf::from("export/manifest.csv"));
        assert!(settings.filter.is_none());
    }

    #[test]
    fn test_sub_millisecond_bounds_widen_to_whole_millis() {
        let mut config = export_config();
        config.export.start = Some("2024-01-01T00:00:00.0004Z".to_string());
        config.export.end = Some("2024-01-01T00:00:10.0005Z".to_string());

        let settings = ExportSettings::resolve(&config).unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(settings.start, base);
        assert_eq!(settings.end, base + TimeDelta::milliseconds(10_001));

        // Every window edge now maps to a distinct millisecond bound.
        let range = crate::planner::TimeRange::new(settings.start, settings.end).unwrap();
        let windows = range.windows(TimeDelta::seconds(10));
        assert_eq!(windows.len(), 2);
        assert_eq!(
            windows[1].start().timestamp_millis() + 1,
            windows[1].end().timestamp_millis()
        );
    }

    #[test]
    fn test_whole_millisecond_bounds_unchanged() {
        let mut config = export_config();
        config.export.end = Some("2024-01-01T00:00:10.250Z".to_string());
        let settings = ExportSettings::resolve(&config).unwrap();
        assert_eq!(settings.end.timestamp_subsec_nanos(), 250_000_000);
    }

    #[test]
    fn test_prepare_output_dir_rejects_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let mut config = export_config();
        config.export.output_dir = file.clone();
        let mut settings = ExportSettings::resolve(&config).unwrap();

        let err = settings.prepare_output_dir().unwrap_err();
        assert!(matches!(
            err,
            BinExportError::Config(ConfigError::OutputDirectory(_))
        ));

        settings.plan_only = true;
        assert!(settings.prepare_output_dir().is_ok());
    }

    #[test]
    fn test_start_after_end_rejected() {
        let mut config = export_config();
        config.export.start = Some("2024-01-03T00:00:00Z".to_string());
        let err = ExportSettings::resolve(&config).unwrap_err();
        assert!(matches!(
            err,
            BinExportError::Config(ConfigError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_equal_bounds_accepted() {
        let mut config = export_config();
        config.export.end = config.export.start.clone();
        let settings = ExportSettings::resolve(&config).unwrap();
        assert_eq!(settings.start, settings.end);
    }

    #[test]
    fn test_missing_collection() {
        let mut config = export_config();
        config.export.collection = None;
        let err = ExportSettings::resolve(&config).unwrap_err();
        assert!(matches!(
            err,
            BinExportError::Config(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_invalid_slices() {
        let mut config = Config::default();
        config.export.min_slice = "2d".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.initial_slice = "0s".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.min_slice = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ceiling_retries_and_timeout_rejected() {
        let mut config = Config::default();
        config.export.max_records_per_bin = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.query_timeout = "0s".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_filter_parsing() {
        let doc = parse_filter(r#"{"level": "error", "ts": {"$date": "2024-01-01T00:00:00Z"}}"#)
            .unwrap();
        assert_eq!(doc.get_str("level").unwrap(), "error");
        assert!(doc.get_datetime("ts").is_ok());

        assert!(parse_filter("[1, 2]").is_err());
        assert!(parse_filter("{not json").is_err());
    }

    #[test]
    fn test_absolute_manifest_path_kept() {
        let mut config = Config::default();
        config.export.manifest_file = PathBuf::from("/var/tmp/manifest.csv");
        assert_eq!(
            config.export.manifest_path(),
            PathBuf::from("/var/tmp/manifest.csv")
        );
    }
}
