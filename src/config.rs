//! Configuration loading and resolution into the immutable [`CacheConfig`] used by a run.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::asset_paths::normalize_relative;
use crate::selection::CacheFilter;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "sw.config.json";

const DEFAULT_OUTPUT: &str = "dist";
const DEFAULT_NAME: &str = "sw";
const DEFAULT_VERSION: &str = "0.0.1";
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_EFFECTIVE_TIME_MS: i64 = 60_000;

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read {path}: {source}")]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// The JSON configuration file could not be parsed.
  #[error("failed to parse {path}: {source}")]
  Json {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_json::Error,
  },
  /// The YAML configuration file could not be parsed.
  #[error("failed to parse {path}: {source}")]
  Yaml {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_yaml::Error,
  },
  /// The `excache` pattern is not a valid regular expression.
  #[error("invalid exclusion pattern `{pattern}`: {source}")]
  InvalidPattern {
    /// Pattern as written in the configuration.
    pattern: String,
    /// Source regex error.
    source: regex::Error,
  },
}

/// Options as written in the configuration file. Every key is optional.
///
/// A key that is absent or `null` takes its default; one bad key never discards the rest.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(from = "RawConfigFile")]
pub struct SwConfigFile {
  /// Build output directory, relative to the working directory.
  pub output: String,
  /// HTML files that should receive the loader. Empty means every HTML file.
  pub html: Vec<String>,
  /// Base name of the emitted worker script and version marker.
  pub name: String,
  /// Declared application version.
  pub version: String,
  /// Regular expression; matching paths are not cached.
  pub excache: Option<String>,
  /// Files whose content contains this string are always cached.
  pub cache_flag: String,
  /// Size bounds in bytes. The effective range is the min and max of the listed values.
  pub size: Vec<u64>,
  /// Grace period in milliseconds during which no update check happens.
  pub time: i64,
  /// Whether the app may be used fully offline.
  pub offline: bool,
  /// Whether emitted scripts are compacted.
  pub compress: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawConfigFile {
  output: Option<String>,
  html: Option<Vec<String>>,
  name: Option<String>,
  version: Option<String>,
  excache: Option<String>,
  cache_flag: Option<String>,
  size: Option<Vec<u64>>,
  time: Option<i64>,
  offline: Option<bool>,
  compress: Option<bool>,
}

impl From<RawConfigFile> for SwConfigFile {
  fn from(raw: RawConfigFile) -> Self {
    let defaults = Self::default();
    Self {
      output: raw.output.unwrap_or(defaults.output),
      html: raw.html.unwrap_or(defaults.html),
      name: raw.name.unwrap_or(defaults.name),
      version: raw.version.unwrap_or(defaults.version),
      excache: raw.excache.or(defaults.excache),
      cache_flag: raw.cache_flag.unwrap_or(defaults.cache_flag),
      size: raw.size.unwrap_or(defaults.size),
      time: raw.time.unwrap_or(defaults.time),
      offline: raw.offline.unwrap_or(defaults.offline),
      compress: raw.compress.unwrap_or(defaults.compress),
    }
  }
}

impl Default for SwConfigFile {
  fn default() -> Self {
    Self {
      output: DEFAULT_OUTPUT.into(),
      html: Vec::new(),
      name: DEFAULT_NAME.into(),
      version: DEFAULT_VERSION.into(),
      excache: None,
      cache_flag: String::new(),
      size: vec![0, DEFAULT_MAX_SIZE],
      time: DEFAULT_EFFECTIVE_TIME_MS,
      offline: true,
      compress: true,
    }
  }
}

/// Where the options of a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
  /// Loaded from the given file.
  File(PathBuf),
  /// The file could not be loaded; built-in defaults are in effect.
  Defaults {
    /// File that was attempted.
    attempted: PathBuf,
    /// Why loading failed.
    reason: String,
  },
}

/// Configuration file contents together with their origin.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
  /// Parsed (or default) options.
  pub file: SwConfigFile,
  /// Origin of the options.
  pub source: ConfigSource,
}

impl LoadedConfig {
  /// Whether defaults were used because the file failed to load.
  pub fn used_defaults(&self) -> bool {
    matches!(self.source, ConfigSource::Defaults { .. })
  }
}

impl SwConfigFile {
  /// Load configuration from `path`, relative paths being resolved against `cwd`.
  ///
  /// Failing to read or parse the file is not fatal: defaults are returned and the
  /// reason is kept in the [`ConfigSource`] so the final report can mention it.
  pub fn discover(cwd: &Path, path: &Path) -> LoadedConfig {
    let candidate = cwd.join(path);
    match Self::from_path(&candidate) {
      Ok(file) => LoadedConfig {
        file,
        source: ConfigSource::File(candidate),
      },
      Err(err) => {
        tracing::warn!(
          "no usable configuration at {}, using defaults: {}",
          candidate.display(),
          err
        );
        LoadedConfig {
          file: Self::default(),
          source: ConfigSource::Defaults {
            attempted: candidate,
            reason: err.to_string(),
          },
        }
      }
    }
  }

  /// Read configuration from a specific JSON or YAML file.
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let is_yaml = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
      serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
      })
    } else {
      serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
      })
    }
  }
}

/// Resolved options for a single run. Built once and passed by reference everywhere.
pub struct CacheConfig {
  output_dir: PathBuf,
  html_whitelist: Vec<String>,
  name: String,
  version: String,
  exclude: Option<Regex>,
  cache_flag: Option<String>,
  min_size: u64,
  max_size: u64,
  effective_time_ms: u64,
  filter: Option<Box<dyn CacheFilter>>,
  offline: bool,
  minify: bool,
}

impl fmt::Debug for CacheConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheConfig")
      .field("output_dir", &self.output_dir)
      .field("html_whitelist", &self.html_whitelist)
      .field("name", &self.name)
      .field("version", &self.version)
      .field("exclude", &self.exclude.as_ref().map(Regex::as_str))
      .field("cache_flag", &self.cache_flag)
      .field("size", &(self.min_size, self.max_size))
      .field("effective_time_ms", &self.effective_time_ms)
      .field("filter", &self.filter.is_some())
      .field("offline", &self.offline)
      .field("minify", &self.minify)
      .finish()
  }
}

impl CacheConfig {
  /// Defaults for the given output directory.
  pub fn new(output_dir: impl Into<PathBuf>) -> Self {
    let defaults = SwConfigFile::default();
    Self {
      output_dir: output_dir.into(),
      html_whitelist: Vec::new(),
      name: defaults.name,
      version: defaults.version,
      exclude: None,
      cache_flag: None,
      min_size: 0,
      max_size: DEFAULT_MAX_SIZE,
      effective_time_ms: DEFAULT_EFFECTIVE_TIME_MS as u64,
      filter: None,
      offline: defaults.offline,
      minify: defaults.compress,
    }
  }

  /// Resolve file options and command-line overrides against the working directory.
  pub fn resolve(
    file: &SwConfigFile,
    overrides: &ArgOverrides,
    cwd: &Path,
  ) -> Result<Self, ConfigError> {
    let output = overrides
      .output
      .as_deref()
      .and_then(non_empty)
      .or_else(|| non_empty(&file.output))
      .unwrap_or(DEFAULT_OUTPUT);
    let output_dir = std::path::absolute(cwd.join(output)).unwrap_or_else(|_| cwd.join(output));

    let mut config = Self::new(output_dir)
      .with_html_whitelist(file.html.iter().cloned())
      .with_name(non_empty(&file.name).unwrap_or(DEFAULT_NAME))
      .with_version(non_empty(&file.version).unwrap_or(DEFAULT_VERSION))
      .with_cache_flag(&file.cache_flag)
      .with_effective_time(file.time)
      .with_offline(file.offline)
      .with_minify(file.compress);

    if let (Some(min), Some(max)) = (file.size.iter().min(), file.size.iter().max()) {
      config = config.with_size_range(*min, *max);
    }

    if let Some(pattern) = file.excache.as_deref().and_then(non_empty) {
      config = config.with_exclude_pattern(pattern)?;
    }

    Ok(config)
  }

  /// Restrict injection to the listed HTML paths. Entries are slash-normalised.
  pub fn with_html_whitelist(mut self, paths: impl IntoIterator<Item = String>) -> Self {
    self.html_whitelist = paths
      .into_iter()
      .map(|path| {
        normalize_relative(&path)
          .trim_start_matches("./")
          .trim_start_matches('/')
          .to_string()
      })
      .filter(|path| !path.is_empty())
      .collect();
    self
  }

  /// Base name for `<name>.js` and `<name>.hash`.
  pub fn with_name(mut self, name: &str) -> Self {
    self.name = name.to_string();
    self
  }

  /// Declared application version.
  pub fn with_version(mut self, version: &str) -> Self {
    self.version = version.to_string();
    self
  }

  /// Paths matching `pattern` are dropped from the size-gated selection.
  pub fn with_exclude_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
    let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
      pattern: pattern.to_string(),
      source,
    })?;
    self.exclude = Some(regex);
    Ok(self)
  }

  /// Content marker that forces an asset into the cache. Empty disables the override.
  pub fn with_cache_flag(mut self, flag: &str) -> Self {
    self.cache_flag = (!flag.is_empty()).then(|| flag.to_string());
    self
  }

  /// Inclusive size bounds in bytes, accepted in either order.
  pub fn with_size_range(mut self, a: u64, b: u64) -> Self {
    self.min_size = a.min(b);
    self.max_size = a.max(b);
    self
  }

  /// Update-check grace period; negative values clamp to zero.
  pub fn with_effective_time(mut self, millis: i64) -> Self {
    self.effective_time_ms = millis.max(0) as u64;
    self
  }

  /// Hook invoked after the built-in selection rules.
  pub fn with_filter(mut self, filter: impl CacheFilter + 'static) -> Self {
    self.filter = Some(Box::new(filter));
    self
  }

  /// Whether the worker may serve the app fully offline.
  pub fn with_offline(mut self, offline: bool) -> Self {
    self.offline = offline;
    self
  }

  /// Whether rendered scripts are compacted.
  pub fn with_minify(mut self, minify: bool) -> Self {
    self.minify = minify;
    self
  }

  /// Build output directory, scanned and written to.
  pub fn output_dir(&self) -> &Path {
    &self.output_dir
  }

  /// HTML paths eligible for injection; empty means all.
  pub fn html_whitelist(&self) -> &[String] {
    &self.html_whitelist
  }

  /// Base name of the emitted files.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Declared application version.
  pub fn version(&self) -> &str {
    &self.version
  }

  /// Compiled exclusion pattern, if any.
  pub fn exclude(&self) -> Option<&Regex> {
    self.exclude.as_ref()
  }

  /// Non-empty content flag, if any.
  pub fn cache_flag(&self) -> Option<&str> {
    self.cache_flag.as_deref()
  }

  /// Inclusive `(min, max)` size range in bytes.
  pub fn size_range(&self) -> (u64, u64) {
    (self.min_size, self.max_size)
  }

  /// Grace period in milliseconds.
  pub fn effective_time_ms(&self) -> u64 {
    self.effective_time_ms
  }

  /// Configured filter hook.
  pub fn filter(&self) -> Option<&dyn CacheFilter> {
    self.filter.as_deref()
  }

  /// Offline capability flag.
  pub fn offline(&self) -> bool {
    self.offline
  }

  /// Minify flag.
  pub fn minify(&self) -> bool {
    self.minify
  }

  /// File name of the worker script.
  pub fn worker_file_name(&self) -> String {
    format!("{}.js", self.name)
  }

  /// File name of the version marker.
  pub fn hash_file_name(&self) -> String {
    format!("{}.hash", self.name)
  }

  /// Absolute location of the worker script.
  pub fn worker_path(&self) -> PathBuf {
    self.output_dir.join(self.worker_file_name())
  }

  /// Absolute location of the version marker.
  pub fn hash_path(&self) -> PathBuf {
    self.output_dir.join(self.hash_file_name())
  }
}

/// Empty strings count as unset, like a missing key.
fn non_empty(value: &str) -> Option<&str> {
  (!value.trim().is_empty()).then_some(value)
}

/// Overrides given on the command line as `key=value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgOverrides {
  /// Replacement for the configured output directory.
  pub output: Option<String>,
  /// Config file to load instead of the default.
  pub conf: Option<String>,
  /// First argument that was not a `key=value` pair.
  pub positional: Option<String>,
}

impl ArgOverrides {
  /// Config path to load: `conf=` wins over the positional argument.
  pub fn config_path(&self) -> PathBuf {
    self
      .conf
      .as_deref()
      .or(self.positional.as_deref())
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
  }
}

fn key_value_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"^([^=]+)=(?:"([^"]*)"|([^ ]*))$"#).expect("invalid key=value regex")
  })
}

/// Split raw `key=value` arguments into a map. Values may be wrapped in double quotes.
pub fn parse_key_values<'a>(args: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
  let mut result = BTreeMap::new();
  for arg in args {
    let Some(caps) = key_value_pattern().captures(arg) else {
      continue;
    };
    let value = caps
      .get(2)
      .or_else(|| caps.get(3))
      .map(|m| m.as_str())
      .unwrap_or_default();
    result.insert(caps[1].to_string(), value.to_string());
  }
  result
}

/// Interpret command-line arguments: `output=` and `conf=` pairs plus an optional config path.
pub fn parse_overrides<'a>(args: impl IntoIterator<Item = &'a str>) -> ArgOverrides {
  let args: Vec<&str> = args.into_iter().collect();
  let mut values = parse_key_values(args.iter().copied());
  let positional = args
    .iter()
    .find(|arg| !key_value_pattern().is_match(arg))
    .map(|arg| arg.to_string());

  for key in values.keys() {
    if key != "output" && key != "conf" {
      tracing::debug!("ignoring unknown override `{}`", key);
    }
  }

  ArgOverrides {
    output: values.remove("output"),
    conf: values.remove("conf"),
    positional,
  }
}
