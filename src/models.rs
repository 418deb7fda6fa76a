//! Data structures produced while preparing the offline cache manifest.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

/// Files larger than this are tracked by size only; their content is never read.
pub const MAX_CONTENT_BYTES: u64 = 100 * 1024 * 1024;

/// One file discovered under the build output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
  /// Root-relative path using forward slashes. Unique within an [`AssetMap`].
  pub relative_path: String,
  /// Location on disk, only used for I/O.
  pub absolute_path: PathBuf,
  /// Text content, empty when the file exceeds [`MAX_CONTENT_BYTES`].
  pub content: String,
  /// Byte length of the file as found during the scan.
  pub size: u64,
  /// Set once the content has been rewritten by a filter hook and must be written back.
  pub modified: bool,
}

impl Asset {
  /// Whether the asset is an HTML entry point eligible for loader injection.
  pub fn is_html(&self) -> bool {
    self.relative_path.ends_with(".html")
  }
}

/// Assets keyed by relative path, iterated in scan order.
pub type AssetMap = IndexMap<String, Asset>;

/// Ordered, duplicate-free list of relative paths selected for offline caching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CacheManifest {
  files: Vec<String>,
}

impl CacheManifest {
  /// Build a manifest from candidate paths, keeping the first occurrence of each path.
  pub fn from_paths(paths: impl IntoIterator<Item = String>) -> Self {
    let mut manifest = Self::default();
    for path in paths {
      manifest.push(path);
    }
    manifest
  }

  /// Append a path unless it is already present. Returns `true` when it was added.
  pub fn push(&mut self, path: String) -> bool {
    if self.contains(&path) {
      return false;
    }
    self.files.push(path);
    true
  }

  /// Whether the path is part of the manifest.
  pub fn contains(&self, path: &str) -> bool {
    self.files.iter().any(|candidate| candidate == path)
  }

  /// Paths in selection order.
  pub fn files(&self) -> &[String] {
    &self.files
  }

  /// Number of selected paths.
  pub fn len(&self) -> usize {
    self.files.len()
  }

  /// Whether nothing was selected.
  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  /// JSON array literal embedded into the worker script.
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(&self.files)
  }

  /// Consume the manifest, returning the ordered paths.
  pub fn into_files(self) -> Vec<String> {
    self.files
  }
}

/// Cache generation token: an 8 digit random fragment joined to the declared version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken {
  fragment: String,
  version: String,
}

impl VersionToken {
  pub(crate) fn new(fragment: String, version: impl Into<String>) -> Self {
    Self {
      fragment,
      version: version.into(),
    }
  }

  /// The random numeric prefix.
  pub fn fragment(&self) -> &str {
    &self.fragment
  }

  /// The declared application version, verbatim.
  pub fn version(&self) -> &str {
    &self.version
  }
}

impl fmt::Display for VersionToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}", self.fragment, self.version)
  }
}

/// What happened to a single HTML asset during injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
  /// The loader was inserted and the file rewritten.
  Injected,
  /// The file is not on the configured whitelist.
  NotListed,
  /// The file has no `</head` tag so nothing was inserted.
  MissingHead,
}

/// Summary of a completed run, rendered for the console by its `Display` impl.
#[derive(Debug, Clone)]
pub struct BuildReport {
  /// HTML assets and what happened to each, in scan order.
  pub html: Vec<(String, InjectionOutcome)>,
  /// Whitelist configured for the run (empty when every HTML file is eligible).
  pub whitelist: Vec<String>,
  /// Paths selected for offline caching.
  pub manifest: CacheManifest,
  /// Token written to the version marker file.
  pub token: VersionToken,
  /// Written worker script.
  pub worker_path: PathBuf,
  /// Written version marker.
  pub hash_path: PathBuf,
  /// Assets rewritten because a filter hook modified them.
  pub rewritten: Vec<String>,
  /// Directory traversal failures that were skipped.
  pub scan_failures: usize,
  /// Whether the configuration file could not be loaded and defaults were used.
  pub used_defaults: bool,
}

impl BuildReport {
  /// HTML files that received the loader snippet.
  pub fn injected(&self) -> impl Iterator<Item = &str> {
    self.files_with(InjectionOutcome::Injected)
  }

  /// HTML files skipped because they were not whitelisted.
  pub fn not_listed(&self) -> impl Iterator<Item = &str> {
    self.files_with(InjectionOutcome::NotListed)
  }

  /// HTML files skipped because they had no closing head tag.
  pub fn missing_head(&self) -> impl Iterator<Item = &str> {
    self.files_with(InjectionOutcome::MissingHead)
  }

  fn files_with(&self, outcome: InjectionOutcome) -> impl Iterator<Item = &str> {
    self
      .html
      .iter()
      .filter(move |(_, result)| *result == outcome)
      .map(|(path, _)| path.as_str())
  }
}

impl fmt::Display for BuildReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let injected: Vec<&str> = self.injected().collect();
    if injected.is_empty() {
      if self.html.is_empty() {
        writeln!(f, "Service worker not injected: no HTML files found")?;
      } else if self.whitelist.is_empty() || self.missing_head().next().is_some() {
        writeln!(f, "Service worker not injected: no HTML file has a </head> tag")?;
      } else {
        writeln!(
          f,
          "Service worker not injected: none of the listed files matched ({})",
          self.whitelist.join(", ")
        )?;
      }
    } else {
      writeln!(f, "Service worker injected: {}", injected.join("    "))?;
      writeln!(f, "{}", file_name(&self.worker_path))?;
      writeln!(f, "{}", file_name(&self.hash_path))?;
      writeln!(f, "{}", self.token.version())?;
    }

    let not_listed: Vec<&str> = self.not_listed().collect();
    if !not_listed.is_empty() {
      writeln!(f, "Not listed, skipped: {}", not_listed.join(", "))?;
    }
    let missing: Vec<&str> = self.missing_head().collect();
    if !missing.is_empty() {
      writeln!(f, "No </head> tag, skipped: {}", missing.join(", "))?;
    }
    writeln!(f, "Cached files: {}", self.manifest.len())?;
    if !self.rewritten.is_empty() {
      writeln!(f, "Rewritten by filter: {}", self.rewritten.join(", "))?;
    }
    if self.scan_failures > 0 {
      writeln!(f, "Unreadable entries skipped: {}", self.scan_failures)?;
    }
    if self.used_defaults {
      writeln!(
        f,
        "No configuration file found or it failed to load; default configuration was used"
      )?;
    }
    Ok(())
  }
}

fn file_name(path: &std::path::Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string())
}
