//! Directory scanning that turns the build output into an in-memory [`AssetMap`].

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::asset_paths::relative_key;
use crate::models::{Asset, AssetMap, MAX_CONTENT_BYTES};

/// A directory entry that could not be read. The scan skips it and continues.
#[derive(Debug, Clone)]
pub struct ScanFailure {
  /// Path involved in the failure, when known.
  pub path: Option<PathBuf>,
  /// Human readable cause.
  pub message: String,
}

/// Assets found under the root plus the entries that had to be skipped.
#[derive(Debug, Default)]
pub struct ScanResult {
  /// Discovered files keyed by slash-normalised relative path, in traversal order.
  pub assets: AssetMap,
  /// Contained traversal failures.
  pub failures: Vec<ScanFailure>,
}

/// Walk `root` recursively and record every regular file.
///
/// Entries are visited in file-name order so the resulting map order is stable. Symlinks
/// are followed; a link that loops back to one of its ancestors is recorded as a failure
/// and not descended into. Errors never abort the scan, including a missing root, which
/// yields an empty map with a single failure.
pub fn scan_assets(root: &Path) -> ScanResult {
  let mut result = ScanResult::default();

  let walker = WalkDir::new(root)
    .follow_links(true)
    .sort_by_file_name()
    .into_iter();

  for entry in walker {
    let entry = match entry {
      Ok(entry) => entry,
      Err(err) => {
        record_failure(&mut result, err.path().map(Path::to_path_buf), err.to_string());
        continue;
      }
    };

    if !entry.file_type().is_file() {
      continue;
    }

    let Some(key) = relative_key(root, entry.path()) else {
      continue;
    };

    let size = match entry.metadata() {
      Ok(metadata) => metadata.len(),
      Err(err) => {
        record_failure(&mut result, Some(entry.path().to_path_buf()), err.to_string());
        continue;
      }
    };

    let content = if size <= MAX_CONTENT_BYTES {
      match fs::read(entry.path()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
          record_failure(&mut result, Some(entry.path().to_path_buf()), err.to_string());
          continue;
        }
      }
    } else {
      tracing::debug!("{} exceeds the content ceiling, tracking size only", key);
      String::new()
    };

    tracing::debug!("scanned {} ({} bytes)", key, size);
    result.assets.insert(key.clone(), Asset {
      relative_path: key,
      absolute_path: entry.path().to_path_buf(),
      content,
      size,
      modified: false,
    });
  }

  result
}

fn record_failure(result: &mut ScanResult, path: Option<PathBuf>, message: String) {
  match &path {
    Some(path) => tracing::warn!("skipping {}: {}", path.display(), message),
    None => tracing::warn!("skipping unreadable entry: {}", message),
  }
  result.failures.push(ScanFailure { path, message });
}
