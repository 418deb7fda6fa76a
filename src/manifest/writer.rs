//! Writes the rendered worker script, the version marker and filter-modified assets.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::CacheConfig;
use crate::models::{AssetMap, VersionToken};

/// Locations written by [`write_outputs`].
#[derive(Debug, Clone)]
pub struct WrittenOutputs {
  /// `<output>/<name>.js`.
  pub worker_path: PathBuf,
  /// `<output>/<name>.hash`.
  pub hash_path: PathBuf,
  /// Relative paths of assets written back because they were flagged `modified`.
  pub rewritten: Vec<String>,
}

/// Write all outputs of a run. Each file is overwritten in full.
pub fn write_outputs(
  config: &CacheConfig,
  worker_script: &str,
  token: &VersionToken,
  assets: &AssetMap,
) -> Result<WrittenOutputs> {
  let output_dir = config.output_dir();
  fs::create_dir_all(output_dir)
    .with_context(|| format!("failed to create {}", output_dir.display()))?;

  let worker_path = config.worker_path();
  fs::write(&worker_path, worker_script)
    .with_context(|| format!("failed to write {}", worker_path.display()))?;

  let hash_path = config.hash_path();
  fs::write(&hash_path, token.to_string())
    .with_context(|| format!("failed to write {}", hash_path.display()))?;

  let rewritten = write_modified_assets(assets)?;

  Ok(WrittenOutputs {
    worker_path,
    hash_path,
    rewritten,
  })
}

/// Write every asset flagged `modified` back to its absolute path.
pub fn write_modified_assets(assets: &AssetMap) -> Result<Vec<String>> {
  let mut rewritten = Vec::new();
  for asset in assets.values().filter(|asset| asset.modified) {
    fs::write(&asset.absolute_path, &asset.content)
      .with_context(|| format!("failed to write {}", asset.absolute_path.display()))?;
    tracing::debug!("rewrote {}", asset.relative_path);
    rewritten.push(asset.relative_path.clone());
  }
  Ok(rewritten)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Asset;
  use tempfile::tempdir;

  fn asset(root: &std::path::Path, key: &str, content: &str, modified: bool) -> Asset {
    Asset {
      relative_path: key.into(),
      absolute_path: root.join(key),
      content: content.into(),
      size: content.len() as u64,
      modified,
    }
  }

  #[test]
  fn writes_worker_and_hash_files() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("dist");
    let config = CacheConfig::new(&out).with_name("offline");
    let token = VersionToken::new("01234567".into(), "1.2.3");

    let written = write_outputs(&config, "self.x=1;", &token, &AssetMap::new()).unwrap();

    assert_eq!(written.worker_path, out.join("offline.js"));
    assert_eq!(fs::read_to_string(out.join("offline.js")).unwrap(), "self.x=1;");
    assert_eq!(fs::read_to_string(out.join("offline.hash")).unwrap(), "01234567_1.2.3");
    assert!(written.rewritten.is_empty());
  }

  #[test]
  fn rewrites_only_modified_assets() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.js"), "original a").unwrap();
    fs::write(root.join("b.js"), "original b").unwrap();

    let mut assets = AssetMap::new();
    assets.insert("a.js".into(), asset(root, "a.js", "changed a", true));
    assets.insert("b.js".into(), asset(root, "b.js", "changed b", false));

    let rewritten = write_modified_assets(&assets).unwrap();
    assert_eq!(rewritten, vec!["a.js".to_string()]);
    assert_eq!(fs::read_to_string(root.join("a.js")).unwrap(), "changed a");
    assert_eq!(fs::read_to_string(root.join("b.js")).unwrap(), "original b");
  }
}
