//! Rules deciding which scanned assets are cached for offline use.

use crate::config::CacheConfig;
use crate::models::{Asset, AssetMap, CacheManifest};

/// User-supplied hook run after the built-in selection rules.
///
/// The hook receives the current candidates and an [`AssetEditor`]. Returning `Some`
/// replaces the candidate list; returning `None` keeps it. Content changes made through
/// the editor are written back to disk after the run, not by the selection itself.
pub trait CacheFilter {
  /// Inspect or replace the candidate list.
  fn filter(&self, candidates: &[String], assets: &mut AssetEditor<'_>) -> Option<Vec<String>>;
}

impl<F> CacheFilter for F
where
  F: Fn(&[String], &mut AssetEditor<'_>) -> Option<Vec<String>>,
{
  fn filter(&self, candidates: &[String], assets: &mut AssetEditor<'_>) -> Option<Vec<String>> {
    self(candidates, assets)
  }
}

/// Pin a closure to the [`CacheFilter`] signature so its argument types are inferred.
pub fn cache_filter<F>(filter: F) -> F
where
  F: Fn(&[String], &mut AssetEditor<'_>) -> Option<Vec<String>>,
{
  filter
}

/// Read access to the scanned assets plus an explicit way to rewrite one of them.
pub struct AssetEditor<'a> {
  assets: &'a mut AssetMap,
}

impl<'a> AssetEditor<'a> {
  pub(crate) fn new(assets: &'a mut AssetMap) -> Self {
    Self { assets }
  }

  /// Look up an asset by relative path.
  pub fn get(&self, path: &str) -> Option<&Asset> {
    self.assets.get(path)
  }

  /// All assets in scan order.
  pub fn iter(&self) -> impl Iterator<Item = &Asset> {
    self.assets.values()
  }

  /// Replace an asset's content and flag it for rewriting. Returns `false` for unknown paths.
  pub fn replace_content(&mut self, path: &str, content: impl Into<String>) -> bool {
    match self.assets.get_mut(path) {
      Some(asset) => {
        asset.content = content.into();
        asset.modified = true;
        true
      }
      None => false,
    }
  }
}

/// Compute the ordered list of assets to cache.
///
/// For each asset, in scan order: it is a candidate when its size lies within the
/// inclusive range and it does not match the exclusion pattern; independently, content
/// containing the cache flag forces it in. The filter hook then runs once.
pub fn select_cache_files(assets: &mut AssetMap, config: &CacheConfig) -> CacheManifest {
  let (min, max) = config.size_range();
  let mut manifest = CacheManifest::default();

  for (key, asset) in assets.iter() {
    let within_size = asset.size >= min && asset.size <= max;
    let excluded = config.exclude().is_some_and(|pattern| pattern.is_match(key));
    if within_size && !excluded {
      manifest.push(key.clone());
    }

    let flagged = config
      .cache_flag()
      .is_some_and(|flag| asset.content.contains(flag));
    if flagged && manifest.push(key.clone()) {
      tracing::debug!("{} forced into cache by content flag", key);
    }
  }

  let Some(filter) = config.filter() else {
    return manifest;
  };

  let candidates = manifest.files().to_vec();
  let mut editor = AssetEditor::new(assets);
  match filter.filter(&candidates, &mut editor) {
    Some(replacement) => CacheManifest::from_paths(replacement),
    None => manifest,
  }
}
