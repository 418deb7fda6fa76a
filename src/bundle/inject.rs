//! Loader injection into the HTML entry points of the build output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::asset_paths::relative_url;
use crate::bundle::compact::Compactor;
use crate::bundle::template::{LoaderParams, render_loader};
use crate::config::CacheConfig;
use crate::models::{AssetMap, InjectionOutcome, VersionToken};

const HEAD_CLOSE: &str = "</head";

/// Insert `<script>snippet</script>` before the first `</head`. Returns `None` without one.
pub fn insert_before_head_close(html: &str, snippet: &str) -> Option<String> {
  let index = html.find(HEAD_CLOSE)?;
  let mut patched = String::with_capacity(html.len() + snippet.len() + 17);
  patched.push_str(&html[..index]);
  patched.push_str("<script>");
  patched.push_str(snippet);
  patched.push_str("</script>");
  patched.push_str(&html[index..]);
  Some(patched)
}

/// Inject the loader into every eligible HTML asset, writing each one back immediately.
///
/// An empty whitelist makes every `.html` asset eligible. The loader is rendered per page
/// since the paths to the worker and the version marker depend on the page's directory.
pub fn inject_html(
  assets: &mut AssetMap,
  config: &CacheConfig,
  token: &VersionToken,
  compactor: Option<&dyn Compactor>,
) -> Result<Vec<(String, InjectionOutcome)>> {
  let whitelist = config.html_whitelist();
  if !whitelist.is_empty() {
    tracing::info!("HTML files selected for injection: {}", whitelist.join(", "));
  }

  let worker_path = config.worker_path();
  let hash_path = config.hash_path();
  let mut outcomes = Vec::new();

  for (key, asset) in assets.iter_mut() {
    if !asset.is_html() {
      continue;
    }

    if !whitelist.is_empty() && !whitelist.iter().any(|entry| entry == key) {
      tracing::info!("not listed, skipping injection: {}", key);
      outcomes.push((key.clone(), InjectionOutcome::NotListed));
      continue;
    }

    let page_dir = asset.absolute_path.parent().unwrap_or(Path::new(""));
    let worker_relative = relative_url(page_dir, &worker_path);
    let hash_relative = relative_url(page_dir, &hash_path);
    let snippet = render_loader(
      &LoaderParams {
        worker_path: &worker_relative,
        hash_path: &hash_relative,
        token,
      },
      compactor,
    )
    .with_context(|| format!("failed to render loader for {}", key))?;

    let Some(patched) = insert_before_head_close(&asset.content, &snippet) else {
      tracing::info!("no </head> tag, skipping injection: {}", key);
      outcomes.push((key.clone(), InjectionOutcome::MissingHead));
      continue;
    };

    fs::write(&asset.absolute_path, &patched)
      .with_context(|| format!("failed to write {}", asset.absolute_path.display()))?;
    asset.content = patched;
    tracing::info!("injected service worker loader: {}", key);
    outcomes.push((key.clone(), InjectionOutcome::Injected));
  }

  Ok(outcomes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::scan_assets;
  use tempfile::tempdir;

  fn token() -> VersionToken {
    VersionToken::new("11112222".into(), "0.0.1")
  }

  #[test]
  fn inserts_before_first_head_close_only() {
    let html = "<html><head><title>x</title></head><body></head></body></html>";
    let patched = insert_before_head_close(html, "boot()").unwrap();
    assert_eq!(
      patched,
      "<html><head><title>x</title><script>boot()</script></head><body></head></body></html>"
    );
  }

  #[test]
  fn missing_head_close_yields_none() {
    assert!(insert_before_head_close("<html><body></body></html>", "boot()").is_none());
  }

  #[test]
  fn injects_relative_paths_for_nested_pages() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("index.html"), "<head></head>").unwrap();
    fs::write(root.join("docs/page.html"), "<head></head>").unwrap();

    let mut assets = scan_assets(root).assets;
    let config = CacheConfig::new(root).with_minify(false);
    let outcomes = inject_html(&mut assets, &config, &token(), None).unwrap();

    assert_eq!(outcomes, vec![
      ("docs/page.html".to_string(), InjectionOutcome::Injected),
      ("index.html".to_string(), InjectionOutcome::Injected),
    ]);

    let nested = fs::read_to_string(root.join("docs/page.html")).unwrap();
    assert!(nested.contains("var workerPath = '../sw.js';"));
    assert!(nested.contains("var hashPath = '../sw.hash';"));
    assert!(nested.contains("'11112222_0.0.1'"));

    let top = fs::read_to_string(root.join("index.html")).unwrap();
    assert!(top.contains("var workerPath = 'sw.js';"));
    assert!(top.ends_with("</script></head>"));
    assert_eq!(assets["index.html"].content, top);
  }

  #[test]
  fn whitelist_limits_injection() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("index.html"), "<head></head>").unwrap();
    fs::write(root.join("other.html"), "<head></head>").unwrap();

    let mut assets = scan_assets(root).assets;
    let config = CacheConfig::new(root).with_html_whitelist(vec!["index.html".to_string()]);
    let outcomes = inject_html(&mut assets, &config, &token(), None).unwrap();

    assert_eq!(outcomes, vec![
      ("index.html".to_string(), InjectionOutcome::Injected),
      ("other.html".to_string(), InjectionOutcome::NotListed),
    ]);
    assert_eq!(fs::read_to_string(root.join("other.html")).unwrap(), "<head></head>");
  }

  #[test]
  fn page_without_head_is_left_untouched() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("bare.html"), "<p>hi</p>").unwrap();

    let mut assets = scan_assets(root).assets;
    let config = CacheConfig::new(root);
    let outcomes = inject_html(&mut assets, &config, &token(), None).unwrap();

    assert_eq!(outcomes, vec![("bare.html".to_string(), InjectionOutcome::MissingHead)]);
    assert_eq!(fs::read_to_string(root.join("bare.html")).unwrap(), "<p>hi</p>");
  }
}
