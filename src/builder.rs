//! Service worker build orchestrator: scan, select, inject, render and write.

use anyhow::{Context, Result};

use crate::bundle::compact::{Compactor, ScriptCompactor};
use crate::bundle::inject::inject_html;
use crate::bundle::template::{WorkerParams, render_worker};
use crate::config::CacheConfig;
use crate::manifest::{compute_version_token, scan_assets, write_outputs};
use crate::models::{BuildReport, VersionToken};
use crate::selection::select_cache_files;

/// Runs the whole pipeline for one resolved configuration.
pub struct ServiceWorkerBuilder<'a> {
  config: &'a CacheConfig,
  compactor: Box<dyn Compactor>,
  used_defaults: bool,
  token: Option<VersionToken>,
}

impl<'a> ServiceWorkerBuilder<'a> {
  /// Create a builder using the built-in [`ScriptCompactor`].
  pub fn new(config: &'a CacheConfig) -> Self {
    Self {
      config,
      compactor: Box::new(ScriptCompactor),
      used_defaults: false,
      token: None,
    }
  }

  /// Replace the compactor used when minification is enabled.
  pub fn with_compactor(mut self, compactor: impl Compactor + 'static) -> Self {
    self.compactor = Box::new(compactor);
    self
  }

  /// Record that the configuration file failed to load, for the final report.
  pub fn used_defaults(mut self, used_defaults: bool) -> Self {
    self.used_defaults = used_defaults;
    self
  }

  /// Use a fixed token instead of generating a fresh one.
  pub fn with_token(mut self, token: VersionToken) -> Self {
    self.token = Some(token);
    self
  }

  /// Generate the worker, inject the loader and write every output.
  pub fn build(self) -> Result<BuildReport> {
    let config = self.config;
    let compactor = config.minify().then_some(self.compactor.as_ref());

    let scan = scan_assets(config.output_dir());
    let mut assets = scan.assets;
    tracing::info!(
      "scanned {} files under {}",
      assets.len(),
      config.output_dir().display()
    );

    let token = self
      .token
      .unwrap_or_else(|| compute_version_token(config.version()));

    let manifest = select_cache_files(&mut assets, config);
    tracing::info!("{} files selected for offline caching", manifest.len());

    let html = inject_html(&mut assets, config, &token, compactor)?;

    let worker_name = config.worker_file_name();
    let hash_name = config.hash_file_name();
    let worker_script = render_worker(
      &WorkerParams {
        token: &token,
        manifest: &manifest,
        worker_name: &worker_name,
        hash_name: &hash_name,
        effective_time_ms: config.effective_time_ms(),
        offline: config.offline(),
      },
      compactor,
    )
    .with_context(|| format!("failed to render {}", worker_name))?;

    let written = write_outputs(config, &worker_script, &token, &assets)?;

    Ok(BuildReport {
      html,
      whitelist: config.html_whitelist().to_vec(),
      manifest,
      token,
      worker_path: written.worker_path,
      hash_path: written.hash_path,
      rewritten: written.rewritten,
      scan_failures: scan.failures.len(),
      used_defaults: self.used_defaults,
    })
  }
}
