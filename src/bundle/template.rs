//! Placeholder substitution for the loader shim and worker script templates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::bundle::compact::{CompactError, Compactor};
use crate::models::{CacheManifest, VersionToken};

/// Snippet injected into HTML entry points to register the worker.
pub const LOADER_TEMPLATE: &str = include_str!("../../templates/sw_link.js");

/// Worker script written next to the assets.
pub const WORKER_TEMPLATE: &str = include_str!("../../templates/sw.js");

/// Every placeholder a template may contain, written as `@@NAME@@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
  /// Cache generation token.
  CacheHash,
  /// Path from the HTML page to the worker script.
  JsPath,
  /// Path to the version marker file.
  HashFilePath,
  /// File name of the worker script.
  JsName,
  /// JSON array of cached paths.
  CacheFiles,
  /// Update-check grace period in milliseconds.
  EffectiveTime,
  /// Offline capability flag.
  Offline,
}

impl Placeholder {
  /// All placeholders.
  pub const ALL: [Placeholder; 7] = [
    Placeholder::CacheHash,
    Placeholder::JsPath,
    Placeholder::HashFilePath,
    Placeholder::JsName,
    Placeholder::CacheFiles,
    Placeholder::EffectiveTime,
    Placeholder::Offline,
  ];

  /// Name between the `@@` markers.
  pub fn name(self) -> &'static str {
    match self {
      Placeholder::CacheHash => "SW_CACHE_HASH",
      Placeholder::JsPath => "SW_JS_PATH",
      Placeholder::HashFilePath => "SW_HASH_FILE_PATH",
      Placeholder::JsName => "SW_JS_NAME",
      Placeholder::CacheFiles => "SW_CACHE_FILES",
      Placeholder::EffectiveTime => "SW_EFFECTIVE_TIME",
      Placeholder::Offline => "SW_OFFLINE",
    }
  }

  /// Placeholder with the given name.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|placeholder| placeholder.name() == name)
  }

  /// Value placeholders are written quoted in templates and the quotes are replaced too.
  pub fn is_value(self) -> bool {
    matches!(
      self,
      Placeholder::CacheFiles | Placeholder::EffectiveTime | Placeholder::Offline
    )
  }

  /// Token as written in a template.
  pub fn token(self) -> String {
    format!("@@{}@@", self.name())
  }
}

/// Rendering failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
  /// The template contains a `@@NAME@@` token outside the known set.
  #[error("unknown placeholder `@@{0}@@`")]
  UnknownPlaceholder(String),
  /// The template uses a placeholder no value was supplied for.
  #[error("no value supplied for `@@{}@@`", .0.name())]
  MissingValue(Placeholder),
}

/// Rendering or compaction failure for a script.
#[derive(Debug, Error)]
pub enum RenderError {
  /// Placeholder substitution failed.
  #[error(transparent)]
  Template(#[from] TemplateError),
  /// The compactor rejected the rendered script.
  #[error("failed to compact rendered script: {0}")]
  Compact(#[from] CompactError),
  /// The cache list could not be serialised.
  #[error("failed to serialise cache list: {0}")]
  Json(#[from] serde_json::Error),
}

/// Replacement text keyed by placeholder.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
  values: BTreeMap<Placeholder, String>,
}

impl Substitutions {
  /// Empty substitution set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the replacement for a placeholder.
  pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
    self.values.insert(placeholder, value.into());
    self
  }

  /// Replacement for a placeholder.
  pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
    self.values.get(&placeholder).map(String::as_str)
  }
}

fn token_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"@@([A-Z][A-Z0-9_]*)@@").expect("invalid placeholder regex"))
}

/// Placeholders referenced by a template.
pub fn placeholders_in(template: &str) -> Result<BTreeSet<Placeholder>, TemplateError> {
  token_pattern()
    .captures_iter(template)
    .map(|caps| {
      Placeholder::from_name(&caps[1])
        .ok_or_else(|| TemplateError::UnknownPlaceholder(caps[1].to_string()))
    })
    .collect()
}

/// Replace every placeholder occurrence in a single left-to-right pass.
///
/// Substituted text is never scanned again, so values may contain `@@` sequences. A
/// value placeholder wrapped in single quotes has the quotes replaced along with it.
pub fn render(template: &str, substitutions: &Substitutions) -> Result<String, TemplateError> {
  let mut out = String::with_capacity(template.len());
  let mut last = 0;

  for caps in token_pattern().captures_iter(template) {
    let Some(whole) = caps.get(0) else {
      continue;
    };
    let name = &caps[1];
    let placeholder = Placeholder::from_name(name)
      .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
    let value = substitutions
      .get(placeholder)
      .ok_or(TemplateError::MissingValue(placeholder))?;

    let (mut start, mut end) = (whole.start(), whole.end());
    if placeholder.is_value()
      && start > last
      && template[..start].ends_with('\'')
      && template[end..].starts_with('\'')
    {
      start -= 1;
      end += 1;
    }

    out.push_str(&template[last..start]);
    out.push_str(value);
    last = end;
  }

  out.push_str(&template[last..]);
  Ok(out)
}

/// Escape text for use inside a single-quoted script string.
pub fn escape_script_string(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for c in value.chars() {
    match c {
      '\\' => escaped.push_str("\\\\"),
      '\'' => escaped.push_str("\\'"),
      '\n' => escaped.push_str("\\n"),
      '\r' => escaped.push_str("\\r"),
      '<' => escaped.push_str("\\x3c"),
      _ => escaped.push(c),
    }
  }
  escaped
}

/// Values for the loader shim injected into one HTML page.
#[derive(Debug, Clone)]
pub struct LoaderParams<'a> {
  /// Path from the page's directory to the worker script.
  pub worker_path: &'a str,
  /// Path from the page's directory to the version marker.
  pub hash_path: &'a str,
  /// Current cache generation token.
  pub token: &'a VersionToken,
}

/// Values for the worker script.
#[derive(Debug, Clone)]
pub struct WorkerParams<'a> {
  /// Current cache generation token.
  pub token: &'a VersionToken,
  /// Paths to pre-cache.
  pub manifest: &'a CacheManifest,
  /// Worker file name.
  pub worker_name: &'a str,
  /// Version marker file name.
  pub hash_name: &'a str,
  /// Update-check grace period.
  pub effective_time_ms: u64,
  /// Offline capability flag.
  pub offline: bool,
}

/// Render the loader shim, compacting it when a compactor is given.
pub fn render_loader(
  params: &LoaderParams<'_>,
  compactor: Option<&dyn Compactor>,
) -> Result<String, RenderError> {
  let substitutions = Substitutions::new()
    .with(Placeholder::JsPath, escape_script_string(params.worker_path))
    .with(Placeholder::HashFilePath, escape_script_string(params.hash_path))
    .with(Placeholder::CacheHash, escape_script_string(&params.token.to_string()));
  finish(render(LOADER_TEMPLATE, &substitutions)?, compactor)
}

/// Render the worker script, compacting it when a compactor is given.
pub fn render_worker(
  params: &WorkerParams<'_>,
  compactor: Option<&dyn Compactor>,
) -> Result<String, RenderError> {
  let substitutions = Substitutions::new()
    .with(Placeholder::CacheHash, escape_script_string(&params.token.to_string()))
    .with(Placeholder::CacheFiles, params.manifest.to_json()?.replace('<', "\\u003c"))
    .with(Placeholder::JsName, escape_script_string(params.worker_name))
    .with(Placeholder::HashFilePath, escape_script_string(params.hash_name))
    .with(Placeholder::EffectiveTime, params.effective_time_ms.to_string())
    .with(Placeholder::Offline, params.offline.to_string());
  finish(render(WORKER_TEMPLATE, &substitutions)?, compactor)
}

fn finish(rendered: String, compactor: Option<&dyn Compactor>) -> Result<String, RenderError> {
  match compactor {
    Some(compactor) => Ok(compactor.compact(&rendered)?),
    None => Ok(rendered),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bundle::compact::ScriptCompactor;
  use proptest::prelude::*;

  fn token() -> VersionToken {
    VersionToken::new("87654321".into(), "1.4.0")
  }

  struct FailingCompactor;

  impl Compactor for FailingCompactor {
    fn compact(&self, _source: &str) -> Result<String, CompactError> {
      Err(CompactError::UnterminatedComment(0))
    }
  }

  #[test]
  fn bundled_templates_use_known_placeholders() {
    let loader = placeholders_in(LOADER_TEMPLATE).unwrap();
    assert_eq!(
      loader,
      BTreeSet::from([Placeholder::CacheHash, Placeholder::JsPath, Placeholder::HashFilePath])
    );

    let worker = placeholders_in(WORKER_TEMPLATE).unwrap();
    assert_eq!(
      worker,
      BTreeSet::from([
        Placeholder::CacheHash,
        Placeholder::HashFilePath,
        Placeholder::JsName,
        Placeholder::CacheFiles,
        Placeholder::EffectiveTime,
        Placeholder::Offline,
      ])
    );
  }

  #[test]
  fn replaces_every_occurrence() {
    let subs = Substitutions::new().with(Placeholder::JsName, "sw.js");
    let rendered = render("a=@@SW_JS_NAME@@;b=@@SW_JS_NAME@@", &subs).unwrap();
    assert_eq!(rendered, "a=sw.js;b=sw.js");
  }

  #[test]
  fn value_placeholders_consume_quotes() {
    let subs = Substitutions::new()
      .with(Placeholder::CacheFiles, r#"["a.js"]"#)
      .with(Placeholder::JsName, "sw.js");
    let rendered = render("f='@@SW_CACHE_FILES@@';n='@@SW_JS_NAME@@';", &subs).unwrap();
    assert_eq!(rendered, r#"f=["a.js"];n='sw.js';"#);
  }

  #[test]
  fn adjacent_value_placeholders_do_not_share_quotes() {
    let subs = Substitutions::new()
      .with(Placeholder::Offline, "true")
      .with(Placeholder::EffectiveTime, "5");
    let rendered = render("'@@SW_OFFLINE@@''@@SW_EFFECTIVE_TIME@@'", &subs).unwrap();
    assert_eq!(rendered, "true5");
  }

  #[test]
  fn missing_and_unknown_placeholders_fail() {
    assert_eq!(
      render("@@SW_JS_NAME@@", &Substitutions::new()),
      Err(TemplateError::MissingValue(Placeholder::JsName))
    );
    assert_eq!(
      render("@@SW_NOPE@@", &Substitutions::new()),
      Err(TemplateError::UnknownPlaceholder("SW_NOPE".into()))
    );
  }

  #[test]
  fn worker_embeds_cache_list_and_flags() {
    let manifest = CacheManifest::from_paths(vec!["index.html".to_string(), "app.js".to_string()]);
    let token = token();
    let rendered = render_worker(
      &WorkerParams {
        token: &token,
        manifest: &manifest,
        worker_name: "sw.js",
        hash_name: "sw.hash",
        effective_time_ms: 60_000,
        offline: false,
      },
      None,
    )
    .unwrap();

    assert!(rendered.contains(r#"var CACHE_FILES = ["index.html","app.js"];"#));
    assert!(rendered.contains("var CACHE_NAME = '87654321_1.4.0';"));
    assert!(rendered.contains("var WORKER_NAME = 'sw.js';"));
    assert!(rendered.contains("var HASH_FILE = 'sw.hash';"));
    assert!(rendered.contains("var EFFECTIVE_TIME = 60000;"));
    assert!(rendered.contains("var OFFLINE = false;"));
    assert!(!rendered.contains("@@"));
  }

  #[test]
  fn loader_is_compacted_when_requested() {
    let token = token();
    let params = LoaderParams {
      worker_path: "../sw.js",
      hash_path: "../sw.hash",
      token: &token,
    };
    let plain = render_loader(&params, None).unwrap();
    let compact = render_loader(&params, Some(&ScriptCompactor)).unwrap();

    assert!(compact.len() < plain.len());
    assert!(compact.contains("'../sw.js'"));
    assert!(compact.contains("'../sw.hash'"));
    assert!(compact.contains("'87654321_1.4.0'"));
    assert!(!compact.contains("/*"));
  }

  #[test]
  fn compaction_failure_is_not_swallowed() {
    let token = token();
    let params = LoaderParams {
      worker_path: "sw.js",
      hash_path: "sw.hash",
      token: &token,
    };
    let err = render_loader(&params, Some(&FailingCompactor)).unwrap_err();
    assert!(matches!(err, RenderError::Compact(_)));
  }

  #[test]
  fn escapes_quotes_in_paths() {
    assert_eq!(escape_script_string(r"it's\here"), r"it\'s\\here");
    assert_eq!(escape_script_string("</script>"), "\\x3c/script>");
  }

  proptest! {
    #[test]
    fn no_placeholder_survives_rendering(
      name in "[a-z0-9._-]{1,16}",
      version in "[a-zA-Z0-9.+-]{0,12}",
      files in proptest::collection::vec("[a-z0-9/._-]{1,20}", 0..6),
      time in any::<u64>(),
      offline in any::<bool>(),
    ) {
      let token = VersionToken::new("00000001".into(), version);
      let manifest = CacheManifest::from_paths(files);
      let worker_name = format!("{name}.js");
      let hash_name = format!("{name}.hash");
      let rendered = render_worker(
        &WorkerParams {
          token: &token,
          manifest: &manifest,
          worker_name: &worker_name,
          hash_name: &hash_name,
          effective_time_ms: time,
          offline,
        },
        None,
      )
      .unwrap();
      prop_assert!(!rendered.contains("@@"));
    }

    #[test]
    fn substituted_text_is_not_rescanned(prefix in "[a-z ]{0,8}", suffix in "[a-z ]{0,8}") {
      let nested = format!("{prefix}@@SW_JS_NAME@@{suffix}");
      let subs = Substitutions::new()
        .with(Placeholder::JsPath, nested.clone())
        .with(Placeholder::JsName, "worker.js");
      let rendered = render("['@@SW_JS_PATH@@', '@@SW_JS_NAME@@']", &subs).unwrap();
      prop_assert_eq!(rendered, format!("['{nested}', 'worker.js']"));
    }
  }
}
