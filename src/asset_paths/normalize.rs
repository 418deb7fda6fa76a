use std::path::Path;

/// Convert native separators to forward slashes.
pub fn normalize_relative(path: &str) -> String {
  path.replace('\\', "/")
}

/// Key for `path` relative to `root`, or `None` when `path` is not below `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
  let relative = path.strip_prefix(root).ok()?;
  if relative.as_os_str().is_empty() {
    return None;
  }
  Some(normalize_relative(&relative.to_string_lossy()))
}
