use std::path::{Component, Path};

/// Forward-slash path leading from the directory `from_dir` to `target`.
///
/// Both paths are expected to be absolute. The computation is purely lexical, so `..`
/// segments are emitted for every directory of `from_dir` below the common ancestor.
pub fn relative_url(from_dir: &Path, target: &Path) -> String {
  let from: Vec<Component> = from_dir.components().filter(is_significant).collect();
  let to: Vec<Component> = target.components().filter(is_significant).collect();

  let common = from
    .iter()
    .zip(to.iter())
    .take_while(|(a, b)| a == b)
    .count();

  let mut segments: Vec<String> = Vec::new();
  segments.extend(std::iter::repeat_n("..".to_string(), from.len() - common));
  segments.extend(
    to[common..]
      .iter()
      .map(|component| component.as_os_str().to_string_lossy().into_owned()),
  );

  segments.join("/")
}

fn is_significant(component: &Component) -> bool {
  !matches!(component, Component::CurDir)
}
