//! Cache generation token used by the loader and worker to detect a new build.

use rand::Rng;

use crate::models::VersionToken;

const FRAGMENT_DIGITS: usize = 8;
const FRAGMENT_SPACE: u32 = 100_000_000;

/// Token for `version` with a fresh random fragment from the thread-local generator.
pub fn compute_version_token(version: &str) -> VersionToken {
  compute_version_token_with(&mut rand::thread_rng(), version)
}

/// Token for `version` drawing its fragment from `rng`.
///
/// The fragment only needs to change between builds; it is not a secret.
pub fn compute_version_token_with<R: Rng + ?Sized>(rng: &mut R, version: &str) -> VersionToken {
  let value = rng.gen_range(0..FRAGMENT_SPACE);
  let fragment = format!("{value:0width$}", width = FRAGMENT_DIGITS);
  VersionToken::new(fragment, version)
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use rand::SeedableRng;
  use rand::rngs::StdRng;

  #[test]
  fn seeded_generator_is_reproducible() {
    let first = compute_version_token_with(&mut StdRng::seed_from_u64(7), "1.0.0");
    let second = compute_version_token_with(&mut StdRng::seed_from_u64(7), "1.0.0");
    assert_eq!(first, second);
  }

  #[test]
  fn consecutive_tokens_differ() {
    let tokens: Vec<String> = (0..16)
      .map(|_| compute_version_token("1.0.0").to_string())
      .collect();
    let unique: std::collections::BTreeSet<&String> = tokens.iter().collect();
    assert!(unique.len() > 1);
  }

  proptest! {
    #[test]
    fn fragment_is_eight_digits_and_version_is_verbatim(seed in any::<u64>(), version in ".*") {
      let token = compute_version_token_with(&mut StdRng::seed_from_u64(seed), &version);
      prop_assert_eq!(token.fragment().len(), 8);
      prop_assert!(token.fragment().chars().all(|c| c.is_ascii_digit()));
      prop_assert_eq!(token.version(), version.as_str());
      let rendered = token.to_string();
      prop_assert_eq!(rendered.split_once('_').map(|(_, rest)| rest), Some(version.as_str()));
    }
  }
}
