//! Helpers for normalising asset keys and computing paths between emitted files.
//!
//! Asset keys always use forward slashes so the generated manifest is identical on every
//! platform. Relative paths handed to the loader are computed lexically from absolute
//! paths, without touching the filesystem.

mod normalize;
mod relative;

pub use normalize::{normalize_relative, relative_key};
pub use relative::relative_url;
