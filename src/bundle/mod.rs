//! Script rendering and HTML patching for the generated service worker.

pub mod compact;
pub mod inject;
pub mod template;
