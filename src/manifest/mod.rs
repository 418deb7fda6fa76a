//! Manifest generation broken into focused submodules for easier testing.

mod scanning;
mod version;
mod writer;

pub use scanning::{ScanFailure, ScanResult, scan_assets};
pub use version::{compute_version_token, compute_version_token_with};
pub use writer::{WrittenOutputs, write_modified_assets, write_outputs};
