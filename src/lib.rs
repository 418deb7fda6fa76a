#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod asset_paths;
pub mod builder;
pub mod bundle;
pub mod config;
pub mod manifest;
pub mod models;
pub mod selection;

pub use builder::ServiceWorkerBuilder;
pub use config::{CacheConfig, ConfigError, SwConfigFile};
pub use models::{Asset, AssetMap, BuildReport, CacheManifest, InjectionOutcome, VersionToken};
pub use selection::{AssetEditor, CacheFilter, cache_filter, select_cache_files};
