//! Shared types, error model, and configuration for docnorm.
//!
//! This crate is the foundation depended on by all other docnorm crates.
//! It provides:
//! - [`DocNormError`] — the unified error type
//! - Domain types ([`ConversionRecord`], [`ConversionIndex`], [`NormalizedMap`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DiscoveryConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{DocNormError, Result};
pub use types::{
    ConversionIndex, ConversionRecord, ConversionStatus, EXCLUDED_DIR_NAMES, INDEX_FILE_NAME,
    MAP_FILE_NAME, NORMALIZED_DIR_NAME, NormalizedMap, extension_of, to_posix_string,
};
