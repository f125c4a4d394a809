//! Configuration module for reconciliation runs.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `reconcile.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_DIRECTORY_TOKEN, ENV_DIRECTORY_URL, ENV_INVENTORY,
    ENV_SCOPE, find_config_file, resolve_config_path,
};
pub use spec::{
    AttributeMatch, DirectoryBackend, DirectoryConfig, FilterConfig, OutputConfig, RunConfig,
    TargetAction, TargetConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
