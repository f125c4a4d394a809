//! Configuration parser for loading run configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, ReconcileError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{DirectoryBackend, RunConfig};

/// Environment variable overriding the scope.
pub const ENV_SCOPE: &str = "RECONCILE_SCOPE";

/// Environment variable selecting the HTTP backend and its URL.
pub const ENV_DIRECTORY_URL: &str = "RECONCILE_DIRECTORY_URL";

/// Environment variable selecting the file backend and its inventory.
pub const ENV_INVENTORY: &str = "RECONCILE_INVENTORY";

/// Environment variable holding the HTTP bearer token.
pub const ENV_DIRECTORY_TOKEN: &str = "RECONCILE_DIRECTORY_TOKEN";

/// Configuration parser for loading run configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ReconcileError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<RunConfig> {
        debug!("Parsing YAML configuration");

        let config: RunConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ReconcileError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for scope: {}", config.scope);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<RunConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env_overrides<F>(config: &mut RunConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(scope) = lookup(ENV_SCOPE) {
            debug!("Overriding scope from environment");
            config.scope = scope;
        }

        if let Some(url) = lookup(ENV_DIRECTORY_URL) {
            debug!("Overriding directory.url from environment");
            config.directory.backend = DirectoryBackend::Http;
            config.directory.url = Some(url);
        }

        if let Some(path) = lookup(ENV_INVENTORY) {
            debug!("Overriding directory.path from environment");
            config.directory.backend = DirectoryBackend::File;
            config.directory.path = Some(PathBuf::from(path));
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ReconcileError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the directory bearer token from environment (optional).
    #[must_use]
    pub fn directory_token() -> Option<String> {
        std::env::var(ENV_DIRECTORY_TOKEN)
            .ok()
            .filter(|t| !t.is_empty())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["reconcile.yaml", "reconcile.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// A relative `start_dir` is taken from the current working directory, so
/// the search can climb past it.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };
    let mut current = start.clone();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ReconcileError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

/// Returns the explicit configuration path, or discovers one upward from
/// the working directory.
///
/// # Errors
///
/// Returns an error if no path is given and none is found.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => find_config_file(std::env::current_dir()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetAction;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
scope: OU=Staff,DC=corp,DC=example
directory:
  path: inventory.json
target:
  attribute: tools_upgrade_policy
  value: upgradeAtPowerCycle
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.scope, "OU=Staff,DC=corp,DC=example");
        assert_eq!(config.directory.backend, DirectoryBackend::File);
        assert_eq!(config.target.action, TargetAction::SetAttribute);
        assert!(!config.filters.enabled_only);
        assert!(config.output.csv.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
directory:
  backend: http
  url: "https://directory.corp.example/api"
scope: ENTERPRISEPACK
filters:
  enabled_only: true
  include_groups: [sales]
  exclude_groups: [executives]
  exclude:
    - ceo@corp.example
  matches:
    - attribute: department
      pattern: "Sales*"
target:
  action: disable_plans
  plans:
    - YAMMER_ENTERPRISE
    - SWAY
output:
  csv: reports/licenses.csv
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.directory.backend, DirectoryBackend::Http);
        assert_eq!(config.target.action, TargetAction::DisablePlans);
        assert_eq!(config.target.plans.len(), 2);
        assert_eq!(config.filters.matches[0].pattern, "Sales*");
        assert_eq!(config.to_predicates().len(), 5);
        assert_eq!(config.sku(), "ENTERPRISEPACK");
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ConfigParser::new()
            .parse_yaml("target: [unclosed", Some(Path::new("reconcile.yaml")))
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Config(ConfigError::ParseError { location: Some(ref l), .. }) if l == "reconcile.yaml"
        ));
    }

    #[test]
    fn test_template_is_valid() {
        let config = ConfigParser::new()
            .parse_yaml(include_str!("../../templates/reconcile.yaml"), None)
            .unwrap();
        let result = crate::config::ConfigValidator::new().validate(&config).unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(config.to_predicates().len(), 2);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SCOPE, "OU=Leavers,DC=corp"),
            (ENV_DIRECTORY_URL, "http://localhost:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = RunConfig::default();
        ConfigParser::apply_env_overrides(&mut config, |name| {
            env.get(name).map(|v| (*v).to_string())
        });

        assert_eq!(config.scope, "OU=Leavers,DC=corp");
        assert_eq!(config.directory.backend, DirectoryBackend::Http);
        assert_eq!(config.directory.url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join("reconcile.yml"), "scope: x\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, temp_dir.path().join("reconcile.yml"));
    }

    #[test]
    fn test_find_config_file_from_relative_start_is_absolute() {
        // The crate root normally has no config, so the search climbs to `/`.
        match find_config_file(".") {
            Ok(found) => assert!(found.is_absolute()),
            Err(ReconcileError::Config(ConfigError::FileNotFound { path })) => {
                assert!(path.is_absolute());
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_find_config_file_walks_up_from_relative_start() {
        let found = find_config_file(Path::new("templates").join("missing")).unwrap();
        assert_eq!(
            found,
            std::env::current_dir().unwrap().join("templates").join("reconcile.yaml")
        );
    }

    #[test]
    fn test_resolve_explicit_config_path() {
        let explicit = Path::new("configs/prod.yaml");
        assert_eq!(resolve_config_path(Some(explicit)).unwrap(), explicit);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigParser::new()
            .load_file(temp_dir.path().join("reconcile.yaml"))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Config(ConfigError::FileNotFound { .. })));
    }
}
