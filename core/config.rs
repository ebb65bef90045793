use crate::bundle::{DEFAULT_MAX_BUNDLE_MB, MIB};
use crate::error::{AppError, Result};
use crate::rules::RuleProvider;
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".projcat";
pub const DEFAULT_CONFIG_FILENAME: &str = "projcat.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Stored rule preferences. Empty lists defer to the built-in fallbacks.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include_extensions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Base directory for `{project}_Concatenated_Output`. Relative paths
    /// resolve against the project root.
    #[serde(default)]
    pub folder: Option<PathBuf>,
    #[serde(default = "default_max_bundle_mb")]
    pub max_bundle_mb: u64,
    #[serde(default = "default_false")]
    pub use_tags: bool,
    #[serde(default = "default_true")]
    pub include_header: bool,
    #[serde(default = "default_false")]
    pub strip_comments: bool,
    #[serde(default = "default_false")]
    pub compact_whitespace: bool,
    #[serde(default = "default_false")]
    pub minify: bool,
    #[serde(default = "default_false")]
    pub include_tree: bool,
    #[serde(default = "default_false")]
    pub estimate_tokens: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Per-file ceiling; larger files are not scanned. Unset means unlimited.
    #[serde(default)]
    pub max_file_size_mb: Option<u64>,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_max_bundle_mb() -> u64 {
    DEFAULT_MAX_BUNDLE_MB
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: None,
            max_bundle_mb: default_max_bundle_mb(),
            use_tags: default_false(),
            include_header: default_true(),
            strip_comments: default_false(),
            compact_whitespace: default_false(),
            minify: default_false(),
            include_tree: default_false(),
            estimate_tokens: default_false(),
        }
    }
}

impl RuleProvider for Config {
    fn exclude_patterns(&self) -> Vec<String> {
        self.rules.exclude.clone()
    }

    fn include_extensions(&self) -> Vec<String> {
        self.rules.include_extensions.clone()
    }

    fn max_bundle_bytes(&self) -> Option<u64> {
        (self.output.max_bundle_mb > 0).then(|| self.output.max_bundle_mb * MIB)
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        let canonical = path_to_resolve
            .canonicalize()
            .map_err(|_| AppError::InvalidProjectPath(path_to_resolve.clone()))?;
        if !canonical.is_dir() {
            return Err(AppError::InvalidProjectPath(path_to_resolve));
        }
        Ok(canonical)
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p_str) => {
                let mut path = PathBuf::from(shellexpand::tilde(p_str).as_ref());
                if path.is_relative() && !path.exists() {
                    path = project_root.join(DEFAULT_CONFIG_DIR).join(&path);
                }
                if !path.exists() && path.extension().is_none() {
                    path.set_extension("toml");
                }
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn from_toml(toml_content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str::<Config>(toml_content)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn max_file_bytes(&self) -> Option<u64> {
        self.scan
            .max_file_size_mb
            .filter(|mb| *mb > 0)
            .map(|mb| mb * MIB)
    }
}
