use crate::error::{AppError, Result};
use log;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const EMBEDDED_DEFAULT_RULES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/default_rules.yaml"));

/// Fixed rule data shipped with the tool. Built once at startup and handed to
/// [`RuleSet::resolve`]; nothing reads it from a global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultRules {
    /// Unioned into every RuleSet. Callers cannot remove these.
    #[serde(default)]
    pub always_exclude: Vec<String>,
    #[serde(default)]
    pub always_include_names: Vec<String>,
    #[serde(default)]
    pub always_include_extensions: Vec<String>,
    #[serde(default)]
    pub fallback_exclude: Vec<String>,
    #[serde(default)]
    pub fallback_include_extensions: Vec<String>,
}

impl DefaultRules {
    pub fn embedded() -> Result<Self> {
        Self::from_yaml(EMBEDDED_DEFAULT_RULES)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        log::info!("Loading default rules from: {}", path.display());
        let yaml = fs::read_to_string(path).map_err(|e| AppError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&yaml)
    }
}

/// Source of the user's stored preferences. The persistence format is the
/// implementor's business.
pub trait RuleProvider {
    fn exclude_patterns(&self) -> Vec<String>;
    fn include_extensions(&self) -> Vec<String>;
    /// Stored default bundle size in bytes, if any.
    fn max_bundle_bytes(&self) -> Option<u64> {
        None
    }
}

/// Provider with nothing stored, so the default fallbacks apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStoredRules;

impl RuleProvider for NoStoredRules {
    fn exclude_patterns(&self) -> Vec<String> {
        Vec::new()
    }
    fn include_extensions(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub exclude_patterns: BTreeSet<String>,
    pub include_extensions: BTreeSet<String>,
    pub always_include_names: BTreeSet<String>,
    pub always_include_extensions: BTreeSet<String>,
}

impl RuleSet {
    /// Merge policy: a non-empty request set replaces the stored set, a
    /// non-empty stored set replaces the fallback. `forced_excludes` and the
    /// default always-exclude patterns are unioned in afterwards.
    pub fn resolve(
        defaults: &DefaultRules,
        provider: &dyn RuleProvider,
        request_excludes: &[String],
        request_includes: &[String],
        forced_excludes: &[String],
    ) -> Self {
        let stored_excludes = provider.exclude_patterns();
        let stored_includes = provider.include_extensions();

        let excludes = pick_first_non_empty(&[
            ("request", request_excludes),
            ("stored", stored_excludes.as_slice()),
            ("fallback", defaults.fallback_exclude.as_slice()),
        ]);
        let includes = pick_first_non_empty(&[
            ("request", request_includes),
            ("stored", stored_includes.as_slice()),
            ("fallback", defaults.fallback_include_extensions.as_slice()),
        ]);

        let mut exclude_patterns: BTreeSet<String> = excludes
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        exclude_patterns.extend(defaults.always_exclude.iter().cloned());
        exclude_patterns.extend(forced_excludes.iter().cloned());

        let rule_set = RuleSet {
            exclude_patterns,
            include_extensions: includes.iter().filter_map(|e| normalize_extension(e)).collect(),
            always_include_names: defaults
                .always_include_names
                .iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            always_include_extensions: defaults
                .always_include_extensions
                .iter()
                .filter_map(|e| normalize_extension(e))
                .collect(),
        };
        log::debug!(
            "Resolved rule set: {} exclude patterns, {} include extensions, {} always-include names, {} always-include extensions",
            rule_set.exclude_patterns.len(),
            rule_set.include_extensions.len(),
            rule_set.always_include_names.len(),
            rule_set.always_include_extensions.len()
        );
        rule_set
    }
}

fn pick_first_non_empty<'a>(candidates: &[(&str, &'a [String])]) -> &'a [String] {
    for (origin, values) in candidates {
        if values.iter().any(|v| !v.trim().is_empty()) {
            log::trace!("Using {} rule values: {:?}", origin, values);
            return *values;
        }
    }
    &[]
}

/// `java`, `.java` and ` .JAVA ` all become `.java`.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('*');
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered.starts_with('.') {
        Some(lowered)
    } else {
        Some(format!(".{}", lowered))
    }
}
