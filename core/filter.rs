use crate::rules::RuleSet;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use log;
use std::collections::BTreeSet;

/// Compiled form of a [`RuleSet`].
///
/// Precedence is fixed: a directory matched by any exclude pattern is pruned
/// with everything under it. A file whose name or extension is on an
/// always-include list ignores per-file exclusion, but is still never reached
/// below a pruned directory.
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude_set: GlobSet,
    /// Prefixes of `<dir>/**` patterns, matched against directory paths.
    dir_exclude_set: GlobSet,
    include_extensions: BTreeSet<String>,
    always_include_names: BTreeSet<String>,
    always_include_extensions: BTreeSet<String>,
    invalid_patterns: Vec<String>,
}

impl PathFilter {
    pub fn new(rules: &RuleSet) -> Self {
        log::trace!("Building glob sets for filtering...");
        let mut invalid_patterns = Vec::new();
        let mut exclude_patterns = Vec::new();
        let mut dir_patterns = Vec::new();

        for pattern_str in &rules.exclude_patterns {
            let mut processed = pattern_str.trim().to_string();
            if processed.is_empty() {
                continue;
            }
            if processed.ends_with('/') && processed.len() > 1 {
                processed.push_str("**");
            }
            if let Some(dir_part) = processed.strip_suffix("/**") {
                if !dir_part.is_empty() {
                    dir_patterns.push((pattern_str.clone(), dir_part.to_string()));
                }
            }
            exclude_patterns.push((pattern_str.clone(), processed));
        }

        let exclude_set = build_glob_set(&exclude_patterns, &mut invalid_patterns);
        let dir_exclude_set = build_glob_set(&dir_patterns, &mut invalid_patterns);
        invalid_patterns.dedup();

        PathFilter {
            exclude_set,
            dir_exclude_set,
            include_extensions: rules.include_extensions.clone(),
            always_include_names: rules.always_include_names.clone(),
            always_include_extensions: rules.always_include_extensions.clone(),
            invalid_patterns,
        }
    }

    /// Patterns that failed to compile and were skipped.
    pub fn invalid_patterns(&self) -> &[String] {
        &self.invalid_patterns
    }

    /// `relative_path` uses `/` separators.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude_set.is_match(relative_path)
    }

    pub fn is_dir_excluded(&self, relative_path: &str) -> bool {
        if self.exclude_set.is_match(relative_path) || self.dir_exclude_set.is_match(relative_path) {
            log::trace!("Directory excluded: {}", relative_path);
            return true;
        }
        false
    }

    pub fn is_always_included(&self, file_name: &str, extension: Option<&str>) -> bool {
        self.always_include_names.contains(file_name)
            || extension.is_some_and(|ext| self.always_include_extensions.contains(ext))
    }

    /// Rule decision for a regular file. Binary and size checks happen in the scanner.
    pub fn is_included(&self, relative_path: &str, file_name: &str, extension: Option<&str>) -> bool {
        let always = self.is_always_included(file_name, extension);
        if !always && self.is_excluded(relative_path) {
            log::trace!("File excluded by pattern: {}", relative_path);
            return false;
        }
        let wanted = always || extension.is_some_and(|ext| self.include_extensions.contains(ext));
        if !wanted {
            log::trace!("File extension not included: {}", relative_path);
        }
        wanted
    }
}

/// Extension including the leading dot, lowercased. Dotfiles count as their
/// own extension (`.env`, `.gitignore`); names without a dot have none.
pub fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rfind('.')
        .map(|idx| file_name[idx..].to_lowercase())
        .filter(|ext| ext.len() > 1)
}

fn build_glob_set(patterns: &[(String, String)], invalid: &mut Vec<String>) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for (original, processed) in patterns {
        match GlobBuilder::new(processed).literal_separator(true).build() {
            Ok(glob) => {
                log::trace!("Adding glob pattern: {} (processed as {})", original, processed);
                builder.add(glob);
            }
            Err(e) => {
                log::warn!("Skipping invalid exclude pattern \"{}\": {}", original, e);
                invalid.push(original.clone());
            }
        }
    }
    builder.build().unwrap_or_else(|e| {
        log::warn!("Error building glob set, no patterns will match: {}", e);
        GlobSet::empty()
    })
}
