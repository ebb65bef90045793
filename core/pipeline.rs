use crate::bundle::{self, BundleFormat, DEFAULT_MAX_BUNDLE_MB, MIB, OutputSpec};
use crate::diff;
use crate::error::{AppError, Result};
use crate::filter::PathFilter;
use crate::grouping::group_by_top_folder;
use crate::rules::{DefaultRules, RuleProvider, RuleSet};
use crate::scanner::{self, ScanOptions, ScanOutcome, relative_posix};
use crate::snapshot::{METADATA_FILE_NAME, Snapshot, SnapshotStore};
use crate::structure::{self, ProjectStructure};
use log;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const OUTPUT_DIR_SUFFIX: &str = "_Concatenated_Output";

/// One export invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub project_path: PathBuf,
    /// Base directory for the output folder. Defaults to the project root.
    pub output_folder: Option<PathBuf>,
    /// Non-empty replaces the stored exclude patterns.
    pub exclude_patterns: Vec<String>,
    /// Non-empty replaces the stored include extensions.
    pub include_extensions: Vec<String>,
    pub max_bundle_bytes: Option<u64>,
    pub max_file_bytes: Option<u64>,
    pub incremental: bool,
    /// Relative paths to keep; `None` or empty keeps every candidate.
    pub selected_files: Option<Vec<String>>,
    pub use_tags: bool,
    pub include_header: bool,
    pub strip_comments: bool,
    pub compact_whitespace: bool,
    pub minify: bool,
    pub include_tree: bool,
    pub estimate_tokens: bool,
}

impl ExportRequest {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            output_folder: None,
            exclude_patterns: Vec::new(),
            include_extensions: Vec::new(),
            max_bundle_bytes: None,
            max_file_bytes: None,
            incremental: false,
            selected_files: None,
            use_tags: false,
            include_header: true,
            strip_comments: false,
            compact_whitespace: false,
            minify: false,
            include_tree: false,
            estimate_tokens: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub output_files: Vec<PathBuf>,
    pub total_files_processed: usize,
    pub files_changed: usize,
    pub files_skipped: usize,
    pub total_size_bytes: u64,
    pub processing_time_ms: u64,
    pub project_structure_file: PathBuf,
    pub metadata_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_token_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_file_tree: Option<String>,
    pub processed_file_paths: Vec<String>,
    pub unreadable_files: usize,
    pub invalid_patterns: Vec<String>,
}

/// Result of resolving rules and walking the tree, before anything is written.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub rule_set: RuleSet,
    pub invalid_patterns: Vec<String>,
    pub outcome: ScanOutcome,
    /// Scan candidates narrowed by the request's selection.
    pub candidates: Vec<PathBuf>,
}

impl ScanPlan {
    pub fn candidate_paths(&self) -> Vec<String> {
        self.candidates
            .iter()
            .filter_map(|p| relative_posix(&self.project_root, p))
            .collect()
    }

    pub fn structure(&self) -> ProjectStructure {
        structure::export(&self.project_root, &self.candidates)
    }
}

pub struct Exporter<'a> {
    defaults: &'a DefaultRules,
    provider: &'a dyn RuleProvider,
    store: SnapshotStore,
}

impl<'a> Exporter<'a> {
    pub fn new(defaults: &'a DefaultRules, provider: &'a dyn RuleProvider) -> Self {
        Self::with_store(defaults, provider, SnapshotStore::default())
    }

    pub fn with_store(
        defaults: &'a DefaultRules,
        provider: &'a dyn RuleProvider,
        store: SnapshotStore,
    ) -> Self {
        Exporter {
            defaults,
            provider,
            store,
        }
    }

    /// Validates the project path, resolves the rule set and scans. Writes nothing.
    pub fn plan(&self, request: &ExportRequest) -> Result<ScanPlan> {
        let project_root = validate_project_path(&request.project_path)?;
        let output_dir = resolve_output_dir(&project_root, request.output_folder.as_deref());
        let output_dir = output_dir.canonicalize().unwrap_or(output_dir);
        self.plan_in(project_root, output_dir, request)
    }

    fn plan_in(
        &self,
        project_root: PathBuf,
        output_dir: PathBuf,
        request: &ExportRequest,
    ) -> Result<ScanPlan> {
        let forced = forced_excludes(&project_root, &output_dir);
        let rule_set = RuleSet::resolve(
            self.defaults,
            self.provider,
            &request.exclude_patterns,
            &request.include_extensions,
            &forced,
        );
        let filter = PathFilter::new(&rule_set);
        let options = ScanOptions {
            max_file_bytes: request.max_file_bytes,
            excluded_root: Some(output_dir.clone()),
        };
        let outcome = scanner::scan(&project_root, &filter, &options);
        let candidates = select_files(&project_root, &outcome.files, request.selected_files.as_deref());

        Ok(ScanPlan {
            project_root,
            output_dir,
            invalid_patterns: filter.invalid_patterns().to_vec(),
            rule_set,
            outcome,
            candidates,
        })
    }

    pub fn output_spec(&self, request: &ExportRequest) -> OutputSpec {
        OutputSpec {
            max_bytes: request
                .max_bundle_bytes
                .filter(|b| *b > 0)
                .or_else(|| self.provider.max_bundle_bytes())
                .unwrap_or(DEFAULT_MAX_BUNDLE_MB * MIB),
            format: if request.use_tags {
                BundleFormat::Tagged
            } else {
                BundleFormat::Plain
            },
            include_header: request.include_header,
            strip_comments: request.strip_comments,
            compact_whitespace: request.compact_whitespace,
            minify: request.minify,
            include_tree: request.include_tree,
        }
    }

    pub fn run(&self, request: &ExportRequest) -> Result<ExportReport> {
        let started = Instant::now();
        log::info!("Starting export for project: {}", request.project_path.display());

        let project_root = validate_project_path(&request.project_path)?;
        let output_dir = resolve_output_dir(&project_root, request.output_folder.as_deref());
        fs::create_dir_all(&output_dir).map_err(|e| AppError::DirCreation {
            path: output_dir.clone(),
            source: e,
        })?;
        let output_dir = output_dir.canonicalize().map_err(|e| AppError::DirCreation {
            path: output_dir.clone(),
            source: e,
        })?;

        let plan = self.plan_in(project_root, output_dir, request)?;
        let root = plan.project_root.as_path();
        let out = plan.output_dir.as_path();
        log::info!("Found {} files to process", plan.candidates.len());

        let previous = if request.incremental {
            self.store.load(out)
        } else {
            None
        };
        let changes = diff::diff(root, &plan.candidates, previous.as_ref(), request.incremental)?;
        log::info!(
            "Files to process: {}, Files skipped: {}",
            changes.to_process.len(),
            changes.skipped.len()
        );

        let spec = self.output_spec(request);
        let project_structure = plan.structure();
        let ascii_tree = spec
            .include_tree
            .then(|| structure::render_ascii_tree(&project_structure.structure));
        let mut preamble = ascii_tree.as_deref().map(bundle::tree_preamble);

        let mut report = ExportReport {
            invalid_patterns: plan.invalid_patterns.clone(),
            unreadable_files: plan.outcome.unreadable,
            ..ExportReport::default()
        };
        let mut tokens: u64 = 0;

        for (group_key, files) in group_by_top_folder(&changes.to_process, root) {
            let output = bundle::write_group(
                &group_key,
                &files,
                root,
                out,
                &spec,
                preamble.take().as_deref(),
            )?;
            report.output_files.extend(output.files);
            report.total_size_bytes += output.bytes_written;
            report.unreadable_files += output.unreadable;
            tokens += output.approx_tokens;
            report.processed_file_paths.extend(output.written);
        }

        report.project_structure_file = structure::write(out, &project_structure)?;
        let snapshot = Snapshot::new(root, changes.records);
        report.metadata_file = self.store.save(out, &snapshot)?;

        report.total_files_processed = report.processed_file_paths.len();
        report.files_changed = report.processed_file_paths.len();
        report.files_skipped = changes.skipped.len();
        report.estimated_token_count = request.estimate_tokens.then_some(tokens);
        report.preview_file_tree = ascii_tree;
        report.processing_time_ms = started.elapsed().as_millis() as u64;

        log::info!("Export completed in {}ms", report.processing_time_ms);
        Ok(report)
    }
}

pub fn validate_project_path(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(AppError::InvalidProjectPath(path.to_path_buf()));
    }
    path.canonicalize()
        .map_err(|_| AppError::InvalidProjectPath(path.to_path_buf()))
}

/// `{base}/{project_name}_Concatenated_Output`, where `base` is the project
/// root, an absolute folder as given, or a relative folder under the root.
pub fn resolve_output_dir(project_root: &Path, output_folder: Option<&Path>) -> PathBuf {
    let project_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let dir_name = format!("{}{}", project_name, OUTPUT_DIR_SUFFIX);
    match output_folder.filter(|p| !p.as_os_str().is_empty()) {
        None => project_root.join(dir_name),
        Some(base) if base.is_absolute() => base.join(dir_name),
        Some(base) => project_root.join(base).join(dir_name),
    }
}

/// Patterns added to every rule set: the metadata file and, when it lies
/// inside the project, the output directory.
fn forced_excludes(project_root: &Path, output_dir: &Path) -> Vec<String> {
    let mut forced = vec![format!("**/{}", METADATA_FILE_NAME)];
    if let Some(rel) = relative_posix(project_root, output_dir).filter(|r| !r.is_empty()) {
        forced.push(format!("{}/**", rel));
        forced.push(rel);
    }
    forced
}

fn select_files(root: &Path, files: &[PathBuf], selected: Option<&[String]>) -> Vec<PathBuf> {
    let Some(selected) = selected.filter(|s| !s.is_empty()) else {
        return files.to_vec();
    };
    let wanted: BTreeSet<String> = selected
        .iter()
        .map(|p| p.trim().replace('\\', "/").trim_start_matches("./").to_string())
        .collect();
    log::info!("Filtering with {} selected files", wanted.len());
    files
        .iter()
        .filter(|f| relative_posix(root, f).is_some_and(|rel| wanted.contains(&rel)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_defaults_inside_the_project() {
        let root = Path::new("/work/demo");
        assert_eq!(
            resolve_output_dir(root, None),
            PathBuf::from("/work/demo/demo_Concatenated_Output")
        );
        assert_eq!(
            resolve_output_dir(root, Some(Path::new(""))),
            PathBuf::from("/work/demo/demo_Concatenated_Output")
        );
    }

    #[test]
    fn output_dir_honours_absolute_and_relative_bases() {
        let root = Path::new("/work/demo");
        assert_eq!(
            resolve_output_dir(root, Some(Path::new("/tmp/exports"))),
            PathBuf::from("/tmp/exports/demo_Concatenated_Output")
        );
        assert_eq!(
            resolve_output_dir(root, Some(Path::new("build/out"))),
            PathBuf::from("/work/demo/build/out/demo_Concatenated_Output")
        );
    }

    #[test]
    fn forced_excludes_cover_output_dir_inside_project() {
        let root = Path::new("/work/demo");
        let forced = forced_excludes(root, &root.join("demo_Concatenated_Output"));
        assert!(forced.contains(&"demo_Concatenated_Output".to_string()));
        assert!(forced.contains(&"demo_Concatenated_Output/**".to_string()));
        assert!(forced.contains(&format!("**/{}", METADATA_FILE_NAME)));

        let outside = forced_excludes(root, Path::new("/tmp/demo_Concatenated_Output"));
        assert_eq!(outside, vec![format!("**/{}", METADATA_FILE_NAME)]);
    }

    #[test]
    fn selection_normalises_separators() {
        let root = Path::new("/p");
        let files = vec![root.join("src/A.java"), root.join("src/B.java")];
        let selected = vec!["src\\B.java".to_string(), "./missing.txt".to_string()];
        assert_eq!(select_files(root, &files, Some(&selected)), vec![root.join("src/B.java")]);
        assert_eq!(select_files(root, &files, Some(&[])), files);
        assert_eq!(select_files(root, &files, None), files);
    }

    #[test]
    fn invalid_project_path_is_rejected_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            validate_project_path(&missing),
            Err(AppError::InvalidProjectPath(_))
        ));
    }
}
