use crate::filter::{PathFilter, extension_of};
use log;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Bytes inspected by the NUL-byte sniff.
pub const BINARY_SNIFF_LEN: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Files above this size are not candidates. `None` or `Some(0)` means no ceiling.
    pub max_file_bytes: Option<u64>,
    /// Resolved output directory. Never scanned, whatever the patterns say.
    pub excluded_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    /// Absolute candidate paths in traversal order.
    pub files: Vec<PathBuf>,
    /// Root-relative directories whose subtree was skipped.
    pub pruned_dirs: Vec<String>,
    /// Entries yielded by the walk below the root, directories included.
    pub entries_visited: usize,
    pub walk_errors: usize,
    pub unreadable: usize,
    pub rejected_binary: usize,
    pub rejected_oversize: usize,
}

/// Per-directory decision taken before descending. Walk errors are the third
/// outcome; they come out of the iterator and are logged and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirVisit {
    Descend,
    SkipSubtree,
}

/// Depth-first walk of `root`, children sorted by file name.
pub fn scan(root: &Path, filter: &PathFilter, options: &ScanOptions) -> ScanOutcome {
    log::info!("Walking project directory: {}", root.display());
    let mut pruned_dirs = Vec::<String>::new();
    let mut outcome = ScanOutcome::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match visit_dir(root, entry, filter, options) {
                DirVisit::Descend => true,
                DirVisit::SkipSubtree => {
                    pruned_dirs.push(relative_posix(root, entry.path()).unwrap_or_default());
                    false
                }
            }
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Error walking directory: {}", e);
                outcome.walk_errors += 1;
                continue;
            }
        };
        if entry.depth() > 0 {
            outcome.entries_visited += 1;
        }
        if !entry.file_type().is_file() {
            if entry.path_is_symlink() {
                log::trace!("Not following symlink: {}", entry.path().display());
            }
            continue;
        }
        if let Some(path) = check_file(root, &entry, filter, options, &mut outcome) {
            outcome.files.push(path);
        }
    }

    outcome.pruned_dirs = pruned_dirs;
    log::info!(
        "Directory walk complete. {} candidates, {} pruned directories, {} walk errors.",
        outcome.files.len(),
        outcome.pruned_dirs.len(),
        outcome.walk_errors
    );
    outcome
}

fn visit_dir(root: &Path, entry: &DirEntry, filter: &PathFilter, options: &ScanOptions) -> DirVisit {
    let path = entry.path();
    if options
        .excluded_root
        .as_deref()
        .is_some_and(|excluded| path.starts_with(excluded))
    {
        log::debug!("Skipping output directory: {}", path.display());
        return DirVisit::SkipSubtree;
    }
    match relative_posix(root, path) {
        Some(rel) if filter.is_dir_excluded(&rel) => {
            log::debug!("Excluding directory: {}", rel);
            DirVisit::SkipSubtree
        }
        Some(_) => DirVisit::Descend,
        None => {
            log::warn!("Could not get relative path for: {}", path.display());
            DirVisit::SkipSubtree
        }
    }
}

fn check_file(
    root: &Path,
    entry: &DirEntry,
    filter: &PathFilter,
    options: &ScanOptions,
    outcome: &mut ScanOutcome,
) -> Option<PathBuf> {
    let path = entry.path();
    if options
        .excluded_root
        .as_deref()
        .is_some_and(|excluded| path.starts_with(excluded))
    {
        return None;
    }
    let rel = relative_posix(root, path)?;
    let file_name = entry.file_name().to_string_lossy();
    let extension = extension_of(&file_name);

    if !filter.is_included(&rel, &file_name, extension.as_deref()) {
        return None;
    }

    let size = match entry.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::warn!("Could not read metadata of {}: {}", rel, e);
            outcome.unreadable += 1;
            return None;
        }
    };
    if let Some(max) = options.max_file_bytes.filter(|max| *max > 0) {
        if size > max {
            log::debug!(
                "Skipping file {} ({} bytes) - exceeds max size of {} bytes",
                rel,
                size,
                max
            );
            outcome.rejected_oversize += 1;
            return None;
        }
    }

    match is_probably_text(path) {
        Ok(true) => {
            log::trace!("Candidate: {}", rel);
            Some(path.to_path_buf())
        }
        Ok(false) => {
            log::debug!("Skipping binary file: {}", rel);
            outcome.rejected_binary += 1;
            None
        }
        Err(e) => {
            log::warn!("Could not determine if file is text: {} ({})", rel, e);
            outcome.unreadable += 1;
            None
        }
    }
}

/// True unless the first [`BINARY_SNIFF_LEN`] bytes contain a NUL. Empty files are text.
pub fn is_probably_text(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; BINARY_SNIFF_LEN];
    let mut filled = 0;
    while filled < BINARY_SNIFF_LEN {
        let n = file.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(!buffer[..filled].contains(&0))
}

/// `path` relative to `root`, joined with `/`. `None` if `path` is not under `root`.
pub fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;
    use std::fs;

    fn filter(excludes: &[&str], includes: &[&str]) -> PathFilter {
        PathFilter::new(&RuleSet {
            exclude_patterns: excludes.iter().map(|s| s.to_string()).collect(),
            include_extensions: includes.iter().map(|s| s.to_string()).collect(),
            always_include_names: ["Makefile".to_string()].into_iter().collect(),
            always_include_extensions: Default::default(),
        })
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn rels(root: &Path, outcome: &ScanOutcome) -> Vec<String> {
        outcome
            .files
            .iter()
            .map(|p| relative_posix(root, p).unwrap())
            .collect()
    }

    #[test]
    fn traversal_is_depth_first_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/b/Two.java", b"2");
        write(root, "src/a/One.java", b"1");
        write(root, "Main.java", b"m");
        write(root, "src/Zed.java", b"z");

        let outcome = scan(root, &filter(&[], &[".java"]), &ScanOptions::default());
        assert_eq!(
            rels(root, &outcome),
            vec!["Main.java", "src/Zed.java", "src/a/One.java", "src/b/Two.java"]
        );
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "node_modules/pkg/index.js", b"module.exports = 1;");
        write(root, "node_modules/pkg/Makefile", b"all:");
        write(root, "app.js", b"run();");

        let outcome = scan(root, &filter(&["node_modules/**"], &[".js"]), &ScanOptions::default());
        assert_eq!(rels(root, &outcome), vec!["app.js"]);
        assert_eq!(outcome.pruned_dirs, vec!["node_modules"]);
    }

    #[test]
    fn pruned_subtree_is_never_descended_into() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "node_modules/pkg/index.js", b"x");
        write(root, "node_modules/locked/inner/file.js", b"x");
        write(root, "app.js", b"run();");

        let unpruned = scan(root, &filter(&[], &[".js"]), &ScanOptions::default());
        assert_eq!(unpruned.entries_visited, 7);
        assert_eq!(unpruned.files.len(), 3);

        let pruned = scan(root, &filter(&["node_modules/**"], &[".js"]), &ScanOptions::default());
        assert_eq!(pruned.entries_visited, 1);
        assert_eq!(pruned.walk_errors, 0);
        assert_eq!(rels(root, &pruned), vec!["app.js"]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_below_a_pruned_one_causes_no_errors() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "node_modules/locked/inner/file.js", b"x");
        write(root, "app.js", b"run();");
        let locked = root.join("node_modules/locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let outcome = scan(root, &filter(&["node_modules/**"], &[".js"]), &ScanOptions::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(outcome.walk_errors, 0);
        assert_eq!(outcome.entries_visited, 1);
        assert_eq!(rels(root, &outcome), vec!["app.js"]);
    }

    #[test]
    fn binary_files_are_rejected_and_empty_files_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "data.txt", b"abc\0def");
        write(root, "empty.txt", b"");
        write(root, "plain.txt", b"hello");

        let outcome = scan(root, &filter(&[], &[".txt"]), &ScanOptions::default());
        assert_eq!(rels(root, &outcome), vec!["empty.txt", "plain.txt"]);
        assert_eq!(outcome.rejected_binary, 1);
    }

    #[test]
    fn nul_after_sniff_window_is_not_seen() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = vec![b'a'; BINARY_SNIFF_LEN];
        content.push(0);
        let path = dir.path().join("late.txt");
        fs::write(&path, content).unwrap();
        assert!(is_probably_text(&path).unwrap());
    }

    #[test]
    fn per_file_ceiling_rejects_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "big.txt", &[b'x'; 100]);
        write(root, "small.txt", b"x");

        let options = ScanOptions {
            max_file_bytes: Some(50),
            excluded_root: None,
        };
        let outcome = scan(root, &filter(&[], &[".txt"]), &options);
        assert_eq!(rels(root, &outcome), vec!["small.txt"]);
        assert_eq!(outcome.rejected_oversize, 1);
    }

    #[test]
    fn output_directory_is_never_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "out/src-1.txt", b"old bundle");
        write(root, "src/notes.txt", b"notes");

        let options = ScanOptions {
            max_file_bytes: None,
            excluded_root: Some(root.join("out")),
        };
        let outcome = scan(root, &filter(&[], &[".txt"]), &options);
        assert_eq!(rels(root, &outcome), vec!["src/notes.txt"]);
        assert_eq!(outcome.pruned_dirs, vec!["out"]);
    }

    #[test]
    fn relative_posix_joins_with_forward_slashes() {
        let root = Path::new("/project");
        assert_eq!(
            relative_posix(root, &root.join("a").join("b.rs")).as_deref(),
            Some("a/b.rs")
        );
        assert_eq!(relative_posix(root, Path::new("/elsewhere/x")), None);
    }
}
