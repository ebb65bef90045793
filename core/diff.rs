use crate::error::{AppError, Result};
use crate::hashing::sha256_file;
use crate::scanner::relative_posix;
use crate::snapshot::{FileRecord, Snapshot};
use chrono::{DateTime, Utc};
use log;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Candidates whose content changed or that have no baseline entry, in input order.
    pub to_process: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// A record for every candidate, keyed by relative path. Becomes the next snapshot.
    pub records: BTreeMap<String, FileRecord>,
}

/// Hashes every candidate and compares against `previous`.
///
/// A file is skipped only when `incremental` is set, a baseline exists, and
/// the baseline holds the same hash for the same relative path. Size and
/// modification time are recorded but never consulted.
pub fn diff(
    root: &Path,
    candidates: &[PathBuf],
    previous: Option<&Snapshot>,
    incremental: bool,
) -> Result<ChangeSet> {
    let baseline = previous.filter(|_| incremental);
    if incremental && baseline.is_none() {
        log::info!("No previous metadata found; processing every file.");
    }

    let mut change_set = ChangeSet::default();
    for path in candidates {
        let record = build_record(root, path)?;
        let unchanged = baseline
            .and_then(|snapshot| snapshot.hash_of(&record.file_path))
            .is_some_and(|old_hash| old_hash == record.sha256_hash);

        if unchanged {
            log::trace!("Unchanged: {}", record.file_path);
            change_set.skipped.push(path.clone());
        } else {
            log::trace!("Changed: {}", record.file_path);
            change_set.to_process.push(path.clone());
        }
        change_set.records.insert(record.file_path.clone(), record);
    }

    log::debug!(
        "Change detection: {} to process, {} skipped",
        change_set.to_process.len(),
        change_set.skipped.len()
    );
    Ok(change_set)
}

pub fn build_record(root: &Path, path: &Path) -> Result<FileRecord> {
    let file_path = relative_posix(root, path).ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "File {} is outside the project root {}",
            path.display(),
            root.display()
        ))
    })?;
    let sha256_hash = sha256_file(path).map_err(|e| AppError::Hash {
        path: path.to_path_buf(),
        source: e,
    })?;
    let metadata = fs::metadata(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let last_modified = metadata
        .modified()
        .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
        .unwrap_or(0);

    Ok(FileRecord {
        file_path,
        sha256_hash,
        last_modified,
        file_size: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("Main.java"), "class Main {}").unwrap();
        fs::write(src.join("Old.java"), "class Old {}").unwrap();
        let files = vec![src.join("Main.java"), src.join("Old.java")];
        (dir, files)
    }

    #[test]
    fn everything_is_changed_without_a_baseline() {
        let (dir, files) = setup();
        let changes = diff(dir.path(), &files, None, true).unwrap();
        assert_eq!(changes.to_process, files);
        assert!(changes.skipped.is_empty());
        assert_eq!(changes.records.len(), 2);
        assert_eq!(changes.records["src/Main.java"].file_size, 13);
    }

    #[test]
    fn unchanged_files_are_skipped_when_incremental() {
        let (dir, files) = setup();
        let first = diff(dir.path(), &files, None, false).unwrap();
        let baseline = Snapshot::new(dir.path(), first.records);

        fs::write(&files[0], "class Main { int x; }").unwrap();
        let second = diff(dir.path(), &files, Some(&baseline), true).unwrap();
        assert_eq!(second.to_process, vec![files[0].clone()]);
        assert_eq!(second.skipped, vec![files[1].clone()]);
        assert_eq!(second.to_process.len() + second.skipped.len(), files.len());
    }

    #[test]
    fn full_runs_ignore_the_baseline() {
        let (dir, files) = setup();
        let first = diff(dir.path(), &files, None, false).unwrap();
        let baseline = Snapshot::new(dir.path(), first.records);
        let second = diff(dir.path(), &files, Some(&baseline), false).unwrap();
        assert_eq!(second.to_process.len(), 2);
        assert!(second.skipped.is_empty());
    }

    #[test]
    fn new_files_are_always_changed() {
        let (dir, mut files) = setup();
        let first = diff(dir.path(), &files, None, false).unwrap();
        let baseline = Snapshot::new(dir.path(), first.records);

        let added = dir.path().join("src/New.java");
        fs::write(&added, "class New {}").unwrap();
        files.push(added.clone());
        let second = diff(dir.path(), &files, Some(&baseline), true).unwrap();
        assert_eq!(second.to_process, vec![added]);
        assert_eq!(second.skipped.len(), 2);
    }

    #[test]
    fn touching_without_content_change_is_not_a_change() {
        let (dir, files) = setup();
        let first = diff(dir.path(), &files, None, false).unwrap();
        let mut baseline = Snapshot::new(dir.path(), first.records);
        for record in baseline.files.values_mut() {
            record.last_modified = 0;
            record.file_size = 0;
        }
        let second = diff(dir.path(), &files, Some(&baseline), true).unwrap();
        assert!(second.to_process.is_empty());
    }

    #[test]
    fn hashing_a_vanished_file_aborts() {
        let (dir, files) = setup();
        fs::remove_file(&files[1]).unwrap();
        let err = diff(dir.path(), &files, None, false).unwrap_err();
        assert!(matches!(err, AppError::Hash { .. }));
    }
}
