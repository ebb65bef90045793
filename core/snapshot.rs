use crate::error::{AppError, Result};
use chrono::Utc;
use log;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const METADATA_FILE_NAME: &str = ".project-concat-metadata.json";

/// One scanned file. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_path: String,
    pub sha256_hash: String,
    /// Epoch milliseconds.
    pub last_modified: i64,
    pub file_size: u64,
}

/// Baseline stored in the output directory and replaced wholesale by each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub project_path: String,
    /// Epoch milliseconds.
    pub last_scan_time: i64,
    pub total_files: usize,
    pub total_size: u64,
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    pub fn new(project_path: &Path, files: BTreeMap<String, FileRecord>) -> Self {
        Snapshot {
            project_path: project_path.to_string_lossy().to_string(),
            last_scan_time: Utc::now().timestamp_millis(),
            total_files: files.len(),
            total_size: files.values().map(|r| r.file_size).sum(),
            files,
        }
    }

    pub fn hash_of(&self, relative_path: &str) -> Option<&str> {
        self.files.get(relative_path).map(|r| r.sha256_hash.as_str())
    }
}

/// Platform capability for marking the metadata file hidden.
pub trait HiddenAttribute {
    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()>;
}

/// For platforms where dotfiles are already hidden.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHiddenAttribute;

impl HiddenAttribute for NoHiddenAttribute {
    fn set_hidden(&self, _path: &Path, _hidden: bool) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsHiddenAttribute;

#[cfg(windows)]
impl HiddenAttribute for WindowsHiddenAttribute {
    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()> {
        use windows::Win32::Storage::FileSystem::{
            FILE_ATTRIBUTE_HIDDEN, FILE_FLAGS_AND_ATTRIBUTES, GetFileAttributesW,
            INVALID_FILE_ATTRIBUTES, SetFileAttributesW,
        };
        use windows::core::HSTRING;

        let wide = HSTRING::from(path.as_os_str());
        let current = unsafe { GetFileAttributesW(&wide) };
        if current == INVALID_FILE_ATTRIBUTES {
            return Err(io::Error::last_os_error());
        }
        let updated = if hidden {
            current | FILE_ATTRIBUTE_HIDDEN.0
        } else {
            current & !FILE_ATTRIBUTE_HIDDEN.0
        };
        if updated == current {
            return Ok(());
        }
        unsafe { SetFileAttributesW(&wide, FILE_FLAGS_AND_ATTRIBUTES(updated)) }
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

pub fn platform_hidden_attribute() -> Box<dyn HiddenAttribute> {
    #[cfg(windows)]
    {
        Box::new(WindowsHiddenAttribute)
    }
    #[cfg(not(windows))]
    {
        Box::new(NoHiddenAttribute)
    }
}

pub struct SnapshotStore {
    hidden: Box<dyn HiddenAttribute>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(platform_hidden_attribute())
    }
}

impl SnapshotStore {
    pub fn new(hidden: Box<dyn HiddenAttribute>) -> Self {
        SnapshotStore { hidden }
    }

    pub fn path_in(output_dir: &Path) -> PathBuf {
        output_dir.join(METADATA_FILE_NAME)
    }

    /// Missing or unparsable metadata means there is no baseline.
    pub fn load(&self, output_dir: &Path) -> Option<Snapshot> {
        let path = Self::path_in(output_dir);
        if !path.is_file() {
            log::debug!("No previous metadata at {}", path.display());
            return None;
        }
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Could not read metadata file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Snapshot>(&json) {
            Ok(snapshot) => {
                log::debug!(
                    "Loaded metadata with {} files from {}",
                    snapshot.files.len(),
                    path.display()
                );
                Some(snapshot)
            }
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable metadata file {} ({}); running without a baseline.",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, output_dir: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = Self::path_in(output_dir);
        if path.exists() {
            if let Err(e) = self.hidden.set_hidden(&path, false) {
                log::warn!("Could not unhide metadata file {}: {}", path.display(), e);
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json).map_err(|e| AppError::FileWrite {
            path: path.clone(),
            source: e,
        })?;

        if let Err(e) = self.hidden.set_hidden(&path, true) {
            log::warn!("Could not hide metadata file {}: {}", path.display(), e);
        }
        log::debug!("Saved metadata for {} files to {}", snapshot.total_files, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(path: &str, hash: &str, size: u64) -> FileRecord {
        FileRecord {
            file_path: path.to_string(),
            sha256_hash: hash.to_string(),
            last_modified: 1_700_000_000_000,
            file_size: size,
        }
    }

    fn sample() -> Snapshot {
        let mut files = BTreeMap::new();
        files.insert("src/Main.java".to_string(), record("src/Main.java", "aa", 10));
        files.insert("README.md".to_string(), record("README.md", "bb", 5));
        Snapshot::new(Path::new("/work/demo"), files)
    }

    #[test]
    fn new_snapshot_totals_its_records() {
        let snapshot = sample();
        assert_eq!(snapshot.total_files, 2);
        assert_eq!(snapshot.total_size, 15);
        assert_eq!(snapshot.hash_of("src/Main.java"), Some("aa"));
        assert_eq!(snapshot.hash_of("src/Other.java"), None);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["projectPath"], "/work/demo");
        assert_eq!(value["totalFiles"], 2);
        assert!(value["lastScanTime"].is_i64());
        let main = &value["files"]["src/Main.java"];
        assert_eq!(main["filePath"], "src/Main.java");
        assert_eq!(main["sha256Hash"], "aa");
        assert_eq!(main["lastModified"], 1_700_000_000_000i64);
        assert_eq!(main["fileSize"], 10);
    }

    #[test]
    fn save_then_load_returns_the_same_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(Box::new(NoHiddenAttribute));
        let snapshot = sample();
        let path = store.save(dir.path(), &snapshot).unwrap();
        assert_eq!(path, dir.path().join(METADATA_FILE_NAME));
        assert_eq!(store.load(dir.path()), Some(snapshot));
    }

    #[test]
    fn missing_metadata_is_no_baseline() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SnapshotStore::default().load(dir.path()), None);
    }

    #[test]
    fn corrupt_metadata_is_no_baseline() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE_NAME), "{ not json").unwrap();
        assert_eq!(SnapshotStore::default().load(dir.path()), None);
    }

    struct Recording(Rc<RefCell<Vec<bool>>>);

    impl HiddenAttribute for Recording {
        fn set_hidden(&self, _path: &Path, hidden: bool) -> io::Result<()> {
            self.0.borrow_mut().push(hidden);
            Ok(())
        }
    }

    #[test]
    fn existing_file_is_unhidden_before_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let store = SnapshotStore::new(Box::new(Recording(Rc::clone(&calls))));

        store.save(dir.path(), &sample()).unwrap();
        assert_eq!(*calls.borrow(), vec![true]);

        store.save(dir.path(), &sample()).unwrap();
        assert_eq!(*calls.borrow(), vec![true, false, true]);
    }

    struct Failing;

    impl HiddenAttribute for Failing {
        fn set_hidden(&self, _path: &Path, _hidden: bool) -> io::Result<()> {
            Err(io::Error::other("attribute not supported"))
        }
    }

    #[test]
    fn attribute_failures_do_not_fail_the_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(Box::new(Failing));
        store.save(dir.path(), &sample()).unwrap();
        store.save(dir.path(), &sample()).unwrap();
        assert!(store.load(dir.path()).is_some());
    }
}
