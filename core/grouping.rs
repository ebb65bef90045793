use crate::scanner::relative_posix;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Group key for files directly under the project root.
pub const ROOT_GROUP: &str = "root";

/// Partitions `files` by their first path segment. Input order is kept within
/// each group; groups iterate sorted by key.
pub fn group_by_top_folder(files: &[PathBuf], root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let key = group_key(root, file);
        groups.entry(key).or_default().push(file.clone());
    }
    log::debug!("Grouped {} files into {} folders", files.len(), groups.len());
    groups
}

fn group_key(root: &Path, file: &Path) -> String {
    let rel = relative_posix(root, file).unwrap_or_default();
    match rel.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => ROOT_GROUP.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_first_segment_and_keeps_order() {
        let root = Path::new("/p");
        let files = vec![
            root.join("src/b/Two.java"),
            root.join("README.md"),
            root.join("docs/guide.md"),
            root.join("src/a/One.java"),
            root.join("pom.xml"),
        ];
        let groups = group_by_top_folder(&files, root);
        assert_eq!(
            groups.keys().collect::<Vec<_>>(),
            vec!["docs", "root", "src"]
        );
        assert_eq!(groups["src"], vec![files[0].clone(), files[3].clone()]);
        assert_eq!(groups["root"], vec![files[1].clone(), files[4].clone()]);
    }

    #[test]
    fn no_files_no_groups() {
        assert!(group_by_top_folder(&[], Path::new("/p")).is_empty());
    }
}
