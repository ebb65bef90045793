use crate::error::{AppError, Result};
use crate::scanner::relative_posix;
use log;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const STRUCTURE_FILE_NAME: &str = "PROJECT_STRUCTURE.json";

/// Nested directory map. Directories map to a subtree, files map to `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureTree(pub BTreeMap<String, Option<StructureTree>>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    pub project_path: String,
    pub structure: StructureTree,
}

impl StructureTree {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts a `/`-separated relative path. A segment already present as a
    /// file is never turned into a directory.
    pub fn insert(&mut self, relative_path: &str) {
        let components: Vec<&str> = relative_path.split('/').filter(|c| !c.is_empty()).collect();
        self.insert_components(&components, relative_path);
    }

    fn insert_components(&mut self, components: &[&str], full_path: &str) {
        let Some((first, rest)) = components.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.0.entry(first.to_string()).or_insert(None);
            return;
        }
        match self
            .0
            .entry(first.to_string())
            .or_insert_with(|| Some(StructureTree::default()))
        {
            Some(subtree) => subtree.insert_components(rest, full_path),
            None => log::warn!(
                "Tree conflict: '{}' is a file, cannot add '{}' below it",
                first,
                full_path
            ),
        }
    }

    /// All file paths, `/`-separated, in key order.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.0 {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            match child {
                Some(subtree) => subtree.collect_paths(&path, out),
                None => out.push(path),
            }
        }
    }
}

pub fn export(root: &Path, files: &[PathBuf]) -> ProjectStructure {
    log::debug!("Building project structure from {} files...", files.len());
    let mut structure = StructureTree::default();
    for file in files {
        match relative_posix(root, file) {
            Some(rel) => structure.insert(&rel),
            None => log::warn!("Could not get relative path for: {}", file.display()),
        }
    }
    ProjectStructure {
        project_path: root.to_string_lossy().to_string(),
        structure,
    }
}

pub fn write(output_dir: &Path, project_structure: &ProjectStructure) -> Result<PathBuf> {
    let path = output_dir.join(STRUCTURE_FILE_NAME);
    let json = serde_json::to_string_pretty(project_structure)?;
    fs::write(&path, json).map_err(|e| AppError::FileWrite {
        path: path.clone(),
        source: e,
    })?;
    log::info!("Generated project structure: {}", path.display());
    Ok(path)
}

/// Box-drawing rendering of the tree. Directories carry a trailing `/`; no
/// trailing newline.
pub fn render_ascii_tree(tree: &StructureTree) -> String {
    let mut lines = Vec::new();
    render_level(tree, "", &mut lines);
    lines.join("\n")
}

fn render_level(tree: &StructureTree, indent: &str, lines: &mut Vec<String>) {
    let count = tree.0.len();
    for (i, (name, child)) in tree.0.iter().enumerate() {
        let is_last = i + 1 == count;
        let connector = if is_last { "└── " } else { "├── " };
        match child {
            Some(subtree) => {
                lines.push(format!("{}{}{}/", indent, connector, name));
                let child_indent = format!("{}{}", indent, if is_last { "    " } else { "│   " });
                render_level(subtree, &child_indent, lines);
            }
            None => lines.push(format!("{}{}{}", indent, connector, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files(root: &Path) -> Vec<PathBuf> {
        vec![
            root.join("src/main/App.java"),
            root.join("pom.xml"),
            root.join("src/Util.java"),
            root.join("docs/guide.md"),
        ]
    }

    #[test]
    fn flatten_reproduces_the_candidate_set() {
        let root = Path::new("/work/demo");
        let structure = export(root, &sample_files(root));
        let mut expected = vec![
            "docs/guide.md".to_string(),
            "pom.xml".to_string(),
            "src/Util.java".to_string(),
            "src/main/App.java".to_string(),
        ];
        expected.sort();
        assert_eq!(structure.structure.flatten(), expected);
    }

    #[test]
    fn serializes_as_nested_map_with_null_leaves() {
        let root = Path::new("/work/demo");
        let structure = export(root, &sample_files(root));
        let value = serde_json::to_value(&structure).unwrap();
        assert_eq!(value["projectPath"], "/work/demo");
        assert!(value["structure"]["pom.xml"].is_null());
        assert!(value["structure"]["src"]["main"]["App.java"].is_null());
        assert!(value["structure"]["src"]["Util.java"].is_null());
    }

    #[test]
    fn renders_sorted_ascii_tree() {
        let root = Path::new("/work/demo");
        let structure = export(root, &sample_files(root));
        let expected = "\
├── docs/
│   └── guide.md
├── pom.xml
└── src/
    ├── Util.java
    └── main/
        └── App.java";
        assert_eq!(render_ascii_tree(&structure.structure), expected);
    }

    #[test]
    fn empty_candidate_set_gives_empty_structure() {
        let structure = export(Path::new("/p"), &[]);
        assert!(structure.structure.is_empty());
        assert_eq!(render_ascii_tree(&structure.structure), "");
        let value = serde_json::to_value(&structure).unwrap();
        assert_eq!(value["structure"], serde_json::json!({}));
    }

    #[test]
    fn writes_pretty_json_into_the_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let structure = export(dir.path(), &[dir.path().join("a.txt")]);
        let path = write(dir.path(), &structure).unwrap();
        assert_eq!(path.file_name().unwrap(), STRUCTURE_FILE_NAME);
        let parsed: ProjectStructure =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, structure);
    }
}
