pub mod bundle;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod grouping;
pub mod hashing;
pub mod pipeline;
pub mod rules;
pub mod scanner;
pub mod snapshot;
pub mod structure;
pub mod transform;

pub use bundle::{BundleFormat, BundleOutput, OutputSpec, parse_size_limit, write_group};
pub use config::{Config, OutputConfig, RulesConfig, ScanConfig};
pub use diff::ChangeSet;
pub use error::{AppError, Result};
pub use filter::PathFilter;
pub use grouping::{ROOT_GROUP, group_by_top_folder};
pub use pipeline::{ExportReport, ExportRequest, Exporter, ScanPlan, resolve_output_dir};
pub use rules::{DefaultRules, NoStoredRules, RuleProvider, RuleSet};
pub use scanner::{DirVisit, ScanOptions, ScanOutcome};
pub use snapshot::{
    FileRecord, HiddenAttribute, METADATA_FILE_NAME, NoHiddenAttribute, Snapshot, SnapshotStore,
};
pub use structure::{ProjectStructure, STRUCTURE_FILE_NAME, StructureTree, render_ascii_tree};
