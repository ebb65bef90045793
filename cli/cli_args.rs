use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        help = "Project directory to export (default: $PROJECT_ROOT or current dir).",
        value_name = "PROJECT"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Path or name of the TOML config file (default: .projcat/projcat.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Do not load any TOML config file.",
        conflicts_with = "config",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,

    #[arg(
        long,
        help = "Load the built-in default rules from this YAML file instead.",
        value_name = "YAML_FILE",
        help_heading = "Project Setup"
    )]
    pub defaults: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RuleOpts {
    #[arg(
        short = 'e',
        long = "exclude",
        help = "Glob to exclude (repeatable). Replaces the configured exclude list.",
        value_name = "GLOB",
        help_heading = "Filtering"
    )]
    pub exclude: Vec<String>,

    #[arg(
        short = 'i',
        long = "include-ext",
        help = "Extension to include, e.g. rs or .java (repeatable). Replaces the configured list.",
        value_name = "EXT",
        help_heading = "Filtering"
    )]
    pub include_extensions: Vec<String>,

    #[arg(
        long,
        help = "Skip files larger than this (e.g. 2, 512KiB, 1MB; bare numbers are MiB).",
        value_name = "SIZE",
        help_heading = "Filtering"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        long = "only",
        help = "Export only this project-relative path (repeatable).",
        value_name = "REL_PATH",
        help_heading = "Filtering"
    )]
    pub selected_files: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BundleOpts {
    #[arg(
        short = 'o',
        long = "output",
        help = "Base directory for the <project>_Concatenated_Output folder.",
        value_name = "DIR",
        help_heading = "Bundles"
    )]
    pub output_folder: Option<PathBuf>,

    #[arg(
        short = 's',
        long,
        help = "Maximum bundle size (e.g. 30, 512KiB, 2MB; bare numbers are MiB).",
        value_name = "SIZE",
        help_heading = "Bundles"
    )]
    pub max_size: Option<String>,

    #[arg(
        long,
        help = "Wrap files in <file path=\"...\"> tags.",
        conflicts_with = "plain",
        help_heading = "Bundles"
    )]
    pub tags: bool,

    #[arg(
        long,
        help = "Use === path === separators [default].",
        conflicts_with = "tags",
        help_heading = "Bundles"
    )]
    pub plain: bool,

    #[arg(long, help = "Omit the per-file header.", help_heading = "Bundles")]
    pub no_header: bool,

    #[arg(long, help = "Remove // and /* */ comments.", help_heading = "Bundles")]
    pub strip_comments: bool,

    #[arg(
        long,
        help = "Collapse runs of blank lines.",
        help_heading = "Bundles"
    )]
    pub compact: bool,

    #[arg(
        long,
        help = "Strip comments, drop blank lines and use minimal headers.",
        help_heading = "Bundles"
    )]
    pub minify: bool,

    #[arg(
        long,
        help = "Put an ASCII file tree at the top of the first bundle.",
        help_heading = "Bundles"
    )]
    pub tree: bool,

    #[arg(
        long,
        help = "Report an approximate token count (bytes / 4).",
        help_heading = "Bundles"
    )]
    pub tokens: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Export a project's source tree into size-bounded text bundles.",
    long_about = "projcat scans a project, filters files by glob and extension rules, and writes \nthem into a few size-bounded text bundles. Incremental runs re-export only the \nfiles whose SHA-256 changed since the previous run.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  projcat export ~/code/app --tree --tokens\n  projcat update ~/code/app\n  projcat scan -e 'docs/**' -i rs\n  projcat tree --format json",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "x",
        about = "Export the project into text bundles."
    )]
    Export(ExportArgs),

    #[command(
        visible_alias = "u",
        about = "Re-export only files changed since the last export."
    )]
    Update(ExportArgs),

    #[command(
        visible_alias = "s",
        about = "List the files an export would pick up, without writing anything."
    )]
    Scan(ScanArgs),

    #[command(visible_alias = "t", about = "Print the project file tree.")]
    Tree(ScanArgs),

    #[command(about = "Show or save the default configuration file.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub rules: RuleOpts,

    #[command(flatten)]
    pub bundles: BundleOpts,

    #[arg(
        long,
        help = "Skip files whose content hash matches the previous export."
    )]
    pub incremental: bool,

    #[arg(long, help = "Print the export report as JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub rules: RuleOpts,

    #[arg(
        short = 'f',
        long,
        help = "Output format.",
        value_name = "FORMAT",
        value_parser = ["text", "json"],
        default_value = "text"
    )]
    pub format: String,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        long,
        help = "Write the default config to .projcat/projcat.toml in the project (never overwrites)."
    )]
    pub save: bool,

    #[arg(
        help = "Project directory for --save (default: current dir).",
        value_name = "PROJECT"
    )]
    pub project_root: Option<PathBuf>,
}
