use crate::cli_args::ScanArgs;
use crate::commands::export::build_request;
use crate::output;
use crate::{load_config_for_command, load_default_rules};
use anyhow::{Context, Result};
use log;
use projcat_core::{Config, Exporter, ScanPlan};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanSummary<'a> {
    project_root: String,
    output_dir: String,
    candidates: Vec<String>,
    pruned_dirs: &'a [String],
    exclude_patterns: &'a BTreeSet<String>,
    include_extensions: &'a BTreeSet<String>,
    invalid_patterns: &'a [String],
    entries_visited: usize,
    walk_errors: usize,
    unreadable: usize,
    rejected_binary: usize,
    rejected_oversize: usize,
}

impl<'a> ScanSummary<'a> {
    fn from_plan(plan: &'a ScanPlan) -> Self {
        ScanSummary {
            project_root: plan.project_root.display().to_string(),
            output_dir: plan.output_dir.display().to_string(),
            candidates: plan.candidate_paths(),
            pruned_dirs: &plan.outcome.pruned_dirs,
            exclude_patterns: &plan.rule_set.exclude_patterns,
            include_extensions: &plan.rule_set.include_extensions,
            invalid_patterns: &plan.invalid_patterns,
            entries_visited: plan.outcome.entries_visited,
            walk_errors: plan.outcome.walk_errors,
            unreadable: plan.outcome.unreadable,
            rejected_binary: plan.outcome.rejected_binary,
            rejected_oversize: plan.outcome.rejected_oversize,
        }
    }
}

pub fn handle_scan_command(args: ScanArgs) -> Result<()> {
    let plan = plan_for(&args)?;
    let summary = ScanSummary::from_plan(&plan);
    if args.format == "json" {
        output::print_json(&summary)
    } else {
        output::print_scan_summary(
            &summary.candidates,
            summary.pruned_dirs,
            summary.invalid_patterns,
            &plan.outcome,
        );
        Ok(())
    }
}

/// Resolves config and rules for a read-only command and walks the project.
pub fn plan_for(args: &ScanArgs) -> Result<ScanPlan> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config)
        .context("Failed to load configuration")?;
    let defaults = load_default_rules(&args.project_config)?;
    let request = build_request(&project_root, &config, &args.rules)?;

    Exporter::new(&defaults, &config)
        .plan(&request)
        .with_context(|| format!("Failed to scan {}", project_root.display()))
}
