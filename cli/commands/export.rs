use crate::cli_args::{BundleOpts, ExportArgs, RuleOpts};
use crate::output;
use crate::{load_config_for_command, load_default_rules};
use anyhow::{Context, Result};
use log;
use projcat_core::{Config, ExportRequest, Exporter, parse_size_limit};
use std::path::Path;

pub fn handle_export_command(args: ExportArgs, incremental: bool, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config)
        .context("Failed to load configuration")?;
    let defaults = load_default_rules(&args.project_config)?;

    let mut request = build_request(&project_root, &config, &args.rules)?;
    apply_bundle_opts(&mut request, &config, &args.bundles)?;
    request.incremental = incremental;

    let exporter = Exporter::new(&defaults, &config);
    let report = exporter
        .run(&request)
        .with_context(|| format!("Export of {} failed", project_root.display()))?;

    if args.json {
        output::print_json(&report)?;
    } else if !quiet {
        output::print_export_summary(&report, incremental);
    }
    Ok(())
}

/// Request carrying the config's stored values overlaid with the CLI's filtering options.
pub fn build_request(project_root: &Path, config: &Config, rules: &RuleOpts) -> Result<ExportRequest> {
    let mut request = ExportRequest::new(project_root);
    request.exclude_patterns = rules.exclude.clone();
    request.include_extensions = rules.include_extensions.clone();
    request.output_folder = config.output.folder.clone();
    request.max_file_bytes = match &rules.max_file_size {
        Some(size) => Some(parse_size_limit(size).context("Invalid --max-file-size")?),
        None => config.max_file_bytes(),
    };
    if !rules.selected_files.is_empty() {
        request.selected_files = Some(rules.selected_files.clone());
    }
    Ok(request)
}

fn apply_bundle_opts(request: &mut ExportRequest, config: &Config, opts: &BundleOpts) -> Result<()> {
    let stored = &config.output;
    if let Some(folder) = &opts.output_folder {
        request.output_folder = Some(folder.clone());
    }
    if let Some(size) = &opts.max_size {
        request.max_bundle_bytes = Some(parse_size_limit(size).context("Invalid --max-size")?);
    }
    request.use_tags = (stored.use_tags || opts.tags) && !opts.plain;
    request.include_header = stored.include_header && !opts.no_header;
    request.strip_comments = stored.strip_comments || opts.strip_comments;
    request.compact_whitespace = stored.compact_whitespace || opts.compact;
    request.minify = stored.minify || opts.minify;
    request.include_tree = stored.include_tree || opts.tree;
    request.estimate_tokens = stored.estimate_tokens || opts.tokens;
    log::trace!("Export request: {:?}", request);
    Ok(())
}
