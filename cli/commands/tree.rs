use crate::cli_args::ScanArgs;
use crate::commands::scan::plan_for;
use crate::output;
use anyhow::Result;
use projcat_core::render_ascii_tree;

pub fn handle_tree_command(args: ScanArgs) -> Result<()> {
    let plan = plan_for(&args)?;
    let structure = plan.structure();
    if args.format == "json" {
        output::print_json(&structure)
    } else {
        let name = plan
            .project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| plan.project_root.display().to_string());
        output::write_to_stdout(&format!(
            "{}/\n{}",
            name,
            render_ascii_tree(&structure.structure)
        ))
    }
}
