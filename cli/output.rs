use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use projcat_core::{ExportReport, ScanOutcome};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};

pub fn human_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize JSON output")?;
    write_to_stdout(&content)
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

pub fn print_export_summary(report: &ExportReport, incremental: bool) {
    println!();
    let title = if incremental {
        " Incremental Export Summary "
    } else {
        " Export Summary "
    };
    println!("{}", title.green().bold().underline());
    println!(
        "{:<20} {}",
        "Files Changed:".green(),
        report.files_changed.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Files Skipped:".green(),
        report.files_skipped.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Output Size:".green(),
        human_size(report.total_size_bytes).cyan()
    );
    if let Some(tokens) = report.estimated_token_count {
        println!("{:<20} {}", "Est. Tokens:".green(), tokens.to_string().cyan());
    }
    println!(
        "{:<20} {} ms",
        "Time:".green(),
        report.processing_time_ms.to_string().cyan()
    );
    if report.unreadable_files > 0 {
        println!(
            "{:<20} {}",
            "Unreadable:".yellow(),
            report.unreadable_files.to_string().yellow()
        );
    }
    for pattern in &report.invalid_patterns {
        println!("{} invalid pattern skipped: {}", "!".yellow(), pattern.yellow());
    }

    if report.output_files.is_empty() {
        println!("\n{}", "(No files changed; no bundles written)".yellow());
    } else {
        println!("\n{}", " Bundles ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Bundle").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
        ]);
        for bundle in &report.output_files {
            let size = fs::metadata(bundle).map(|m| human_size(m.len())).unwrap_or_default();
            let name = bundle
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| bundle.display().to_string());
            table.add_row(vec![
                Cell::new(name).fg(Color::Cyan),
                Cell::new(size)
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
            ]);
        }
        println!("{table}");
    }
    println!(
        "{:<20} {}",
        "Structure:".green(),
        report.project_structure_file.display().to_string().dimmed()
    );
    println!(
        "{:<20} {}",
        "Metadata:".green(),
        report.metadata_file.display().to_string().dimmed()
    );
    println!();
}

pub fn print_scan_summary(
    candidates: &[String],
    pruned_dirs: &[String],
    invalid_patterns: &[String],
    outcome: &ScanOutcome,
) {
    for path in candidates {
        println!("{}", path);
    }
    eprintln!();
    eprintln!(
        "{} {} candidates from {} entries, {} pruned directories, {} binary, {} oversize, {} unreadable, {} walk errors",
        "Scan:".green().bold(),
        candidates.len().to_string().cyan(),
        outcome.entries_visited,
        pruned_dirs.len(),
        outcome.rejected_binary,
        outcome.rejected_oversize,
        outcome.unreadable,
        outcome.walk_errors
    );
    for dir in pruned_dirs {
        eprintln!("  {} {}", "pruned".dimmed(), dir.blue());
    }
    for pattern in invalid_patterns {
        eprintln!("  {} {}", "invalid pattern".yellow(), pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_uses_binary_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(2048), "2 KiB");
        assert_eq!(human_size(3 * 1024 * 1024), "3 MiB");
    }
}
