use crate::error::{AppError, Result};
use crate::scanner::relative_posix;
use crate::transform::{compact_whitespace, minify, strip_comments};
use byte_unit::Byte;
use log;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const MIB: u64 = 1024 * 1024;
pub const DEFAULT_MAX_BUNDLE_MB: u64 = 30;
pub const TREE_PREAMBLE_HEADER: &str = "PROJECT FILE TREE:\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleFormat {
    #[default]
    Plain,
    Tagged,
}

/// Formatting and sizing for one run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub max_bytes: u64,
    pub format: BundleFormat,
    pub include_header: bool,
    pub strip_comments: bool,
    pub compact_whitespace: bool,
    pub minify: bool,
    pub include_tree: bool,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BUNDLE_MB * MIB,
            format: BundleFormat::Plain,
            include_header: true,
            strip_comments: false,
            compact_whitespace: false,
            minify: false,
            include_tree: false,
        }
    }
}

impl OutputSpec {
    /// Applies comment stripping, then minification or whitespace compaction.
    pub fn transform(&self, content: &str) -> String {
        let stripped = if self.strip_comments || self.minify {
            strip_comments(content)
        } else {
            content.to_string()
        };
        if self.minify {
            minify(&stripped)
        } else if self.compact_whitespace {
            compact_whitespace(&stripped)
        } else {
            stripped
        }
    }

    /// Opening and closing text around one file's content.
    pub fn framing(&self, relative_path: &str) -> (String, &'static str) {
        if !self.include_header {
            return ("\n".to_string(), if self.minify { "\n" } else { "\n\n" });
        }
        match self.format {
            BundleFormat::Tagged => (format!("<file path=\"{}\">\n", relative_path), "</file>\n\n"),
            BundleFormat::Plain if self.minify => (format!("File: {}\n", relative_path), "\n"),
            BundleFormat::Plain => (format!("=== {} ===\n", relative_path), "\n\n"),
        }
    }
}

/// The text opening the first bundle of a run.
pub fn tree_preamble(ascii_tree: &str) -> String {
    format!("{}{}\n\n", TREE_PREAMBLE_HEADER, ascii_tree)
}

#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    pub files: Vec<PathBuf>,
    pub approx_tokens: u64,
    pub bytes_written: u64,
    /// Relative paths of the entries actually written, in order.
    pub written: Vec<String>,
    pub unreadable: usize,
}

/// Greedy single-pass split of one group into `{group_key}-{n}.txt` files.
///
/// A new bundle starts when nothing is open yet or when the next entry would
/// push the current one past `spec.max_bytes`. An entry larger than the limit
/// still goes whole into its own bundle.
pub fn write_group(
    group_key: &str,
    files: &[PathBuf],
    root: &Path,
    output_dir: &Path,
    spec: &OutputSpec,
    preamble: Option<&str>,
) -> Result<BundleOutput> {
    let mut output = BundleOutput::default();
    let mut writer: Option<BufWriter<File>> = None;
    let mut current_size: u64 = 0;
    let mut file_index: usize = 1;

    if let Some(preamble) = preamble {
        let mut w = open_bundle(output_dir, group_key, file_index, &mut output)?;
        file_index += 1;
        write_all(&mut w, preamble.as_bytes(), output.files.last())?;
        let size = preamble.len() as u64;
        current_size += size;
        output.bytes_written += size;
        output.approx_tokens += size / 4;
        writer = Some(w);
    }

    for path in files {
        let rel = relative_posix(root, path).unwrap_or_else(|| path.to_string_lossy().to_string());
        let content = match read_utf8(path) {
            Ok(content) => content,
            Err(reason) => {
                log::warn!("Skipping unreadable file {}: {}", rel, reason);
                output.unreadable += 1;
                continue;
            }
        };
        let body = spec.transform(&content);
        let (start, end) = spec.framing(&rel);
        let entry_size = (start.len() + body.len() + end.len()) as u64;

        if writer.is_none() || current_size + entry_size > spec.max_bytes {
            if let Some(mut previous) = writer.take() {
                flush(&mut previous, output.files.last())?;
            }
            if entry_size > spec.max_bytes {
                log::debug!(
                    "File {} ({} bytes) exceeds bundle size ({} bytes), putting it in its own bundle.",
                    rel,
                    entry_size,
                    spec.max_bytes
                );
            }
            writer = Some(open_bundle(output_dir, group_key, file_index, &mut output)?);
            file_index += 1;
            current_size = 0;
        }

        if let Some(w) = writer.as_mut() {
            let target = output.files.last();
            write_all(w, start.as_bytes(), target)?;
            write_all(w, body.as_bytes(), target)?;
            write_all(w, end.as_bytes(), target)?;
        }
        current_size += entry_size;
        output.bytes_written += entry_size;
        output.approx_tokens += entry_size / 4;
        log::trace!("Bundled {} ({} bytes)", rel, entry_size);
        output.written.push(rel);
    }

    if let Some(mut last) = writer.take() {
        flush(&mut last, output.files.last())?;
    }
    log::debug!(
        "Group '{}': {} entries in {} bundles",
        group_key,
        output.written.len(),
        output.files.len()
    );
    Ok(output)
}

fn open_bundle(
    output_dir: &Path,
    group_key: &str,
    index: usize,
    output: &mut BundleOutput,
) -> Result<BufWriter<File>> {
    let path = output_dir.join(format!("{}-{}.txt", group_key, index));
    let file = File::create(&path).map_err(|e| AppError::FileWrite {
        path: path.clone(),
        source: e,
    })?;
    log::info!("Created output file: {}", path.display());
    output.files.push(path);
    Ok(BufWriter::new(file))
}

fn write_all(writer: &mut BufWriter<File>, bytes: &[u8], target: Option<&PathBuf>) -> Result<()> {
    writer.write_all(bytes).map_err(|e| AppError::FileWrite {
        path: target.cloned().unwrap_or_default(),
        source: e,
    })
}

fn flush(writer: &mut BufWriter<File>, target: Option<&PathBuf>) -> Result<()> {
    writer.flush().map_err(|e| AppError::FileWrite {
        path: target.cloned().unwrap_or_default(),
        source: e,
    })
}

fn read_utf8(path: &Path) -> std::result::Result<String, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|_| "not valid UTF-8".to_string())
}

/// Parses a bundle or file size. Bare numbers are mebibytes; anything else
/// goes through byte-unit (`512KiB`, `2MB`, `1.5 GiB`).
pub fn parse_size_limit(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    if let Ok(megabytes) = trimmed.parse::<f64>() {
        if !megabytes.is_finite() || megabytes <= 0.0 {
            return Err(AppError::SizeParse(format!(
                "Size must be greater than 0, got '{}'",
                value
            )));
        }
        return Ok((megabytes * MIB as f64) as u64);
    }
    let bytes = Byte::from_str(trimmed)
        .map_err(|e| {
            AppError::SizeParse(format!(
                "Invalid size format '{}': {}. Use a number of MiB, or KB, MiB, etc.",
                value, e
            ))
        })?
        .as_u64();
    if bytes == 0 {
        return Err(AppError::SizeParse(format!(
            "Size must be greater than 0 bytes, got '{}'",
            value
        )));
    }
    Ok(bytes)
}
