// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Support bundles: a single archive of orchestrator state for debugging.
//!
//! The archive (zip or tar+gzip) opens with a versioned JSON manifest
//! enumerating every file with its SHA-256 and redaction summary. All
//! content passes the redactor on the way in — the write-path collapse
//! applies, so a `warn` configuration still redacts bundled bytes.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{NtmError, Result};
use crate::redact::{redactor, RedactionMode};

/// Manifest schema version.
const SCHEMA_VERSION: u32 = 1;

/// Archive container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleFormat {
    #[default]
    Zip,
    TarGz,
}

impl BundleFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zip" => Some(Self::Zip),
            "tar.gz" | "targz" | "tgz" => Some(Self::TarGz),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// Collection filters recorded in the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    pub lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
}

/// Options for bundle creation.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub output: PathBuf,
    pub format: BundleFormat,
    pub session: Option<String>,
    pub since: Option<Duration>,
    /// Pane capture depth recorded in filters.
    pub lines: usize,
    pub max_size_bytes: Option<u64>,
    pub redaction: RedactionMode,
    /// Include every session's files, not just the named one.
    pub include_all: bool,
}

/// Per-file redaction summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRedaction {
    pub was_redacted: bool,
    pub finding_count: usize,
    pub categories: Vec<String>,
}

/// One manifest file entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub mod_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction: Option<FileRedaction>,
}

/// Bundle-wide redaction summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionSummary {
    pub mode: String,
    pub files_scanned: usize,
    pub files_redacted: usize,
    pub total_findings: usize,
    pub category_counts: std::collections::BTreeMap<String, usize>,
}

/// The versioned manifest, always the archive's first entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub ntm_version: String,
    pub host: HostInfo,
    pub filters: BundleFilters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub files: Vec<FileEntry>,
    pub redaction_summary: RedactionSummary,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

struct PreparedFile {
    path: String,
    content: Vec<u8>,
    entry: FileEntry,
}

/// Create a support bundle from the orchestrator state directory.
///
/// `extra` carries in-memory content (event history, pane captures) to
/// include alongside on-disk state.
pub fn create(
    state_dir: &Path,
    options: &BundleOptions,
    extra: Vec<(String, String)>,
) -> Result<Manifest> {
    let mut errors: Vec<String> = Vec::new();
    let mut prepared: Vec<PreparedFile> = Vec::new();
    let mut summary = RedactionSummary {
        mode: options.redaction.for_write_path().as_str().to_owned(),
        ..RedactionSummary::default()
    };
    let cutoff = options.since.map(|d| Utc::now() - d);

    let mut candidates: Vec<(String, Vec<u8>, DateTime<Utc>)> = Vec::new();
    for sub in ["history", "ensembles"] {
        collect_dir(&state_dir.join(sub), sub, &mut candidates, &mut errors);
    }
    for (name, content) in extra {
        candidates.push((name, content.into_bytes(), Utc::now()));
    }

    for (path, content, mod_time) in candidates {
        if let Some(cutoff) = cutoff {
            if mod_time < cutoff {
                continue;
            }
        }
        if let Some(session) = (!options.include_all)
            .then_some(options.session.as_deref())
            .flatten()
        {
            if !path.contains(session) {
                continue;
            }
        }
        if let Some(max) = options.max_size_bytes {
            if content.len() as u64 > max {
                errors.push(format!("{path}: skipped ({} bytes over cap)", content.len()));
                continue;
            }
        }

        // Redact on the way in. Binary-ish content passes through as-is.
        let (content, redaction) = match String::from_utf8(content) {
            Ok(text) => {
                let scan = redactor().apply(&text, options.redaction.for_write_path());
                summary.files_scanned += 1;
                let categories: Vec<String> =
                    scan.summary().into_iter().map(|(c, _)| c).collect();
                let finding_count = scan.findings.len();
                if finding_count > 0 {
                    summary.files_redacted += 1;
                    summary.total_findings += finding_count;
                    for (category, count) in scan.summary() {
                        *summary.category_counts.entry(category).or_default() += count;
                    }
                }
                (
                    scan.text.into_bytes(),
                    Some(FileRedaction {
                        was_redacted: finding_count > 0,
                        finding_count,
                        categories,
                    }),
                )
            }
            Err(raw) => (raw.into_bytes(), None),
        };

        let digest = Sha256::digest(&content);
        let sha256: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        prepared.push(PreparedFile {
            entry: FileEntry {
                path: path.clone(),
                sha256,
                size_bytes: content.len() as u64,
                content_type: content_type_for(&path).to_owned(),
                mod_time,
                redaction,
            },
            path,
            content,
        });
    }

    prepared.sort_by(|a, b| a.path.cmp(&b.path));

    let manifest = Manifest {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        ntm_version: env!("CARGO_PKG_VERSION").to_owned(),
        host: HostInfo {
            os: std::env::consts::OS.to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
        },
        filters: BundleFilters {
            since: options.since.map(|d| format!("{}h", d.num_hours())),
            lines: options.lines,
            max_size_bytes: options.max_size_bytes,
        },
        session: options.session.clone(),
        files: prepared.iter().map(|p| p.entry.clone()).collect(),
        redaction_summary: summary,
        errors,
    };

    match options.format {
        BundleFormat::Zip => write_zip(&options.output, &manifest, &prepared)?,
        BundleFormat::TarGz => write_tar_gz(&options.output, &manifest, &prepared)?,
    }
    Ok(manifest)
}

fn collect_dir(
    dir: &Path,
    prefix: &str,
    out: &mut Vec<(String, Vec<u8>, DateTime<Utc>)>,
    errors: &mut Vec<String>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            collect_dir(&path, &format!("{prefix}/{name}"), out, errors);
            continue;
        }
        match std::fs::read(&path) {
            Ok(content) => {
                let mod_time = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                out.push((format!("{prefix}/{name}"), content, mod_time));
            }
            Err(e) => errors.push(format!("{}: {e}", path.display())),
        }
    }
}

fn content_type_for(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("jsonl") => "application/jsonl",
        Some("out") | Some("txt") | Some("log") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn manifest_bytes(manifest: &Manifest) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(manifest)
        .map_err(|e| NtmError::Fatal(format!("manifest encode: {e}")))
}

fn write_zip(output: &Path, manifest: &Manifest, files: &[PreparedFile]) -> Result<()> {
    let file = std::fs::File::create(output)
        .map_err(|e| NtmError::Transient(format!("bundle create: {e}")))?;
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("manifest.json", opts)
        .map_err(|e| NtmError::Transient(format!("zip manifest: {e}")))?;
    zip.write_all(&manifest_bytes(manifest)?)
        .map_err(|e| NtmError::Transient(format!("zip manifest: {e}")))?;

    for prepared in files {
        zip.start_file(prepared.path.as_str(), opts)
            .map_err(|e| NtmError::Transient(format!("zip {}: {e}", prepared.path)))?;
        zip.write_all(&prepared.content)
            .map_err(|e| NtmError::Transient(format!("zip {}: {e}", prepared.path)))?;
    }
    zip.finish()
        .map_err(|e| NtmError::Transient(format!("zip finish: {e}")))?;
    Ok(())
}

fn write_tar_gz(output: &Path, manifest: &Manifest, files: &[PreparedFile]) -> Result<()> {
    let file = std::fs::File::create(output)
        .map_err(|e| NtmError::Transient(format!("bundle create: {e}")))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = tar::Builder::new(encoder);

    let manifest_bytes = manifest_bytes(manifest)?;
    append_tar_entry(&mut tar, "manifest.json", &manifest_bytes)?;
    for prepared in files {
        append_tar_entry(&mut tar, &prepared.path, &prepared.content)?;
    }
    tar.into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| NtmError::Transient(format!("tar finish: {e}")))?;
    Ok(())
}

fn append_tar_entry<W: Write>(
    tar: &mut tar::Builder<W>,
    path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append_data(&mut header, path, content)
        .map_err(|e| NtmError::Transient(format!("tar {path}: {e}")))
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod tests;
