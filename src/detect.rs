//! Distribution detection over an image, without extraction.
//!
//! Probes a short list of well-known files through [`IsoReader`]: bootloader
//! environment files first (they carry an explicit name/version), then
//! distribution release files matched against a static pattern table. A
//! `NotFound` from any single probe just means "try the next candidate".

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::iso::{normalize_path, IsoReader};

/// Which probe identified the distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Grubenv,
    ReleaseFile,
}

/// A detected distribution, e.g. `"Fedora 39"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub name: String,
    pub source: DetectionSource,
}

/// Candidate bootloader environment files, most common locations first.
const GRUBENV_PATHS: &[&str] = &[
    "boot/grub2/grubenv",
    "boot/grub/grubenv",
    "EFI/BOOT/grubenv",
    "EFI/fedora/grubenv",
];

/// Candidate release files.
const RELEASE_PATHS: &[&str] = &[
    "etc/os-release",
    "usr/lib/os-release",
    "etc/lsb-release",
    ".disk/info",
    "etc/system-release",
];

/// Lowercase content pattern to display name. More specific derivatives come
/// before the distributions they are based on.
const DISTRIBUTIONS: &[(&str, &str)] = &[
    ("linux mint", "Linux Mint"),
    ("manjaro", "Manjaro"),
    ("rocky", "Rocky Linux"),
    ("almalinux", "AlmaLinux"),
    ("centos", "CentOS"),
    ("red hat", "Red Hat Enterprise Linux"),
    ("fedora", "Fedora"),
    ("ubuntu", "Ubuntu"),
    ("debian", "Debian"),
    ("opensuse", "openSUSE"),
    ("suse", "SUSE"),
    ("alpine", "Alpine Linux"),
    ("gentoo", "Gentoo"),
    ("nixos", "NixOS"),
    ("arch", "Arch Linux"),
];

/// Identify the distribution an image carries, or `None` when no
/// identification file is present.
pub fn detect_distribution(image: &Path) -> Result<Option<Detection>> {
    let mut reader = IsoReader::open_image(image)?;

    if let Some(name) = probe_grubenv(&mut reader)? {
        debug!(name = %name, "identified via grubenv");
        return Ok(Some(Detection {
            name,
            source: DetectionSource::Grubenv,
        }));
    }

    if let Some(content) = probe_release_file(&mut reader)? {
        let name =
            classify_release(&content).unwrap_or_else(|| "Unknown Distribution".to_string());
        debug!(name = %name, "identified via release file");
        return Ok(Some(Detection {
            name,
            source: DetectionSource::ReleaseFile,
        }));
    }

    Ok(None)
}

/// Filesystem images inside the ISO (squashfs and friends) that the
/// surrounding application hands off to its container pipeline.
pub fn find_filesystem_images(image: &Path) -> Result<Vec<String>> {
    const EXTENSIONS: &[&str] = &["squashfs", "sfs", "img", "cramfs"];
    let mut reader = IsoReader::open_image(image)?;
    Ok(reader
        .list_files()?
        .into_iter()
        .filter(|path| {
            Path::new(path)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
                .unwrap_or(false)
        })
        .collect())
}

/// Try known grubenv locations, then fall back to scanning the listing for
/// any pathname containing "grubenv".
fn probe_grubenv(reader: &mut IsoReader) -> Result<Option<String>> {
    for candidate in GRUBENV_PATHS {
        if let Some(content) = read_text(reader, &normalize_path(candidate))? {
            if let Some(name) = parse_grubenv(&content) {
                return Ok(Some(name));
            }
        }
    }
    for path in reader.list_files()? {
        if path.to_lowercase().contains("grubenv") {
            if let Some(content) = read_text(reader, &path)? {
                if let Some(name) = parse_grubenv(&content) {
                    return Ok(Some(name));
                }
            }
        }
    }
    Ok(None)
}

/// Try known release-file locations, then fall back to scanning the listing
/// for pathnames containing "release" or "version".
fn probe_release_file(reader: &mut IsoReader) -> Result<Option<String>> {
    for candidate in RELEASE_PATHS {
        if let Some(content) = read_text(reader, &normalize_path(candidate))? {
            return Ok(Some(content));
        }
    }
    for path in reader.list_files()? {
        let lower = path.to_lowercase();
        if lower.contains("release") || lower.contains("version") {
            if let Some(content) = read_text(reader, &path)? {
                return Ok(Some(content));
            }
        }
    }
    Ok(None)
}

/// Read one candidate as text; `NotFound` (and unreadable content) means
/// "try the next one".
fn read_text(reader: &mut IsoReader, path: &str) -> Result<Option<String>> {
    match reader.read_file(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(ArchiveError::NotFound(_)) | Err(ArchiveError::TruncatedRead { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Parse a grub environment block: `NAME=` and `VERSION=` lines, quotes
/// stripped, joined as "NAME VERSION".
fn parse_grubenv(content: &str) -> Option<String> {
    let mut name = None;
    let mut version = None;
    for line in content.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("NAME=") {
            name = Some(value.replace('"', ""));
        } else if let Some(value) = line.strip_prefix("VERSION=") {
            version = Some(value.replace('"', ""));
        }
    }
    match (name, version) {
        (Some(name), Some(version)) if !name.is_empty() => Some(format!("{name} {version}")),
        (Some(name), None) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Match release-file content against the pattern table and append the first
/// version number found after the word "version", if any.
fn classify_release(content: &str) -> Option<String> {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    let version_re = VERSION_RE
        .get_or_init(|| Regex::new(r"(?i)version[^0-9]*([0-9][0-9.]*)").expect("static regex"));

    let lower = content.to_lowercase();
    for (pattern, name) in DISTRIBUTIONS {
        if !lower.contains(pattern) {
            continue;
        }
        let version = version_re
            .captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches('.').to_string());
        return Some(match version {
            Some(version) => format!("{name} {version}"),
            None => (*name).to_string(),
        });
    }
    None
}
