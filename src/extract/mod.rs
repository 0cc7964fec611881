//! # Extraction Module
//!
//! Copies every entry of an ISO-9660 image into a destination directory,
//! preserving timestamps and permission bits, re-creating hard links, and
//! reporting byte-granular progress through a caller-supplied sink.
//!
//! The algorithm is three passes over two decoder sessions:
//!
//! 1. **Sizing**: iterate every entry and sum the declared sizes of all
//!    non-hard-link entries (links share bytes with their target and must
//!    not be double-counted).
//! 2. **Extraction**: a fresh session (the stream is forward-only and cannot
//!    be rewound); directories and files are written as encountered, hard
//!    links are deferred, the stop flag is checked at entry boundaries.
//! 3. **Hard links**: materialized only after every regular entry is on
//!    disk, so a link's target is guaranteed to exist first.
//!
//! Entry-level write failures are reported and skipped; a single bad entry
//! must not abort extraction of thousands of others. Cancellation is always
//! fatal to the run.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::fsx;
use crate::iso::{Entry, EntryKind, IsoHandle};
use crate::progress::{ProgressFn, ProgressMeter};

const COPY_CHUNK: usize = 64 * 1024;

/// A hard link recorded during the extraction pass and materialized in the
/// final pass, once all regular file data exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHardlink {
    /// Pathname of the existing file this link points to.
    pub target: String,
    /// Pathname of the link to create.
    pub link: String,
}

/// Two-pass extraction of one image into one destination directory.
///
/// The destination directory must already exist; creating it is the
/// caller's responsibility.
pub struct ExtractionEngine {
    image: PathBuf,
    dest: PathBuf,
}

impl ExtractionEngine {
    pub fn new(image: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            dest: dest.into(),
        }
    }

    /// Run the full extraction. `progress` is invoked synchronously with
    /// `(percent, message)` after every data chunk; `stop` is the
    /// cooperative cancellation flag, observed at entry boundaries.
    ///
    /// On success the final callback reports 100% exactly once. On
    /// cancellation the run returns [`ArchiveError::Cancelled`] without a
    /// 100% callback.
    pub fn run(&self, progress: &ProgressFn, stop: &AtomicBool) -> Result<()> {
        let total = match self.compute_total_size() {
            Ok(total) => total,
            Err(err) => {
                progress(0, &err.to_string());
                return Err(err);
            }
        };
        debug!(total, image = %self.image.display(), "sizing pass complete");
        self.extract_entries(total, progress, stop)
    }

    /// Sizing pass: sum of declared sizes of all non-hard-link entries.
    fn compute_total_size(&self) -> Result<u64> {
        let mut handle = IsoHandle::new(&self.image);
        handle.open()?;
        let mut total: u64 = 0;
        while let Some(entry) = handle.next_entry()? {
            if !entry.is_hard_link() {
                total = total.saturating_add(entry.size);
            }
        }
        handle.close();
        Ok(total)
    }

    fn extract_entries(
        &self,
        total: u64,
        progress: &ProgressFn,
        stop: &AtomicBool,
    ) -> Result<()> {
        let mut handle = IsoHandle::new(&self.image);
        if let Err(err) = handle.open() {
            progress(0, &err.to_string());
            return Err(err);
        }

        let mut meter = ProgressMeter::new(total);
        let mut pending: Vec<PendingHardlink> = Vec::new();

        while let Some(entry) = handle.next_entry()? {
            if stop.load(Ordering::Relaxed) {
                info!(image = %self.image.display(), "stop requested, aborting extraction");
                return Err(ArchiveError::Cancelled);
            }

            if let EntryKind::HardLink { target } = &entry.kind {
                pending.push(PendingHardlink {
                    target: target.clone(),
                    link: entry.path.clone(),
                });
                continue;
            }

            let Some(out_path) = join_secure(&self.dest, &entry.path) else {
                warn!(path = %entry.path, "skipping entry with unsafe path");
                progress(
                    meter.percent(),
                    &format!("Skipping unsafe path: {}", entry.path),
                );
                continue;
            };

            let result = match &entry.kind {
                EntryKind::Directory => self.write_directory(&entry, &out_path),
                EntryKind::Symlink { target } => write_symlink(target, &out_path),
                EntryKind::File => {
                    self.write_file(&mut handle, &entry, &out_path, &mut meter, progress)
                }
                EntryKind::HardLink { .. } => Ok(()), // deferred above
            };

            // Best-effort: report, keep the percent where it was, move on.
            if let Err(err) = result {
                warn!(path = %entry.path, error = %err, "entry failed, continuing");
                progress(meter.percent(), &err.to_string());
            }
        }

        self.create_hard_links(&pending, &meter, progress);

        progress(100, "Extraction completed successfully");
        Ok(())
    }

    fn write_directory(&self, entry: &Entry, out_path: &Path) -> Result<()> {
        fs::create_dir_all(out_path).map_err(|source| ArchiveError::WriteFailed {
            path: out_path.to_path_buf(),
            source,
        })?;
        apply_metadata(entry, out_path);
        Ok(())
    }

    /// Stream one file's data to disk, chunk by chunk, reporting progress
    /// after each chunk.
    fn write_file(
        &self,
        handle: &mut IsoHandle,
        entry: &Entry,
        out_path: &Path,
        meter: &mut ProgressMeter,
        progress: &ProgressFn,
    ) -> Result<()> {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ArchiveError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut output = File::create(out_path).map_err(|source| ArchiveError::WriteFailed {
            path: out_path.to_path_buf(),
            source,
        })?;

        let mut buf = vec![0u8; COPY_CHUNK];
        let mut written: u64 = 0;
        loop {
            let got = handle.read_chunk(&mut buf)?;
            if got == 0 {
                break;
            }
            output
                .write_all(&buf[..got])
                .map_err(|source| ArchiveError::WriteFailed {
                    path: out_path.to_path_buf(),
                    source,
                })?;
            written += got as u64;
            let percent = meter.add(got as u64);
            progress(percent, &format!("Extracting: {}", entry.path));
        }
        drop(output);

        if written < entry.size {
            // Charge the missing bytes so the percent math stays honest.
            meter.add(entry.size - written);
            return Err(ArchiveError::TruncatedRead {
                path: entry.path.clone(),
                expected: entry.size,
                actual: written,
            });
        }

        apply_metadata(entry, out_path);
        Ok(())
    }

    /// Final pass: every link's target was written before any link is
    /// created. Failures are reported and skipped.
    fn create_hard_links(
        &self,
        pending: &[PendingHardlink],
        meter: &ProgressMeter,
        progress: &ProgressFn,
    ) {
        for hardlink in pending {
            let (Some(target), Some(link)) = (
                join_secure(&self.dest, &hardlink.target),
                join_secure(&self.dest, &hardlink.link),
            ) else {
                warn!(link = %hardlink.link, "skipping hard link with unsafe path");
                continue;
            };
            if let Err(err) = fsx::create_hard_link(&target, &link) {
                warn!(link = %hardlink.link, error = %err, "hard link failed");
                progress(
                    meter.percent(),
                    &format!("Failed to link {}: {err}", hardlink.link),
                );
            } else {
                debug!(link = %hardlink.link, target = %hardlink.target, "hard link created");
            }
        }
    }
}

/// Resolve an entry pathname under the destination directory, rejecting
/// absolute paths and any `..` component.
fn join_secure(dest: &Path, entry_path: &str) -> Option<PathBuf> {
    let mut out = dest.to_path_buf();
    let mut pushed = false;
    for component in Path::new(entry_path).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    pushed.then_some(out)
}

fn apply_metadata(entry: &Entry, out_path: &Path) {
    if let Some(mode) = entry.mode {
        if let Err(err) = fsx::set_unix_permissions(out_path, mode & 0o7777) {
            warn!(path = %out_path.display(), error = %err, "failed to set permissions");
        }
    }
    if let Some(mtime) = entry.mtime {
        if entry.kind == EntryKind::File {
            if let Err(err) = fsx::set_file_mtime(out_path, mtime) {
                warn!(path = %out_path.display(), error = %err, "failed to set mtime");
            }
        }
    }
}

#[cfg(unix)]
fn write_symlink(target: &str, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|source| ArchiveError::WriteFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::os::unix::fs::symlink(target, out_path).map_err(|source| ArchiveError::WriteFailed {
        path: out_path.to_path_buf(),
        source,
    })
}

#[cfg(not(unix))]
fn write_symlink(target: &str, out_path: &Path) -> Result<()> {
    warn!(path = %out_path.display(), target, "symlinks are not materialized on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_secure_rejects_escapes() {
        let dest = Path::new("/tmp/out");
        assert!(join_secure(dest, "../evil.txt").is_none());
        assert!(join_secure(dest, "a/../../evil.txt").is_none());
        assert!(join_secure(dest, "/etc/passwd").is_none());
        assert!(join_secure(dest, "").is_none());
    }

    #[test]
    fn join_secure_accepts_nested_relative_paths() {
        let dest = Path::new("/tmp/out");
        let joined = join_secure(dest, "boot/grub/grubenv").unwrap();
        assert_eq!(joined, Path::new("/tmp/out/boot/grub/grubenv"));
    }
}
