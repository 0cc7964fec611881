//! Entry records produced while iterating an open image.

use std::time::SystemTime;

/// What kind of record an [`Entry`] describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    /// Shares its data with an entry written earlier in the stream.
    /// `target` is the pathname of that first occurrence.
    HardLink { target: String },
    /// Rock Ridge symbolic link with its literal target string.
    Symlink { target: String },
}

/// One record in the image's directory structure, yielded in the archive's
/// native iteration order.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Pathname relative to the image root, normalized to the host
    /// platform's separator convention.
    pub path: String,
    /// Declared size in bytes. Zero for directories, links, and empty files.
    pub size: u64,
    pub kind: EntryKind,
    /// Recording timestamp, when the image carries one.
    pub mtime: Option<SystemTime>,
    /// POSIX permission bits from Rock Ridge, when present.
    pub mode: Option<u32>,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_hard_link(&self) -> bool {
        matches!(self.kind, EntryKind::HardLink { .. })
    }
}

/// Normalize a pathname to the host separator convention so callers can
/// compare paths reliably regardless of how the image (or the user) spells
/// them. Leading separators are dropped: entry paths are always relative.
pub fn normalize_path(path: &str) -> String {
    let (from, to) = if cfg!(windows) { ('/', '\\') } else { ('\\', '/') };
    let normalized: String = path
        .chars()
        .map(|c| if c == from { to } else { c })
        .collect();
    normalized.trim_start_matches(to).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(windows))]
    fn normalizes_backslashes_and_leading_separator() {
        assert_eq!(normalize_path("boot\\grub\\grubenv"), "boot/grub/grubenv");
        assert_eq!(normalize_path("/etc/os-release"), "etc/os-release");
        assert_eq!(normalize_path("plain.txt"), "plain.txt");
    }

    #[test]
    fn hard_link_predicate() {
        let entry = Entry {
            path: "b".into(),
            size: 0,
            kind: EntryKind::HardLink { target: "a".into() },
            mtime: None,
            mode: None,
        };
        assert!(entry.is_hard_link());
        assert!(!entry.is_file());
    }
}
