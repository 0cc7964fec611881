//! One-shot metadata and content queries over an image.
//!
//! Every query walks the forward-only entry stream from the start and resets
//! the handle afterwards, so repeated queries behave identically. That trades
//! efficiency for a stateless-feeling API meant for occasional probing (a
//! detection pass trying 3-4 candidate paths); bulk work belongs to the
//! extraction engine's own iteration.

use std::path::PathBuf;

use crate::error::{ArchiveError, Result};
use crate::iso::entry::{normalize_path, Entry, EntryKind};
use crate::iso::handle::IsoHandle;

const READ_CHUNK: usize = 64 * 1024;

/// Stateless-per-call query layer over one [`IsoHandle`].
#[derive(Debug)]
pub struct IsoReader {
    handle: IsoHandle,
}

impl IsoReader {
    /// Create a reader for the image at `path`; call [`IsoReader::open`]
    /// before querying.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            handle: IsoHandle::new(path),
        }
    }

    /// Create a reader and open it in one step.
    pub fn open_image(path: impl Into<PathBuf>) -> Result<Self> {
        let mut reader = Self::new(path);
        reader.open()?;
        Ok(reader)
    }

    pub fn open(&mut self) -> Result<()> {
        self.handle.open()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// The most recent diagnostic; empty if the last operation succeeded.
    pub fn last_error(&self) -> &str {
        self.handle.last_error()
    }

    /// Close and reopen the underlying handle, rewinding to the first entry.
    pub fn reset(&mut self) -> Result<()> {
        self.handle.reset()
    }

    /// Walk every entry collecting normalized pathnames in the archive's
    /// native directory order (not sorted). The handle is reset afterwards so
    /// the next query starts from the beginning again.
    pub fn list_files(&mut self) -> Result<Vec<String>> {
        Ok(self.list_entries()?.into_iter().map(|e| e.path).collect())
    }

    /// Like [`IsoReader::list_files`] but with full entry metadata.
    pub fn list_entries(&mut self) -> Result<Vec<Entry>> {
        if !self.handle.is_open() {
            return Err(self.handle_not_open());
        }
        let mut entries = Vec::new();
        while let Some(entry) = self.handle.next_entry()? {
            entries.push(entry);
        }
        self.handle.reset()?;
        Ok(entries)
    }

    /// Read the full content of the entry whose normalized path equals
    /// `path`. Hard-link entries resolve to their target's bytes. The handle
    /// is reset before returning, on every outcome.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        if !self.handle.is_open() {
            return Err(self.handle_not_open());
        }

        let mut wanted = normalize_path(path);
        // One redirect: a hard link points at an entry earlier in the
        // stream, so a second walk from the start is required.
        for _ in 0..2 {
            match self.find_and_read(&wanted)? {
                Lookup::Content(bytes) => return Ok(bytes),
                Lookup::Redirect(target) => {
                    wanted = target;
                    continue;
                }
                Lookup::Missing => break,
            }
        }
        Err(ArchiveError::NotFound(wanted))
    }

    fn find_and_read(&mut self, wanted: &str) -> Result<Lookup> {
        while let Some(entry) = self.handle.next_entry()? {
            if entry.path != wanted {
                continue;
            }
            match entry.kind {
                EntryKind::File => {
                    let content = self.read_current(&entry);
                    self.handle.reset()?;
                    return content.map(Lookup::Content);
                }
                EntryKind::HardLink { target } => {
                    self.handle.reset()?;
                    return Ok(Lookup::Redirect(target));
                }
                // A directory or symlink is not readable content.
                _ => continue,
            }
        }
        self.handle.reset()?;
        Ok(Lookup::Missing)
    }

    /// Read the current entry's declared size worth of data, verifying the
    /// decoder delivered every byte.
    fn read_current(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let expected = entry.size as usize;
        let mut content = Vec::with_capacity(expected);
        let mut buf = vec![0u8; READ_CHUNK.min(expected.max(1))];
        while content.len() < expected {
            let got = self.handle.read_chunk(&mut buf)?;
            if got == 0 {
                break;
            }
            content.extend_from_slice(&buf[..got]);
        }
        if content.len() != expected {
            return Err(ArchiveError::TruncatedRead {
                path: entry.path.clone(),
                expected: entry.size,
                actual: content.len() as u64,
            });
        }
        Ok(content)
    }

    fn handle_not_open(&mut self) -> ArchiveError {
        self.handle.not_open()
    }
}

enum Lookup {
    Content(Vec<u8>),
    Redirect(String),
    Missing,
}
