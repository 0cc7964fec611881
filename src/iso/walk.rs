//! Forward-only entry stream over an ISO-9660 image.
//!
//! `IsoDecoder` reads the volume descriptors and directory tree once at open
//! time, producing a flat index in the archive's native stored order (records
//! in extent order, descending into a subdirectory at the point of its
//! record). Iteration and data reads are then served from that index; the
//! observable contract is the same forward-only header stream the original
//! decoder exposes.
//!
//! # Invariants
//! - Directory nesting depth and CE continuation chains are bounded.
//! - A directory extent is visited at most once (loop guard on extent LBA).
//! - A non-empty file record whose (extent, size) pair was already seen is a
//!   hard link to the first occurrence, never a second copy of the data.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, MAIN_SEPARATOR};

use crate::error::ArchiveError;
use crate::iso::entry::{Entry, EntryKind};
use crate::iso::record::{parse_record, RecordName};
use crate::iso::susp::{RockRidge, SuspParser};
use crate::iso::volume::{read_primary_volume, SECTOR_SIZE};

const MAX_DIRECTORY_DEPTH: usize = 32;
const MAX_CE_CHAIN: usize = 4;
const MAX_CE_AREA: u32 = (SECTOR_SIZE * 4) as u32;

#[derive(Debug)]
struct IndexedEntry {
    entry: Entry,
    extent: u64,
}

#[derive(Debug)]
struct DataState {
    /// Absolute byte offset of the next unread byte of the current entry.
    offset: u64,
    remaining: u64,
}

/// Decoder session over one open image file.
#[derive(Debug)]
pub(crate) struct IsoDecoder {
    file: File,
    volume_id: String,
    entries: Vec<IndexedEntry>,
    cursor: usize,
    current: Option<DataState>,
}

impl IsoDecoder {
    /// Open `path` and index its directory tree. Fails if the file is
    /// missing, unreadable, or not a recognizable ISO-9660 image.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;
        let volume = read_primary_volume(&mut file)?;
        let root = parse_record(&volume.root_record)?
            .ok_or_else(|| ArchiveError::Malformed("empty root directory record".into()))?;

        let mut decoder = Self {
            file,
            volume_id: volume.volume_id,
            entries: Vec::new(),
            cursor: 0,
            current: None,
        };

        let mut seen_extents = HashMap::new();
        let mut visited_dirs = HashSet::new();
        decoder.walk_directory(
            root.extent,
            root.size,
            String::new(),
            0,
            &mut seen_extents,
            &mut visited_dirs,
        )?;
        Ok(decoder)
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    /// Advance to the next entry in native order. The previous entry's
    /// unread data is abandoned.
    pub fn next_entry(&mut self) -> Option<Entry> {
        let indexed = self.entries.get(self.cursor)?;
        let entry = indexed.entry.clone();
        let offset = indexed.extent * SECTOR_SIZE as u64;
        self.cursor += 1;
        self.current = if entry.is_file() && entry.size > 0 {
            Some(DataState {
                offset,
                remaining: entry.size,
            })
        } else {
            None
        };
        Some(entry)
    }

    /// Read the next chunk of the current entry's data. Returns `Ok(0)` once
    /// the entry is exhausted, or early if the image itself is truncated.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(state) = self.current.as_mut() else {
            return Ok(0);
        };
        if state.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(state.remaining.min(usize::MAX as u64) as usize);
        self.file.seek(SeekFrom::Start(state.offset))?;
        let got = self.file.read(&mut buf[..want])?;
        if got == 0 {
            // Declared size runs past the end of the image.
            self.current = None;
            return Ok(0);
        }
        state.offset += got as u64;
        state.remaining -= got as u64;
        Ok(got)
    }

    fn walk_directory(
        &mut self,
        extent: u32,
        size: u32,
        prefix: String,
        depth: usize,
        seen_extents: &mut HashMap<(u32, u32), usize>,
        visited_dirs: &mut HashSet<u32>,
    ) -> Result<(), ArchiveError> {
        if depth > MAX_DIRECTORY_DEPTH {
            return Err(ArchiveError::Malformed(
                "directory nesting exceeds supported depth".into(),
            ));
        }
        if !visited_dirs.insert(extent) {
            return Ok(());
        }

        let mut data = vec![0u8; size as usize];
        self.file
            .seek(SeekFrom::Start(extent as u64 * SECTOR_SIZE as u64))?;
        let got = read_full(&mut self.file, &mut data)?;
        data.truncate(got);

        let mut pos = 0;
        while pos < data.len() {
            if data[pos] == 0 {
                // Rest of this sector is padding.
                pos = (pos / SECTOR_SIZE + 1) * SECTOR_SIZE;
                continue;
            }
            let sector_end = data.len().min((pos / SECTOR_SIZE + 1) * SECTOR_SIZE);
            let Some(record) = parse_record(&data[pos..sector_end])? else {
                pos = sector_end;
                continue;
            };
            pos += record.len;

            let iso_name = match record.name {
                RecordName::Current | RecordName::Parent => continue,
                RecordName::Name(name) => name,
            };

            let rock_ridge = self.collect_rock_ridge(&record.system_use);
            let name = rock_ridge.name.clone().unwrap_or(iso_name);
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}{MAIN_SEPARATOR}{name}")
            };

            if record.is_dir {
                self.push_entry(
                    Entry {
                        path: path.clone(),
                        size: 0,
                        kind: EntryKind::Directory,
                        mtime: rock_ridge.mtime.or(record.mtime),
                        mode: rock_ridge.mode,
                    },
                    record.extent,
                );
                self.walk_directory(
                    record.extent,
                    record.size,
                    path,
                    depth + 1,
                    seen_extents,
                    visited_dirs,
                )?;
            } else if let Some(target) = rock_ridge.symlink {
                self.push_entry(
                    Entry {
                        path,
                        size: 0,
                        kind: EntryKind::Symlink { target },
                        mtime: rock_ridge.mtime.or(record.mtime),
                        mode: rock_ridge.mode,
                    },
                    record.extent,
                );
            } else {
                let shared = record.size > 0;
                let key = (record.extent, record.size);
                if let Some(&first) = seen_extents.get(&key).filter(|_| shared) {
                    let target = self.entries[first].entry.path.clone();
                    self.push_entry(
                        Entry {
                            path,
                            size: 0,
                            kind: EntryKind::HardLink { target },
                            mtime: rock_ridge.mtime.or(record.mtime),
                            mode: rock_ridge.mode,
                        },
                        record.extent,
                    );
                } else {
                    if shared {
                        seen_extents.insert(key, self.entries.len());
                    }
                    self.push_entry(
                        Entry {
                            path,
                            size: record.size as u64,
                            kind: EntryKind::File,
                            mtime: rock_ridge.mtime.or(record.mtime),
                            mode: rock_ridge.mode,
                        },
                        record.extent,
                    );
                }
            }
        }
        Ok(())
    }

    fn push_entry(&mut self, entry: Entry, extent: u32) {
        self.entries.push(IndexedEntry {
            entry,
            extent: extent as u64,
        });
    }

    /// Run the SUSP parser over a record's system-use area, chasing a
    /// bounded chain of CE continuation areas.
    fn collect_rock_ridge(&mut self, system_use: &[u8]) -> RockRidge {
        let mut parser = SuspParser::new();
        let mut next = parser.feed(system_use);
        let mut chased = 0;
        while let Some((block, offset, length)) = next {
            if chased >= MAX_CE_CHAIN || length == 0 || length > MAX_CE_AREA {
                break;
            }
            let mut area = vec![0u8; length as usize];
            let at = block as u64 * SECTOR_SIZE as u64 + offset as u64;
            if self.file.seek(SeekFrom::Start(at)).is_err() {
                break;
            }
            let Ok(got) = read_full(&mut self.file, &mut area) else {
                break;
            };
            area.truncate(got);
            next = parser.feed(&area);
            chased += 1;
        }
        parser.finish()
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
