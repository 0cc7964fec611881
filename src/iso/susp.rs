//! SUSP / Rock Ridge system-use entries.
//!
//! Only the fields the extractor needs are honored: `NM` (alternate name),
//! `PX` (POSIX mode and link count), `TF` (modify timestamp), `SL` (symlink
//! target) and `CE` (continuation area). Unknown signatures are skipped by
//! their length field.
//!
//! # Invariants
//! - Entry lengths are untrusted; a length that runs past the area ends the
//!   scan instead of slicing out of bounds.
//! - Continuation chasing is the caller's job; `feed` only reports the `CE`
//!   location so the walker can bound the chain depth.

use std::time::SystemTime;

use crate::iso::volume::{decode_record_datetime, lsb_u32};

const NM_CONTINUE: u8 = 0x01;
const NM_CURRENT: u8 = 0x02;
const NM_PARENT: u8 = 0x04;

const TF_CREATION: u8 = 0x01;
const TF_MODIFY: u8 = 0x02;
const TF_LONG_FORM: u8 = 0x80;

const SL_COMPONENT_CONTINUE: u8 = 0x01;
const SL_COMPONENT_CURRENT: u8 = 0x02;
const SL_COMPONENT_PARENT: u8 = 0x04;
const SL_COMPONENT_ROOT: u8 = 0x08;

/// Rock Ridge attributes collected for one directory record.
#[derive(Debug, Default)]
pub(crate) struct RockRidge {
    pub name: Option<String>,
    pub mode: Option<u32>,
    pub nlink: Option<u32>,
    pub mtime: Option<SystemTime>,
    pub symlink: Option<String>,
}

/// Location of a `CE` continuation area: (block, offset, length).
pub(crate) type Continuation = (u32, u32, u32);

/// Incremental SUSP scanner. Feed it the record's system-use area, then any
/// continuation areas, then call [`SuspParser::finish`].
#[derive(Debug, Default)]
pub(crate) struct SuspParser {
    mode: Option<u32>,
    nlink: Option<u32>,
    mtime: Option<SystemTime>,
    name: String,
    name_done: bool,
    symlink: String,
    sl_component_open: bool,
    stopped: bool,
}

impl SuspParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one system-use area. Returns the continuation location if the
    /// area ends in a `CE` entry.
    pub fn feed(&mut self, area: &[u8]) -> Option<Continuation> {
        if self.stopped {
            return None;
        }

        let mut continuation = None;
        let mut pos = 0;
        while pos + 4 <= area.len() {
            let len = area[pos + 2] as usize;
            if len < 4 || pos + len > area.len() {
                break;
            }
            let entry = &area[pos..pos + len];
            match &entry[..2] {
                b"NM" if len >= 5 => self.feed_nm(entry),
                b"PX" if len >= 20 => {
                    self.mode = Some(lsb_u32(&entry[4..12]));
                    self.nlink = Some(lsb_u32(&entry[12..20]));
                }
                b"TF" if len >= 5 => self.feed_tf(entry),
                b"SL" if len >= 5 => self.feed_sl(entry),
                b"CE" if len >= 28 => {
                    continuation = Some((
                        lsb_u32(&entry[4..12]),
                        lsb_u32(&entry[12..20]),
                        lsb_u32(&entry[20..28]),
                    ));
                }
                b"ST" => {
                    self.stopped = true;
                    break;
                }
                // SP, ER, RR, PD, and vendor entries carry nothing we need.
                _ => {}
            }
            pos += len;
        }
        continuation
    }

    pub fn finish(self) -> RockRidge {
        RockRidge {
            name: if self.name.is_empty() {
                None
            } else {
                Some(self.name)
            },
            mode: self.mode,
            nlink: self.nlink,
            mtime: self.mtime,
            symlink: if self.symlink.is_empty() {
                None
            } else {
                Some(self.symlink)
            },
        }
    }

    fn feed_nm(&mut self, entry: &[u8]) {
        let flags = entry[4];
        if flags & (NM_CURRENT | NM_PARENT) != 0 || self.name_done {
            return;
        }
        self.name
            .push_str(&String::from_utf8_lossy(&entry[5..entry.len()]));
        self.name_done = flags & NM_CONTINUE == 0;
    }

    fn feed_tf(&mut self, entry: &[u8]) {
        let flags = entry[4];
        if flags & TF_LONG_FORM != 0 || flags & TF_MODIFY == 0 {
            // 17-byte stamps are rare enough to ignore.
            return;
        }
        let skip = if flags & TF_CREATION != 0 { 1 } else { 0 };
        let offset = 5 + skip * 7;
        if offset + 7 <= entry.len() {
            self.mtime = decode_record_datetime(&entry[offset..offset + 7]);
        }
    }

    fn feed_sl(&mut self, entry: &[u8]) {
        let mut pos = 5;
        while pos + 2 <= entry.len() {
            let cflags = entry[pos];
            let clen = entry[pos + 1] as usize;
            if pos + 2 + clen > entry.len() {
                break;
            }
            let body = &entry[pos + 2..pos + 2 + clen];
            if cflags & SL_COMPONENT_ROOT != 0 {
                self.symlink = "/".into();
                self.sl_component_open = false;
            } else if cflags & SL_COMPONENT_CURRENT != 0 {
                self.push_sl_component(".");
            } else if cflags & SL_COMPONENT_PARENT != 0 {
                self.push_sl_component("..");
            } else if self.sl_component_open {
                self.symlink.push_str(&String::from_utf8_lossy(body));
            } else {
                let text = String::from_utf8_lossy(body).into_owned();
                self.push_sl_component(&text);
            }
            self.sl_component_open = cflags & SL_COMPONENT_CONTINUE != 0;
            pos += 2 + clen;
        }
    }

    fn push_sl_component(&mut self, component: &str) {
        if !self.symlink.is_empty() && !self.symlink.ends_with('/') {
            self.symlink.push('/');
        }
        self.symlink.push_str(component);
    }
}
