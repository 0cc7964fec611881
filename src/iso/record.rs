//! Directory record parsing.
//!
//! # Invariants
//! - Records never cross a sector boundary; a zero length byte means the
//!   rest of the sector is padding.
//! - Size and offset fields are untrusted; anything that would slice out of
//!   bounds is malformed, not a panic.

use std::time::SystemTime;

use crate::error::ArchiveError;
use crate::iso::volume::{decode_record_datetime, lsb_u32};

const FLAG_DIRECTORY: u8 = 0x02;

/// Minimum legal directory record: 33 fixed bytes + 1 identifier byte.
const MIN_RECORD_LEN: usize = 34;

/// The file identifier of a directory record.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RecordName {
    /// The `.` self record (identifier byte 0x00).
    Current,
    /// The `..` parent record (identifier byte 0x01).
    Parent,
    Name(String),
}

#[derive(Debug)]
pub(crate) struct DirectoryRecord {
    /// Total record length including padding, for advancing the cursor.
    pub len: usize,
    /// Extent location in logical blocks.
    pub extent: u32,
    /// Extent data length in bytes.
    pub size: u32,
    pub is_dir: bool,
    pub name: RecordName,
    pub mtime: Option<SystemTime>,
    /// System use area, handed to the SUSP/Rock Ridge parser.
    pub system_use: Vec<u8>,
}

/// Parse one directory record from the front of `buf`.
///
/// Returns `Ok(None)` on a zero length byte (sector padding).
pub(crate) fn parse_record(buf: &[u8]) -> Result<Option<DirectoryRecord>, ArchiveError> {
    if buf.is_empty() || buf[0] == 0 {
        return Ok(None);
    }

    let len = buf[0] as usize;
    if len < MIN_RECORD_LEN || len > buf.len() {
        return Err(ArchiveError::Malformed(format!(
            "directory record length {len} out of bounds"
        )));
    }

    let extent = lsb_u32(&buf[2..10]);
    let size = lsb_u32(&buf[10..18]);
    let mtime = decode_record_datetime(&buf[18..25]);
    let flags = buf[25];

    let id_len = buf[32] as usize;
    if id_len == 0 || 33 + id_len > len {
        return Err(ArchiveError::Malformed(
            "directory record identifier out of bounds".into(),
        ));
    }
    let id_bytes = &buf[33..33 + id_len];

    let name = match id_bytes {
        [0x00] => RecordName::Current,
        [0x01] => RecordName::Parent,
        _ => RecordName::Name(decode_identifier(id_bytes)),
    };

    // A pad byte follows even-length identifiers.
    let system_use_offset = 33 + id_len + (1 - id_len % 2);
    let system_use = if system_use_offset < len {
        buf[system_use_offset..len].to_vec()
    } else {
        Vec::new()
    };

    Ok(Some(DirectoryRecord {
        len,
        extent,
        size,
        is_dir: flags & FLAG_DIRECTORY != 0,
        name,
        mtime,
        system_use,
    }))
}

/// Decode an ISO-9660 identifier: strip the `;N` version suffix and a bare
/// trailing separator dot. Names that are all dots are left alone.
fn decode_identifier(raw: &[u8]) -> String {
    let mut name = String::from_utf8_lossy(raw).into_owned();
    if let Some(pos) = name.rfind(';') {
        name.truncate(pos);
    }
    if name.ends_with('.') && !name.trim_end_matches('.').is_empty() {
        name.pop();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_bytes(extent: u32, size: u32, flags: u8, id: &[u8]) -> Vec<u8> {
        let pad = 1 - id.len() % 2;
        let len = 33 + id.len() + pad;
        let mut buf = vec![0u8; len];
        buf[0] = len as u8;
        buf[2..6].copy_from_slice(&extent.to_le_bytes());
        buf[6..10].copy_from_slice(&extent.to_be_bytes());
        buf[10..14].copy_from_slice(&size.to_le_bytes());
        buf[14..18].copy_from_slice(&size.to_be_bytes());
        buf[18..25].copy_from_slice(&[124, 1, 1, 0, 0, 0, 0]);
        buf[25] = flags;
        buf[28] = 1;
        buf[30] = 1;
        buf[32] = id.len() as u8;
        buf[33..33 + id.len()].copy_from_slice(id);
        buf
    }

    #[test]
    fn parses_a_file_record() {
        let buf = record_bytes(40, 5, 0, b"README.TXT;1");
        let rec = parse_record(&buf).unwrap().unwrap();
        assert_eq!(rec.extent, 40);
        assert_eq!(rec.size, 5);
        assert!(!rec.is_dir);
        assert_eq!(rec.name, RecordName::Name("README.TXT".into()));
        assert!(rec.mtime.is_some());
    }

    #[test]
    fn recognizes_self_and_parent_records() {
        let rec = parse_record(&record_bytes(20, 2048, 0x02, &[0x00]))
            .unwrap()
            .unwrap();
        assert_eq!(rec.name, RecordName::Current);
        assert!(rec.is_dir);

        let rec = parse_record(&record_bytes(19, 2048, 0x02, &[0x01]))
            .unwrap()
            .unwrap();
        assert_eq!(rec.name, RecordName::Parent);
    }

    #[test]
    fn zero_length_byte_is_padding() {
        assert!(parse_record(&[0u8; 64]).unwrap().is_none());
    }

    #[test]
    fn oversized_record_is_malformed() {
        let mut buf = record_bytes(1, 1, 0, b"A");
        buf[0] = 200;
        assert!(parse_record(&buf).is_err());
    }

    #[test]
    fn identifier_version_and_dot_stripping() {
        assert_eq!(decode_identifier(b"DATA.BIN;1"), "DATA.BIN");
        assert_eq!(decode_identifier(b"NOEXT.;1"), "NOEXT");
        assert_eq!(decode_identifier(b"plain.txt"), "plain.txt");
        assert_eq!(decode_identifier(b".."), "..");
    }
}
