//! Volume descriptor parsing.
//!
//! # Invariants
//! - All multi-byte numeric fields are ISO-9660 both-endian (LSB-MSB); only
//!   the little-endian half is read.
//! - Descriptor scanning is bounded: it stops at the set terminator or after
//!   a fixed number of sectors, whichever comes first.

use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ArchiveError;

/// Logical sector size. Images with a different logical block size are
/// rejected rather than guessed at.
pub const SECTOR_SIZE: usize = 2048;

/// First sector of the volume descriptor set.
pub const DESCRIPTOR_SET_LBA: u64 = 16;

/// Upper bound on descriptor set scanning for malformed images.
const MAX_DESCRIPTORS: u64 = 64;

const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

const TYPE_PRIMARY: u8 = 1;
const TYPE_TERMINATOR: u8 = 255;

/// Read the little-endian half of a both-endian 16-bit field.
pub(crate) fn lsb_u16(field: &[u8]) -> u16 {
    u16::from_le_bytes([field[0], field[1]])
}

/// Read the little-endian half of a both-endian 32-bit field.
pub(crate) fn lsb_u32(field: &[u8]) -> u32 {
    u32::from_le_bytes([field[0], field[1], field[2], field[3]])
}

/// The fields of the primary volume descriptor the walker needs.
#[derive(Debug)]
pub(crate) struct PrimaryVolume {
    pub volume_id: String,
    pub block_size: u16,
    /// Raw bytes of the 34-byte root directory record.
    pub root_record: Vec<u8>,
}

/// Scan the descriptor set starting at sector 16 and return the primary
/// volume descriptor.
pub(crate) fn read_primary_volume<R: Read + Seek>(
    reader: &mut R,
) -> Result<PrimaryVolume, ArchiveError> {
    let mut sector = vec![0u8; SECTOR_SIZE];
    let mut primary = None;

    for lba in DESCRIPTOR_SET_LBA..DESCRIPTOR_SET_LBA + MAX_DESCRIPTORS {
        reader.seek(SeekFrom::Start(lba * SECTOR_SIZE as u64))?;
        reader.read_exact(&mut sector).map_err(|_| {
            ArchiveError::Malformed(format!("descriptor set ends early at sector {lba}"))
        })?;

        if &sector[1..6] != STANDARD_IDENTIFIER {
            return Err(ArchiveError::Malformed(format!(
                "missing CD001 signature at sector {lba}"
            )));
        }

        match sector[0] {
            TYPE_PRIMARY => {
                if primary.is_none() {
                    primary = Some(parse_primary(&sector)?);
                }
            }
            TYPE_TERMINATOR => break,
            // Supplementary (Joliet), boot record, partition: not consumed.
            _ => {}
        }
    }

    primary.ok_or_else(|| ArchiveError::Malformed("no primary volume descriptor".into()))
}

fn parse_primary(sector: &[u8]) -> Result<PrimaryVolume, ArchiveError> {
    let block_size = lsb_u16(&sector[128..132]);
    if block_size as usize != SECTOR_SIZE {
        return Err(ArchiveError::Malformed(format!(
            "unsupported logical block size {block_size}"
        )));
    }

    let volume_id = String::from_utf8_lossy(&sector[40..72]).trim_end().to_string();

    let root_len = sector[156] as usize;
    if root_len < 34 || 156 + root_len > SECTOR_SIZE {
        return Err(ArchiveError::Malformed(
            "invalid root directory record".into(),
        ));
    }
    let root_record = sector[156..156 + root_len].to_vec();

    Ok(PrimaryVolume {
        volume_id,
        block_size,
        root_record,
    })
}

/// Decode the 7-byte directory record timestamp (years since 1900, month,
/// day, hour, minute, second, GMT offset in 15-minute units). An all-zero
/// field means "not recorded".
pub(crate) fn decode_record_datetime(raw: &[u8]) -> Option<SystemTime> {
    if raw.len() < 7 || raw[..7].iter().all(|&b| b == 0) {
        return None;
    }

    let year = 1900 + raw[0] as i32;
    let month = time::Month::try_from(raw[1]).ok()?;
    let date = time::Date::from_calendar_date(year, month, raw[2]).ok()?;
    let tod = time::Time::from_hms(raw[3], raw[4], raw[5]).ok()?;
    let offset = time::UtcOffset::from_whole_seconds(raw[6] as i8 as i32 * 900).ok()?;

    let stamp = time::PrimitiveDateTime::new(date, tod)
        .assume_offset(offset)
        .unix_timestamp();

    if stamp >= 0 {
        Some(UNIX_EPOCH + Duration::from_secs(stamp as u64))
    } else {
        Some(UNIX_EPOCH - Duration::from_secs(stamp.unsigned_abs()))
    }
}
