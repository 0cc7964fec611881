//! ISO-9660 decode layer.
//!
//! A bounded, sequential reader over ISO-9660 images with Rock Ridge
//! extensions (alternate names, POSIX modes, timestamps, symlinks). The
//! directory tree is indexed once at open time; entries are then served as a
//! forward-only stream in the archive's native stored order, with hard links
//! synthesized for records that share a data extent.

mod entry;
mod handle;
mod reader;
mod record;
mod susp;
mod volume;
mod walk;

pub use entry::{normalize_path, Entry, EntryKind};
pub use handle::IsoHandle;
pub use reader::IsoReader;
