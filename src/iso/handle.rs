//! RAII handle over an open decoder session.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::iso::entry::Entry;
use crate::iso::walk::IsoDecoder;

/// Owns one read-only decoder session over an ISO-9660 image.
///
/// The decoder state is either closed (`None`) or open and positioned at the
/// start of the entry stream. `open` always leaves it in the latter state,
/// `close` in the former. The session is move-only: decoder state cannot be
/// duplicated, and dropping the handle releases it.
///
/// The underlying stream is forward-only; [`IsoHandle::reset`] (close then
/// reopen) is the only way back to the first entry.
#[derive(Debug)]
pub struct IsoHandle {
    path: PathBuf,
    decoder: Option<IsoDecoder>,
    last_error: String,
}

impl IsoHandle {
    /// Create a closed handle for the image at `path`. No I/O happens until
    /// [`IsoHandle::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            decoder: None,
            last_error: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.decoder.is_some()
    }

    /// The most recent diagnostic; empty if the last operation succeeded.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Open the image, closing any previously open state first.
    pub fn open(&mut self) -> Result<()> {
        self.close();
        match IsoDecoder::open(&self.path) {
            Ok(decoder) => {
                debug!(path = %self.path.display(), volume = decoder.volume_id(), "opened image");
                self.decoder = Some(decoder);
                self.last_error.clear();
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                self.last_error = reason.clone();
                Err(ArchiveError::OpenFailed {
                    path: self.path.clone(),
                    reason,
                })
            }
        }
    }

    /// Release the decoder state. A no-op when already closed.
    pub fn close(&mut self) {
        self.decoder = None;
    }

    /// Close and reopen, rewinding to the start of the entry stream.
    pub fn reset(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    /// The volume identifier of the open image.
    pub fn volume_id(&mut self) -> Result<String> {
        match self.decoder.as_ref() {
            Some(decoder) => Ok(decoder.volume_id().to_string()),
            None => Err(self.not_open()),
        }
    }

    /// Yield the next entry in the archive's native order, or `None` at the
    /// end of the stream.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        match self.decoder.as_mut() {
            Some(decoder) => Ok(decoder.next_entry()),
            None => Err(self.not_open()),
        }
    }

    /// Read the next chunk of the current entry's data into `buf`; `Ok(0)`
    /// when the entry is exhausted.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.decoder.as_mut() {
            Some(decoder) => Ok(decoder.read_chunk(buf)?),
            None => Err(self.not_open()),
        }
    }

    pub(crate) fn not_open(&mut self) -> ArchiveError {
        self.last_error = "image is not open".into();
        ArchiveError::OpenFailed {
            path: self.path.clone(),
            reason: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_reports_open_failed_and_last_error() {
        let mut handle = IsoHandle::new("/nonexistent/image.iso");
        let err = handle.open().unwrap_err();
        assert!(matches!(err, ArchiveError::OpenFailed { .. }));
        assert!(!handle.last_error().is_empty());
        assert!(!handle.is_open());
    }

    #[test]
    fn closed_handle_rejects_iteration() {
        let mut handle = IsoHandle::new("whatever.iso");
        assert!(handle.next_entry().is_err());
        assert_eq!(handle.last_error(), "image is not open");
    }

    #[test]
    fn close_is_idempotent() {
        let mut handle = IsoHandle::new("whatever.iso");
        handle.close();
        handle.close();
        assert!(!handle.is_open());
    }
}
