//! Cross-platform filesystem wrapper.
//!
//! The rest of the crate goes through these helpers instead of touching the
//! platform APIs directly, so the call-sites stay identical across OSes.
//! Hard-link creation in particular has two backends: `link(2)` on POSIX and
//! `CreateHardLinkW` (via `std::fs::hard_link`) on Windows.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

#[cfg(unix)]
/// Set POSIX permission bits on Unix.
pub fn set_unix_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
/// No-op on non-Unix targets: POSIX permission bits are not preserved.
pub fn set_unix_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Restore a file's modification time.
pub fn set_file_mtime(path: &Path, mtime: SystemTime) -> io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(mtime)
}

#[cfg(unix)]
/// Create a hard link at `link` pointing to the existing `target`.
pub fn create_hard_link(target: &Path, link: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let target_c = CString::new(target.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL byte in path"))?;
    let link_c = CString::new(link.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL byte in path"))?;

    // SAFETY: both pointers reference NUL-terminated buffers that outlive the call.
    let rc = unsafe { libc::link(target_c.as_ptr(), link_c.as_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
/// Create a hard link at `link` pointing to the existing `target`.
pub fn create_hard_link(target: &Path, link: &Path) -> io::Result<()> {
    fs::hard_link(target, link)
}
