//! Data/hole scanning of sparse destination files.
//!
//! The destination keeps un-migrated ranges as file-system holes, so the
//! sparse layout of a file is the persistent form of its hole list. This
//! module exposes the one primitive hole discovery needs: the next
//! populated range at or after a given offset.

use std::fs::File;
use std::io;

/// Locates the next data range `[start, end)` at or after `offset`,
/// clamped to `len`. Returns `Ok(None)` when no data remains.
#[cfg(unix)]
pub(crate) fn next_data(file: &File, offset: u64, len: u64) -> io::Result<Option<(u64, u64)>> {
    use std::os::unix::io::AsRawFd;

    if offset >= len {
        return Ok(None);
    }
    let fd = file.as_raw_fd();
    let Some(start) = seek(fd, offset, libc::SEEK_DATA)? else {
        return Ok(None);
    };
    if start >= len {
        return Ok(None);
    }
    let end = match seek(fd, start, libc::SEEK_HOLE)? {
        Some(end) => end.min(len),
        None => len,
    };
    Ok(Some((start, end)))
}

/// `lseek` wrapper mapping the past-last-extent `ENXIO` answer to `None`.
#[cfg(unix)]
#[allow(unsafe_code)]
fn seek(fd: std::os::unix::io::RawFd, offset: u64, whence: libc::c_int) -> io::Result<Option<u64>> {
    // SAFETY: lseek only repositions the descriptor; the fd is open for the
    // lifetime of the borrowed `File` and no memory is passed to the kernel.
    let pos = unsafe { libc::lseek(fd, offset as libc::off_t, whence) };
    if pos < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENXIO) {
            return Ok(None);
        }
        return Err(err);
    }
    Ok(Some(pos as u64))
}

/// Fallback for platforms without `SEEK_DATA`: report the remainder of the
/// file as one data range, i.e. a fully populated destination.
#[cfg(not(unix))]
pub(crate) fn next_data(file: &File, offset: u64, len: u64) -> io::Result<Option<(u64, u64)>> {
    let _ = file;
    Ok((offset < len).then_some((offset, len)))
}
