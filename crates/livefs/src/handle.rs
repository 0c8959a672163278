//! Per-file handles over the two layers.
//!
//! A [`LiveFile`] always owns a destination handle and, while migration is
//! still underway, a read-only source handle. Reads that fall on a hole
//! are served from the source and immediately written back to the
//! destination ("promotion"), so every byte is fetched from the source at
//! most once per range. Writes and truncates go to the destination alone.
//!
//! One mutex per handle serializes every read, write, truncate, and fill
//! step; the guarded region spans both the I/O and the hole-list update so
//! a reader can never observe a hole list that is ahead of the data on
//! disk.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use extent::{Extent, ExtentList};
use fs2::FileExt as _;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::fs::Shared;

pub(crate) struct HandleState {
    pub holes: ExtentList,
}

/// An open file in the live-restore namespace.
///
/// The handle is exclusively owned by its opener. The destination is
/// authoritative for size and, once a range has been written or promoted,
/// for its bytes.
pub struct LiveFile {
    name: PathBuf,
    readonly: bool,
    dest: File,
    source: Option<File>,
    state: Mutex<HandleState>,
    shared: Arc<Shared>,
}

impl LiveFile {
    pub(crate) fn new(
        name: PathBuf,
        readonly: bool,
        dest: File,
        source: Option<File>,
        holes: ExtentList,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            name,
            readonly,
            dest,
            source,
            state: Mutex::new(HandleState { holes }),
            shared,
        }
    }

    /// The logical name this handle was opened with.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Whether the destination is authoritative for every byte.
    ///
    /// Once `true` the source is never consulted again for this handle;
    /// the hole list is necessarily empty.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.source.is_none()
    }

    /// Snapshot of the remaining holes, in offset order.
    #[must_use]
    pub fn holes(&self) -> Vec<Extent> {
        self.lock_state().holes.iter().collect()
    }

    /// Total bytes still to be populated from the source.
    #[must_use]
    pub fn hole_bytes(&self) -> u64 {
        self.lock_state().holes.hole_bytes()
    }

    /// Destination size; authoritative for the logical file.
    pub fn size(&self) -> Result<u64> {
        Ok(self.dest.metadata()?.len())
    }

    /// Reads `buf.len()` bytes at `offset`.
    ///
    /// Serves from the destination whenever it is authoritative for the
    /// range; otherwise reads the source and promotes the result so the
    /// next read of the range stays local.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut state = self.lock_state();
        let serviceable = self.complete() || state.holes.can_service(offset, buf.len() as u64);
        if serviceable {
            read_exact_at(&self.dest, buf, offset)?;
            return Ok(());
        }

        let Some(source) = self.source.as_ref() else {
            return Err(Error::InvalidInput(format!(
                "hole at offset {offset} with no source handle for {}",
                self.name.display()
            )));
        };
        trace!(name = %self.name.display(), offset, len = buf.len(), "promoting read from source");
        read_exact_at(source, buf, offset)?;
        self.promote(&mut state, offset, buf)?;
        Ok(())
    }

    /// Writes `buf` at `offset`.
    ///
    /// The destination write is made durable before the hole list records
    /// the range as populated; a crash in between leaves the hole in
    /// place and the range is re-fetched from the source on the next
    /// read.
    pub fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        if self.readonly {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "handle is read-only",
            )));
        }
        let mut state = self.lock_state();
        self.promote(&mut state, offset, buf)
    }

    /// Destination write + durability sync + hole subtraction, in that
    /// order, with the state lock already held.
    fn promote(&self, state: &mut HandleState, offset: u64, buf: &[u8]) -> Result<()> {
        write_all_at(&self.dest, buf, offset)?;
        self.dest.sync_data()?;
        state.holes.remove_range(offset, buf.len() as u64);
        Ok(())
    }

    /// Truncates (or extends) the destination to `len` bytes.
    ///
    /// The source is never truncated; bytes in an extended range read as
    /// zeros from the destination from here on.
    pub fn truncate(&self, len: u64) -> Result<()> {
        if self.readonly {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "handle is read-only",
            )));
        }
        let mut state = self.lock_state();
        let current = self.dest.metadata()?.len();
        if len == current {
            return Ok(());
        }
        let (lo, hi) = (len.min(current), len.max(current));
        debug!(name = %self.name.display(), from = current, to = len, "truncating destination");
        state.holes.remove_range(lo, hi - lo);
        self.dest.set_len(len)?;
        Ok(())
    }

    /// Flushes destination data and metadata to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.dest.sync_all()?;
        Ok(())
    }

    /// Takes an advisory lock on the destination file.
    ///
    /// The source layer is shared and read-only; it is never locked.
    pub fn lock(&self, exclusive: bool) -> Result<()> {
        if exclusive {
            self.dest.lock_exclusive()?;
        } else {
            self.dest.lock_shared()?;
        }
        Ok(())
    }

    /// Releases an advisory lock taken with [`LiveFile::lock`].
    pub fn unlock(&self) -> Result<()> {
        self.dest.unlock()?;
        Ok(())
    }

    /// Memory-mapping is not part of this layer's contract.
    pub fn map(&self) -> Result<()> {
        Err(Error::NotSupported("memory mapping"))
    }

    /// Access-pattern advice is not part of this layer's contract.
    pub fn advise(&self) -> Result<()> {
        Err(Error::NotSupported("access-pattern advice"))
    }

    /// Preallocation is not part of this layer's contract.
    pub fn extend(&self) -> Result<()> {
        Err(Error::NotSupported("preallocation"))
    }

    /// Closes the handle.
    ///
    /// With the fill-on-close debug option set, every remaining hole is
    /// promoted first so the closed destination file is self-sufficient.
    pub fn close(self) -> Result<()> {
        if self.shared.options.fill_on_close() && !self.complete() {
            let filled = self.fill_holes()?;
            debug!(name = %self.name.display(), bytes = filled, "filled holes at close");
        }
        Ok(())
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, HandleState> {
        match self.state.lock() {
            Ok(guard) => guard,
            // A hole is only ever removed after its bytes are durable, so
            // the list a panicked holder left behind is still valid.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl std::fmt::Debug for LiveFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFile")
            .field("name", &self.name)
            .field("readonly", &self.readonly)
            .field("complete", &self.complete())
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(not(unix))]
fn read_exact_at(mut file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

#[cfg(not(unix))]
fn write_all_at(mut file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::io::{Seek, SeekFrom, Write};
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)
}
