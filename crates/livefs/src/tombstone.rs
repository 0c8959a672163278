//! Deletion markers for the two-layer namespace.
//!
//! Removing a name that still exists in the read-only source cannot touch
//! the source, so the destination records the deletion as a zero-byte
//! sibling file: the destination-side path with [`TOMBSTONE_SUFFIX`]
//! appended. There is no in-memory index; whatever markers exist on disk
//! after a crash are the registry, which makes recovery implicit.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Suffix appended to a destination-side path to mark the name deleted.
pub const TOMBSTONE_SUFFIX: &str = ".deleted";

/// The marker path for a destination-side file path.
pub(crate) fn marker_path(dest_path: &Path) -> PathBuf {
    let mut os = dest_path.as_os_str().to_os_string();
    os.push(TOMBSTONE_SUFFIX);
    PathBuf::from(os)
}

/// Returns `true` when `name` is itself a deletion marker.
pub(crate) fn is_marker(name: &OsStr) -> bool {
    name.as_encoded_bytes()
        .ends_with(TOMBSTONE_SUFFIX.as_bytes())
}

/// Creates the marker for `dest_path`.
///
/// With `durable` set, both the marker and its parent directory are
/// synced before returning: the marker's directory entry must survive a
/// crash, or the source copy of a deleted name would resurface.
///
/// Creating an already-present marker is a no-op; the assertion "this name
/// is deleted" is idempotent.
pub(crate) fn create(dest_path: &Path, durable: bool) -> io::Result<()> {
    let marker = marker_path(dest_path);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&marker)?;
    if durable {
        file.sync_all()?;
        sync_parent_dir(&marker)?;
    }
    debug!(marker = %marker.display(), durable, "created tombstone");
    Ok(())
}

/// Flushes the directory entry for `path` to stable storage.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::File::open(parent)?.sync_all()?;
    }
    Ok(())
}

/// Directories cannot be opened for syncing on this platform; the marker
/// file itself is still synced.
#[cfg(not(unix))]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let _ = path;
    Ok(())
}

/// Queries whether a marker exists for `dest_path`.
pub(crate) fn exists(dest_path: &Path) -> bool {
    marker_path(dest_path).exists()
}
