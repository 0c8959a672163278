//! The mount-level file-system surface.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use extent::ExtentList;
use tracing::{debug, info};

use crate::config::Options;
use crate::dirlist;
use crate::discover;
use crate::error::{Error, Result};
use crate::handle::LiveFile;
use crate::layer::{LayerKind, Layers};
use crate::tombstone;

/// File types accepted by [`LiveRestoreFs::open`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    /// A regular data file.
    Regular,
    /// A directory. Opening one is rejected; directories are validated
    /// through [`LiveRestoreFs::exist`] and the listing operations.
    Directory,
}

/// Flags accepted by [`LiveRestoreFs::open`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenFlags {
    /// Create the file when it exists in neither layer.
    pub create: bool,
    /// Reject writes and truncates through the returned handle.
    pub readonly: bool,
    /// Make creation (of files and tombstones) durable before returning.
    pub durable: bool,
    /// Fail when the name already exists in either visible layer.
    pub exclusive: bool,
}

/// State shared by a mount and every handle opened through it.
pub(crate) struct Shared {
    pub layers: Layers,
    pub options: Options,
    panic: AtomicBool,
}

impl Shared {
    pub fn panicked(&self) -> bool {
        self.panic.load(Ordering::Acquire)
    }
}

/// A live-restore mount: one writable destination home backed by one
/// read-only source home.
///
/// Cloning is cheap and shares the mount state; background fill workers
/// operate on clones. All configuration is fixed at mount time.
#[derive(Clone)]
pub struct LiveRestoreFs {
    shared: Arc<Shared>,
}

impl LiveRestoreFs {
    /// Mounts `destination` over the source home named in `options`.
    ///
    /// Both homes must exist as directories.
    pub fn mount(destination: impl Into<PathBuf>, options: Options) -> Result<Self> {
        let destination = destination.into();
        for (role, home) in [("destination", destination.as_path()), ("source", options.source())] {
            if !fs::metadata(home).map(|meta| meta.is_dir()).unwrap_or(false) {
                return Err(Error::InvalidInput(format!(
                    "{role} home {} is not a directory",
                    home.display()
                )));
            }
        }
        info!(
            destination = %destination.display(),
            source = %options.source().display(),
            threads_max = options.threads(),
            "mounted live-restore file system"
        );
        let layers = Layers {
            destination,
            source: options.source().to_path_buf(),
        };
        Ok(Self {
            shared: Arc::new(Shared {
                layers,
                options,
                panic: AtomicBool::new(false),
            }),
        })
    }

    /// The destination home; every logical name starts with it.
    #[must_use]
    pub fn destination_home(&self) -> &Path {
        &self.shared.layers.destination
    }

    /// The mount options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.shared.options
    }

    /// Opens (or creates) the named file.
    ///
    /// When the destination already holds the file, its hole list is
    /// rediscovered from the sparse layout. When only the source holds
    /// it, a same-sized sparse destination file is materialized behind a
    /// single whole-file hole. When neither holds it, `create` makes a
    /// fresh, already-complete destination file; otherwise the open fails
    /// with [`Error::NotFound`].
    pub fn open(
        &self,
        name: impl AsRef<Path>,
        file_type: FileType,
        flags: OpenFlags,
    ) -> Result<LiveFile> {
        if file_type == FileType::Directory {
            return Err(Error::NotSupported("directory open"));
        }
        let name = name.as_ref();
        let layers = &self.shared.layers;
        let dest_path = layers.destination_path(name);
        let source_path = layers.source_path(name);

        let tombstoned = tombstone::exists(&dest_path);
        let source_len = if tombstoned {
            None
        } else {
            match fs::metadata(&source_path) {
                Ok(meta) if meta.is_file() => Some(meta.len()),
                Ok(_) => None,
                Err(err) if err.kind() == io::ErrorKind::NotFound => None,
                Err(err) => return Err(err.into()),
            }
        };

        let dest_exists = dest_path.try_exists()?;
        if flags.exclusive && (dest_exists || source_len.is_some()) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", name.display()),
            )));
        }

        // The destination handle is opened for writing even on read-only
        // opens: promotions write through it.
        if !dest_exists && (source_len.is_some() || flags.create) {
            // Files in subdirectories materialize before their directory
            // does; the destination tree grows as needed.
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let (dest, holes) = if dest_exists {
            let dest = OpenOptions::new().read(true).write(true).open(&dest_path)?;
            let holes = discover::holes_of(&dest, source_len)?;
            debug!(
                name = %name.display(),
                holes = holes.len(),
                remaining = holes.hole_bytes(),
                "opened existing destination file"
            );
            (dest, holes)
        } else if let Some(len) = source_len {
            let dest = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&dest_path)?;
            dest.set_len(len)?;
            if flags.durable {
                dest.sync_all()?;
            }
            debug!(name = %name.display(), len, "materialized sparse destination backing file");
            (dest, ExtentList::whole(len))
        } else if flags.create {
            let dest = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&dest_path)?;
            if flags.durable {
                dest.sync_all()?;
            }
            debug!(name = %name.display(), "created destination file");
            (dest, ExtentList::new())
        } else {
            return Err(Error::NotFound {
                path: name.to_path_buf(),
            });
        };

        // The source handle is held whenever a source copy is visible,
        // even once the hole list is empty: the file still participates
        // in migration until the mount is retired.
        let source = match source_len {
            Some(_) => Some(File::open(&source_path)?),
            None => None,
        };

        Ok(LiveFile::new(
            name.to_path_buf(),
            flags.readonly,
            dest,
            source,
            holes,
            Arc::clone(&self.shared),
        ))
    }

    /// Whether the name exists in the merged namespace.
    ///
    /// A tombstoned name whose only copy lives in the source reports
    /// `false`.
    pub fn exist(&self, name: impl AsRef<Path>) -> Result<bool> {
        let name = name.as_ref();
        let layers = &self.shared.layers;
        let dest_path = layers.destination_path(name);
        if dest_path.try_exists()? {
            return Ok(true);
        }
        if tombstone::exists(&dest_path) {
            return Ok(false);
        }
        Ok(layers.source_path(name).try_exists()?)
    }

    /// Which layer physically holds the name, ignoring tombstones.
    pub fn locate(&self, name: impl AsRef<Path>) -> Result<Option<LayerKind>> {
        Ok(self.shared.layers.locate(name.as_ref())?)
    }

    /// Whether the name refers to a directory in either layer.
    pub fn is_directory(&self, name: impl AsRef<Path>) -> Result<bool> {
        let name = name.as_ref();
        let layers = &self.shared.layers;
        for path in [layers.destination_path(name), layers.source_path(name)] {
            match fs::metadata(&path) {
                Ok(meta) => return Ok(meta.is_dir()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(false)
    }

    /// Removes the name from the merged namespace.
    ///
    /// Deletes the destination copy when one exists and records a
    /// tombstone unconditionally, so a source copy stays hidden even
    /// though the source itself is never modified.
    pub fn remove(&self, name: impl AsRef<Path>, durable: bool) -> Result<()> {
        let name = name.as_ref();
        let dest_path = self.shared.layers.destination_path(name);
        match fs::remove_file(&dest_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tombstone::create(&dest_path, durable)?;
        debug!(name = %name.display(), "removed file");
        Ok(())
    }

    /// Renames `from` to `to` within the destination layer.
    ///
    /// Requires `from` to be materialized in the destination. Both names
    /// are tombstoned afterwards: `from` because its source copy is now
    /// stale, `to` so that a same-named source copy cannot resurface if
    /// the destination copy is later removed.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>, durable: bool) -> Result<()> {
        let from = from.as_ref();
        let to = to.as_ref();
        let layers = &self.shared.layers;
        let from_dest = layers.destination_path(from);
        let to_dest = layers.destination_path(to);

        if !from_dest.try_exists()? {
            return Err(Error::NotFound {
                path: from.to_path_buf(),
            });
        }
        fs::rename(&from_dest, &to_dest)?;
        tombstone::create(&from_dest, durable)?;
        tombstone::create(&to_dest, durable)?;
        debug!(from = %from.display(), to = %to.display(), "renamed file");
        Ok(())
    }

    /// Destination-side size of the name.
    ///
    /// The destination is authoritative for sizes; a name not yet
    /// materialized there reports [`Error::NotFound`].
    pub fn size(&self, name: impl AsRef<Path>) -> Result<u64> {
        let name = name.as_ref();
        let dest_path = self.shared.layers.destination_path(name);
        match fs::metadata(&dest_path) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(Error::NotFound {
                path: name.to_path_buf(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Merged listing of the logical directory `dir`: destination entries
    /// minus deletion markers, plus source entries that are neither
    /// shadowed nor tombstoned, filtered by `prefix` and sorted.
    pub fn directory_list(
        &self,
        dir: impl AsRef<Path>,
        prefix: Option<&OsStr>,
    ) -> Result<Vec<OsString>> {
        dirlist::merged(&self.shared.layers, dir.as_ref(), prefix)
    }

    /// First entry of the merged listing, if any.
    pub fn directory_list_single(
        &self,
        dir: impl AsRef<Path>,
        prefix: Option<&OsStr>,
    ) -> Result<Option<OsString>> {
        dirlist::merged_single(&self.shared.layers, dir.as_ref(), prefix)
    }

    /// Puts the mount into the panic state; background fill aborts at its
    /// next iteration.
    pub fn set_panic(&self) {
        self.shared.panic.store(true, Ordering::Release);
    }

    /// Whether the mount is in the panic state.
    #[must_use]
    pub fn panicked(&self) -> bool {
        self.shared.panicked()
    }

    /// Tears the mount down.
    ///
    /// Signals the panic state so in-flight background fill stops, then
    /// drops this clone. Handles already opened stay valid until closed.
    pub fn terminate(self) -> Result<()> {
        self.set_panic();
        info!(destination = %self.destination_home().display(), "terminated live-restore file system");
        Ok(())
    }
}

impl std::fmt::Debug for LiveRestoreFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveRestoreFs")
            .field("destination", &self.shared.layers.destination)
            .field("source", &self.shared.layers.source)
            .finish_non_exhaustive()
    }
}
