use std::path::{Path, PathBuf};

/// Which layer of the mount holds a given name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerKind {
    /// The writable layer that will become the authoritative copy.
    Destination,
    /// The read-only layer providing the initial data.
    Source,
}

/// The two homes of a mount and the logical-name arithmetic between them.
///
/// Logical names handed to the layer always begin with the destination
/// home; the source-side twin of a name is the destination-relative suffix
/// rebased onto the source home. A name outside the destination home is a
/// caller bug, not an I/O condition.
#[derive(Clone, Debug)]
pub(crate) struct Layers {
    pub destination: PathBuf,
    pub source: PathBuf,
}

impl Layers {
    fn relative<'name>(&self, name: &'name Path) -> &'name Path {
        match name.strip_prefix(&self.destination) {
            Ok(suffix) => suffix,
            Err(_) => panic!(
                "logical name {} is outside the destination home {}",
                name.display(),
                self.destination.display()
            ),
        }
    }

    /// The destination-side absolute path for a logical name.
    pub fn destination_path(&self, name: &Path) -> PathBuf {
        let _ = self.relative(name);
        name.to_path_buf()
    }

    /// The source-side absolute path for a logical name.
    pub fn source_path(&self, name: &Path) -> PathBuf {
        self.source.join(self.relative(name))
    }

    /// Probes destination then source for `name`.
    ///
    /// Tombstones are deliberately not consulted here; callers that need
    /// source-visibility semantics layer the tombstone check on top.
    pub fn locate(&self, name: &Path) -> std::io::Result<Option<LayerKind>> {
        if self.destination_path(name).try_exists()? {
            return Ok(Some(LayerKind::Destination));
        }
        if self.source_path(name).try_exists()? {
            return Ok(Some(LayerKind::Source));
        }
        Ok(None)
    }
}
