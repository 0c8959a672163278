use std::path::{Path, PathBuf};

/// Default cap on concurrent background fill workers.
pub const DEFAULT_THREADS_MAX: usize = 8;

/// Mount-time options for a live-restore file system.
///
/// Read once at mount and immutable afterwards. Built with chained setters:
///
/// ```
/// use livefs::Options;
///
/// let options = Options::new("/backups/source")
///     .threads_max(4)
///     .fill_holes_on_close(true);
/// assert_eq!(options.threads(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct Options {
    source: PathBuf,
    threads_max: usize,
    fill_holes_on_close: bool,
}

impl Options {
    /// Creates options for the given source home directory.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            threads_max: DEFAULT_THREADS_MAX,
            fill_holes_on_close: false,
        }
    }

    /// Caps the number of concurrent background fill workers.
    ///
    /// A cap of zero is treated as one: a migration always makes progress.
    #[must_use]
    pub fn threads_max(mut self, threads_max: usize) -> Self {
        self.threads_max = threads_max;
        self
    }

    /// Debug aid: fill every remaining hole before a handle closes, so a
    /// closed file is always self-sufficient.
    #[must_use]
    pub fn fill_holes_on_close(mut self, fill: bool) -> Self {
        self.fill_holes_on_close = fill;
        self
    }

    /// The source home directory.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Effective worker cap, never zero.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads_max.max(1)
    }

    pub(crate) fn fill_on_close(&self) -> bool {
        self.fill_holes_on_close
    }
}
