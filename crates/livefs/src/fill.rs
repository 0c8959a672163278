//! Background promotion of un-migrated ranges.
//!
//! Two layers of machinery: [`LiveFile::fill_holes`] drains the hole list
//! of one open handle by issuing ordinary reads (each read promotes its
//! range as a side effect), and [`migrate`] walks the merged namespace and
//! runs a bounded worker pool over every file so the whole destination
//! becomes self-sufficient and the source can be detached.
//!
//! A migration expects to be the only writer; the engine's own handles to
//! the same files must be quiescent while it runs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fs::{FileType, LiveRestoreFs, OpenFlags};
use crate::handle::LiveFile;

/// Bytes promoted per background read.
pub(crate) const FILL_CHUNK: u64 = 4096;

impl LiveFile {
    /// Promotes every remaining hole of this handle, front to back.
    ///
    /// Each iteration re-reads the head of the hole list (foreground
    /// writes may have shrunk it in the meantime), promotes at most
    /// [`FILL_CHUNK`] bytes through the normal read path, and checks the
    /// mount's panic state, aborting with [`Error::Panicked`] when set.
    ///
    /// Returns the number of bytes promoted.
    pub fn fill_holes(&self) -> Result<u64> {
        let mut buf = [0u8; FILL_CHUNK as usize];
        let mut copied = 0u64;
        loop {
            if self.shared().panicked() {
                return Err(Error::Panicked);
            }
            let head = self.lock_state().holes.first();
            let Some(head) = head else {
                break;
            };
            let len = head.length.min(FILL_CHUNK);
            self.read(head.offset, &mut buf[..len as usize])?;
            copied += len;
        }
        Ok(copied)
    }
}

/// Totals reported by a completed [`migrate`] pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FillSummary {
    /// Files whose hole lists were drained (including already-complete
    /// files, which contribute zero bytes).
    pub files_filled: u64,
    /// Bytes promoted from source to destination.
    pub bytes_copied: u64,
    /// Bytes still unpopulated in files whose fill failed or aborted;
    /// zero after a clean pass.
    pub holes_remaining: u64,
}

/// Fills every hole of every file in the merged namespace.
///
/// Walks the namespace from the destination home, queues each regular
/// file, and drains the queue with up to `threads_max` workers. Stops at
/// the first error, or with [`Error::Panicked`] when the mount enters the
/// panic state mid-pass.
pub fn migrate(fs: &LiveRestoreFs) -> Result<FillSummary> {
    let files = collect_files(fs)?;
    let threads = fs.options().threads().min(files.len().max(1));
    info!(files = files.len(), threads, "starting live-restore fill pass");

    let (queue_tx, queue_rx) = crossbeam_channel::unbounded::<PathBuf>();
    for name in files {
        // The receiver outlives every send.
        let _ = queue_tx.send(name);
    }
    drop(queue_tx);

    let files_filled = AtomicU64::new(0);
    let bytes_copied = AtomicU64::new(0);
    let holes_remaining = AtomicU64::new(0);

    thread::scope(|scope| -> Result<()> {
        let mut workers = Vec::with_capacity(threads);
        for _ in 0..threads {
            let queue_rx = queue_rx.clone();
            let files_filled = &files_filled;
            let bytes_copied = &bytes_copied;
            let holes_remaining = &holes_remaining;
            workers.push(scope.spawn(move || -> Result<()> {
                while let Ok(name) = queue_rx.recv() {
                    let handle = fs.open(&name, FileType::Regular, OpenFlags::default())?;
                    match handle.fill_holes() {
                        Ok(copied) => {
                            handle.close()?;
                            debug!(name = %name.display(), copied, "filled file");
                            files_filled.fetch_add(1, Ordering::Relaxed);
                            bytes_copied.fetch_add(copied, Ordering::Relaxed);
                        }
                        Err(err) => {
                            let remaining = handle.hole_bytes();
                            holes_remaining.fetch_add(remaining, Ordering::Relaxed);
                            warn!(name = %name.display(), remaining, "fill failed");
                            return Err(err);
                        }
                    }
                }
                Ok(())
            }));
        }
        let mut first_error = None;
        for worker in workers {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => first_error = first_error.or(Some(err)),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    })?;

    let summary = FillSummary {
        files_filled: files_filled.into_inner(),
        bytes_copied: bytes_copied.into_inner(),
        holes_remaining: holes_remaining.into_inner(),
    };
    info!(
        files = summary.files_filled,
        bytes = summary.bytes_copied,
        remaining = summary.holes_remaining,
        "live-restore fill pass finished"
    );
    Ok(summary)
}

fn collect_files(fs: &LiveRestoreFs) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut dirs = vec![fs.destination_home().to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for name in fs.directory_list(&dir, None)? {
            let logical = dir.join(&name);
            if fs.is_directory(&logical)? {
                dirs.push(logical);
            } else {
                files.push(logical);
            }
        }
    }
    Ok(files)
}
