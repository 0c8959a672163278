#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `livefs` presents a single logical directory tree to a storage engine
//! while data is progressively migrated from a read-only **source** layer
//! into a writable **destination** layer. The engine reads, writes,
//! truncates, renames, and deletes as if every file lived fully in the
//! destination; the layer transparently serves un-migrated ranges from the
//! source, promotes what it reads, and records on each open file which
//! byte ranges remain to be copied. A background pass drains those ranges
//! so the destination eventually becomes self-sufficient and the source
//! can be detached.
//!
//! # Design
//!
//! - The two-layer namespace with deletion semantics lives in
//!   [`fs::LiveRestoreFs`]: destination entries shadow source entries, and
//!   zero-byte tombstone markers (destination-side path plus
//!   [`TOMBSTONE_SUFFIX`]) hide source copies of deleted names. Markers
//!   are plain files, so crash recovery is implicit.
//! - Un-migrated ranges are tracked per open file by the [`extent`]
//!   crate's subtract-only hole list, reconstructed on every open from the
//!   destination file's sparse layout.
//! - [`handle::LiveFile`] decides per read whether the destination is
//!   authoritative, falls back to the source otherwise, and writes the
//!   result back ("promotion"). Writes are made durable before the hole
//!   list records the range as populated.
//! - [`fill::migrate`] walks the merged namespace with a bounded worker
//!   pool and promotes every remaining hole.
//!
//! # Invariants
//!
//! - A hole is only ever removed from a file's list after the bytes it
//!   covered are durable in the destination.
//! - A tombstoned name is invisible in listings and existence checks even
//!   though the source still holds it; the source layer is never written.
//! - An open fails with [`Error::InvalidInput`] when the discovered hole
//!   list extends past the end of the source file, or when holes exist
//!   with no source to back them.
//!
//! # Errors
//!
//! Operations return [`Result`] with [`Error`]; OS failures propagate
//! verbatim through [`Error::Io`]. Contract violations by the caller
//! (names outside the destination home, reads straddling a hole boundary)
//! panic instead of erroring.

/// Mount-time options, read once and immutable afterwards.
pub mod config;
mod dirlist;
mod discover;
/// Error types for live-restore operations.
pub mod error;
/// Hole promotion: per-handle draining and the namespace-wide fill pass.
pub mod fill;
/// The mount-level file-system surface.
pub mod fs;
/// Per-file handles over the two layers.
pub mod handle;
mod layer;
mod sparse;
mod tombstone;

pub use config::Options;
pub use error::{Error, Result};
pub use fill::{FillSummary, migrate};
pub use fs::{FileType, LiveRestoreFs, OpenFlags};
pub use handle::LiveFile;
pub use layer::LayerKind;
pub use tombstone::TOMBSTONE_SUFFIX;
