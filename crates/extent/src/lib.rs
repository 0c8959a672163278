#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `extent` tracks which byte ranges of a destination file have not yet been
//! populated from its read-only source. The tracked ranges are called
//! *holes*: a hole is a range the destination cannot serve on its own. Every
//! write into the destination subtracts from the hole set, so the structure
//! only ever shrinks between open and close.
//!
//! # Design
//!
//! Holes are kept as an ordered singly linked list of [`Extent`] nodes. The
//! subtract-only workload never requires merging or rebalancing: a write
//! either removes whole nodes, trims one end of a node, or splits a node in
//! two. [`ExtentList::remove_range`] implements that algebra and
//! [`ExtentList::can_service`] answers whether a read is serviceable from
//! the destination alone.
//!
//! # Invariants
//!
//! For every list, after any sequence of operations:
//!
//! - Nodes are in strictly increasing offset order.
//! - No two nodes overlap or touch: `end(h[i]) < h[i+1].offset`, where
//!   `end` is the inclusive last byte of a hole.
//! - Every node has a non-zero length.
//!
//! Callers are expected to issue reads that are either disjoint from every
//! hole or fully contained in one; a read that straddles a hole boundary is
//! a caller bug and [`ExtentList::can_service`] panics on it.

mod list;

pub use list::{Extent, ExtentList};
