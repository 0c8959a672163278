//! Merged directory listings across the two layers.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;
use crate::layer::Layers;
use crate::tombstone;

/// Lists the logical directory `dir`, returning basenames that start with
/// `prefix`, sorted and deduplicated.
///
/// Destination entries win; deletion markers are never listed; source
/// entries appear only when the destination neither holds nor has
/// tombstoned the same name. A directory missing on either side
/// contributes nothing.
pub(crate) fn merged(layers: &Layers, dir: &Path, prefix: Option<&OsStr>) -> Result<Vec<OsString>> {
    let dest_dir = layers.destination_path(dir);
    let source_dir = layers.source_path(dir);

    let mut entries = BTreeSet::new();
    for name in read_names(&dest_dir)? {
        if tombstone::is_marker(&name) || !matches_prefix(&name, prefix) {
            continue;
        }
        entries.insert(name);
    }

    for name in read_names(&source_dir)? {
        if tombstone::is_marker(&name) || !matches_prefix(&name, prefix) {
            continue;
        }
        if entries.contains(&name) {
            continue;
        }
        if tombstone::exists(&dest_dir.join(&name)) {
            continue;
        }
        entries.insert(name);
    }

    Ok(entries.into_iter().collect())
}

/// First eligible entry of the merged listing, if any.
pub(crate) fn merged_single(
    layers: &Layers,
    dir: &Path,
    prefix: Option<&OsStr>,
) -> Result<Option<OsString>> {
    Ok(merged(layers, dir, prefix)?.into_iter().next())
}

fn read_names(dir: &Path) -> Result<Vec<OsString>> {
    match fs::read_dir(dir) {
        Ok(iter) => {
            let mut names = Vec::new();
            for entry in iter {
                names.push(entry?.file_name());
            }
            Ok(names)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn matches_prefix(name: &OsStr, prefix: Option<&OsStr>) -> bool {
    match prefix {
        None => true,
        Some(prefix) => name
            .as_encoded_bytes()
            .starts_with(prefix.as_encoded_bytes()),
    }
}
