//! Reconstructing a file's hole list from its sparse layout at open time.

use std::fs::File;

use extent::ExtentList;
use tracing::trace;

use crate::error::{Error, Result};
use crate::sparse;

/// Walks the sparse layout of an existing destination file and returns the
/// ranges still to be populated from the source.
///
/// Starts from a single hole spanning the whole file and subtracts every
/// data range the scan reports. `source_len` is the size of the source
/// file when one is visible to this handle; the discovered list is
/// validated against it before the open is allowed to proceed.
pub(crate) fn holes_of(dest: &File, source_len: Option<u64>) -> Result<ExtentList> {
    let dest_len = dest.metadata()?.len();
    let mut holes = ExtentList::whole(dest_len);

    let mut offset = 0;
    while offset < dest_len {
        match sparse::next_data(dest, offset, dest_len)? {
            None => break,
            Some((start, end)) => {
                // A scan that stops advancing would loop forever.
                if end <= offset {
                    break;
                }
                trace!(start, end, "discovered data range");
                holes.remove_range(start, end - start);
                offset = end;
            }
        }
    }

    verify(&holes, source_len)?;
    Ok(holes)
}

/// Checks the open-time invariant on a hole list.
///
/// Every hole must be backed by source bytes: the last hole ends strictly
/// before the source end, and a file with no visible source has no holes
/// at all. A violation means reads could return undefined bytes, so the
/// open fails instead.
pub(crate) fn verify(holes: &ExtentList, source_len: Option<u64>) -> Result<()> {
    match (holes.last_end(), source_len) {
        (None, _) => Ok(()),
        (Some(_), None) => Err(Error::InvalidInput(
            "destination has unpopulated ranges but no source file exists".to_owned(),
        )),
        (Some(end), Some(len)) if end >= len => Err(Error::InvalidInput(format!(
            "hole list ends at offset {end} but the source file is only {len} bytes"
        ))),
        _ => Ok(()),
    }
}
