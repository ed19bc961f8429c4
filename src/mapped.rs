//! Memory-mapped access to image files

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::{Mmap, MmapMut};

use crate::error::Result;

/// Map an image for in-place modification.
///
/// The caller must be the only writer of the file while the map lives.
pub fn map_read_write(path: &Path) -> Result<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    // SAFETY: exclusive access to the image is a precondition of the tool
    let map = unsafe { MmapMut::map_mut(&file)? };
    log::debug!("Mapped {} read-write ({} bytes)", path.display(), map.len());
    Ok(map)
}

/// Map an image for inspection only
pub fn map_read_only(path: &Path) -> Result<Mmap> {
    let file = OpenOptions::new().read(true).open(path)?;
    // SAFETY: see map_read_write
    let map = unsafe { Mmap::map(&file)? };
    log::debug!("Mapped {} read-only ({} bytes)", path.display(), map.len());
    Ok(map)
}
