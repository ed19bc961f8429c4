//! Directory entries and the walkers over them

use std::collections::HashSet;

use byteorder::{ByteOrder, LittleEndian};

use super::boot::Geometry;
use super::fat_table::{ClusterChain, FatTable};
use super::lfn::LFN_ATTRIBUTE;
use super::{DIR_ENTRY_SIZE, FIRST_DATA_CLUSTER};

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

const END_OF_DIRECTORY: u8 = 0x00;
const DELETED_ENTRY: u8 = 0xE5;

pub(crate) const START_CLUSTER_FIELD: usize = 0x1A;
const FILE_SIZE_FIELD: usize = 0x1C;

/// Where a directory's entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLocation {
    /// The fixed root directory region
    Root,
    /// A cluster-chained directory starting at this cluster
    Cluster(u16),
}

/// A 32-byte short directory entry, copied out of the image together with
/// the absolute offset it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    offset: usize,
    raw: [u8; DIR_ENTRY_SIZE],
}

impl DirEntry {
    pub(crate) fn read(image: &[u8], offset: usize) -> DirEntry {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw.copy_from_slice(&image[offset..offset + DIR_ENTRY_SIZE]);
        DirEntry { offset, raw }
    }

    /// Absolute byte offset of the entry in the image
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn raw(&self) -> &[u8; DIR_ENTRY_SIZE] {
        &self.raw
    }

    /// The 11 name bytes exactly as stored
    pub fn short_name(&self) -> [u8; 11] {
        let mut name = [0u8; 11];
        name.copy_from_slice(&self.raw[0..11]);
        name
    }

    /// 8.3 name with padding removed, e.g. `A.TXT`, `SUB`, `..`
    pub fn name(&self) -> String {
        let name = String::from_utf8_lossy(&self.raw[0..8]).trim_end().to_string();
        let ext = String::from_utf8_lossy(&self.raw[8..11]).trim_end().to_string();
        if ext.is_empty() {
            name
        } else {
            format!("{}.{}", name, ext)
        }
    }

    pub fn attributes(&self) -> u8 {
        self.raw[0x0B]
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes() & ATTR_READ_ONLY != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes() & ATTR_HIDDEN != 0
    }

    pub fn is_system(&self) -> bool {
        self.attributes() & ATTR_SYSTEM != 0
    }

    /// Volume labels, and long-name fragments which share the bit
    pub fn is_volume_label(&self) -> bool {
        self.attributes() & ATTR_VOLUME_ID != 0
    }

    pub fn is_directory(&self) -> bool {
        self.attributes() & ATTR_DIRECTORY != 0
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes() & 0x3F == LFN_ATTRIBUTE
    }

    /// The `.` and `..` pseudo-entries of a subdirectory
    pub fn is_dot_entry(&self) -> bool {
        &self.raw[0..11] == b".          " || &self.raw[0..11] == b"..         "
    }

    /// A directory the tree walkers descend into
    pub fn is_subdirectory(&self) -> bool {
        self.is_directory() && !self.is_volume_label() && !self.is_dot_entry()
    }

    /// Start cluster of a subdirectory that has a data cluster to descend into
    pub fn subdirectory_cluster(&self) -> Option<u16> {
        let cluster = self.start_cluster();
        (self.is_subdirectory() && cluster >= FIRST_DATA_CLUSTER).then_some(cluster)
    }

    pub fn start_cluster(&self) -> u16 {
        LittleEndian::read_u16(&self.raw[START_CLUSTER_FIELD..])
    }

    pub fn file_size(&self) -> u32 {
        LittleEndian::read_u32(&self.raw[FILE_SIZE_FIELD..])
    }

    /// Absolute offset of the start-cluster field
    pub(crate) fn start_cluster_offset(&self) -> usize {
        self.offset + START_CLUSTER_FIELD
    }
}

enum Slots<'a> {
    Root {
        base: usize,
        next: usize,
        count: usize,
    },
    Chain {
        chain: ClusterChain<'a>,
        geometry: Geometry,
        cluster_base: Option<usize>,
        next: usize,
    },
}

impl Slots<'_> {
    /// Offset of the next 32-byte slot in directory order
    fn next_offset(&mut self) -> Option<usize> {
        match self {
            Slots::Root { base, next, count } => {
                if *next >= *count {
                    return None;
                }
                let offset = *base + *next * DIR_ENTRY_SIZE;
                *next += 1;
                Some(offset)
            }
            Slots::Chain {
                chain,
                geometry,
                cluster_base,
                next,
            } => {
                if cluster_base.is_none() || *next >= geometry.entries_per_cluster() {
                    let cluster = chain.next()?;
                    *cluster_base = Some(geometry.cluster_offset(cluster as usize));
                    *next = 0;
                }
                let offset = (*cluster_base)? + *next * DIR_ENTRY_SIZE;
                *next += 1;
                Some(offset)
            }
        }
    }
}

/// Live entries of one directory, in slot order.
///
/// Deleted slots are skipped; the first end-of-directory slot ends the
/// sequence for the whole directory.
pub struct DirEntries<'a> {
    image: &'a [u8],
    slots: Slots<'a>,
    finished: bool,
}

impl<'a> DirEntries<'a> {
    pub(crate) fn new(
        image: &'a [u8],
        fat: FatTable<'a>,
        geometry: Geometry,
        location: DirLocation,
    ) -> DirEntries<'a> {
        let slots = match location {
            DirLocation::Root => Slots::Root {
                base: geometry.root_dir_offset,
                next: 0,
                count: geometry.root_entry_count as usize,
            },
            DirLocation::Cluster(start) => Slots::Chain {
                chain: fat.chain(start, geometry.cluster_count),
                geometry,
                cluster_base: None,
                next: 0,
            },
        };
        DirEntries {
            image,
            slots,
            finished: false,
        }
    }
}

impl Iterator for DirEntries<'_> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        while !self.finished {
            let Some(offset) = self.slots.next_offset() else {
                self.finished = true;
                break;
            };
            match self.image[offset] {
                END_OF_DIRECTORY => self.finished = true,
                DELETED_ENTRY => continue,
                _ => return Some(DirEntry::read(self.image, offset)),
            }
        }
        None
    }
}

/// An entry met during a tree walk; `depth` is 0 for root entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub depth: usize,
    pub entry: DirEntry,
}

/// Depth-first, pre-order walk over every directory reachable from the root.
///
/// Each directory is entered at most once; a second path to an already
/// visited directory is logged and not followed.
pub struct TreeWalk<'a> {
    image: &'a [u8],
    fat: FatTable<'a>,
    geometry: Geometry,
    stack: Vec<DirEntries<'a>>,
    visited: HashSet<u16>,
}

impl<'a> TreeWalk<'a> {
    pub(crate) fn new(image: &'a [u8], fat: FatTable<'a>, geometry: Geometry) -> TreeWalk<'a> {
        let root = DirEntries::new(image, fat, geometry, DirLocation::Root);
        TreeWalk {
            image,
            fat,
            geometry,
            stack: vec![root],
            visited: HashSet::new(),
        }
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = TreeEntry;

    fn next(&mut self) -> Option<TreeEntry> {
        while let Some(current) = self.stack.last_mut() {
            let Some(entry) = current.next() else {
                self.stack.pop();
                continue;
            };
            let depth = self.stack.len() - 1;

            if let Some(cluster) = entry.subdirectory_cluster() {
                if self.visited.insert(cluster) {
                    self.stack.push(DirEntries::new(
                        self.image,
                        self.fat,
                        self.geometry,
                        DirLocation::Cluster(cluster),
                    ));
                } else {
                    log::warn!(
                        "Directory '{}' at cluster {} was already visited, not descending",
                        entry.name(),
                        cluster
                    );
                }
            }
            return Some(TreeEntry { depth, entry });
        }
        None
    }
}
