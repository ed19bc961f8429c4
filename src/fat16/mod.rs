pub mod boot;
pub mod directory;
pub mod dump;
pub mod fat_table;
pub mod lfn;
pub mod shuffle;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) const DIR_ENTRY_SIZE: usize = 32;

/// Smallest cluster count (reserved entries included) of a FAT16 volume
pub const FAT16_MIN_CLUSTERS: usize = 4086;

/// Largest cluster count (reserved entries included) of a FAT16 volume
pub const FAT16_MAX_CLUSTERS: usize = 65525;

/// First cluster number of the data region
pub const FIRST_DATA_CLUSTER: u16 = 2;
