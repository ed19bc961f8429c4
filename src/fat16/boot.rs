//! Boot parameter block parsing and the volume layout derived from it

use byteorder::{ByteOrder, LittleEndian};

use super::{FAT16_MAX_CLUSTERS, FAT16_MIN_CLUSTERS, FIRST_DATA_CLUSTER};
use crate::error::{Fat16Error, Result};

/// End of the BPB fields read here (exclusive), relative to the volume start
const BPB_END: usize = 0x24;

/// Layout of a FAT16 volume.
///
/// All `*_offset` values are absolute byte offsets into the backing image,
/// i.e. they already include `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub start: usize,
    pub sector_size: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,

    pub total_sectors: u32,
    pub root_dir_sectors: u32,
    pub fat_offset: usize,
    pub root_dir_offset: usize,
    pub data_offset: usize,
    /// Number of FAT entries in use, the two reserved ones included.
    /// Valid cluster numbers are `2..cluster_count`.
    pub cluster_count: usize,
}

impl Geometry {
    /// Read the BPB of the volume beginning at `start` and derive its layout.
    pub fn parse(image: &[u8], start: usize) -> Result<Geometry> {
        let bpb_end = start
            .checked_add(BPB_END)
            .ok_or_else(|| Fat16Error::truncated(usize::MAX, image.len()))?;
        if image.len() < bpb_end {
            return Err(Fat16Error::truncated(bpb_end, image.len()));
        }
        let bpb = &image[start..bpb_end];

        let sector_size = LittleEndian::read_u16(&bpb[0x0B..]);
        let sectors_per_cluster = bpb[0x0D];
        let reserved_sectors = LittleEndian::read_u16(&bpb[0x0E..]);
        let num_fats = bpb[0x10];
        let root_entry_count = LittleEndian::read_u16(&bpb[0x11..]);
        let total_sectors_16 = LittleEndian::read_u16(&bpb[0x13..]);
        let media_descriptor = bpb[0x15];
        let sectors_per_fat = LittleEndian::read_u16(&bpb[0x16..]);
        let sectors_per_track = LittleEndian::read_u16(&bpb[0x18..]);
        let num_heads = LittleEndian::read_u16(&bpb[0x1A..]);
        let hidden_sectors = LittleEndian::read_u32(&bpb[0x1C..]);
        let total_sectors_32 = LittleEndian::read_u32(&bpb[0x20..]);

        if sector_size < super::DIR_ENTRY_SIZE as u16
            || !sector_size.is_power_of_two()
            || sectors_per_cluster == 0
        {
            return Err(Fat16Error::invalid_geometry(format!(
                "sector size {} / sectors per cluster {}",
                sector_size, sectors_per_cluster
            )));
        }
        if num_fats == 0 {
            return Err(Fat16Error::invalid_geometry("no FAT copies"));
        }

        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16 as u32
        } else {
            total_sectors_32
        };

        let sector = sector_size as u64;
        let root_dir_sectors = (32 * root_entry_count as u64).div_ceil(sector) as u32;
        let fat_sectors = num_fats as u32 * sectors_per_fat as u32;

        let data_sectors = total_sectors
            .checked_sub(reserved_sectors as u32)
            .and_then(|s| s.checked_sub(fat_sectors))
            .and_then(|s| s.checked_sub(root_dir_sectors))
            .ok_or_else(|| {
                Fat16Error::invalid_geometry(format!(
                    "metadata regions exceed the {} sectors of the volume",
                    total_sectors
                ))
            })?;
        let cluster_count =
            FIRST_DATA_CLUSTER as usize + (data_sectors / sectors_per_cluster as u32) as usize;

        if !(FAT16_MIN_CLUSTERS..=FAT16_MAX_CLUSTERS).contains(&cluster_count) {
            return Err(Fat16Error::NotFat16 {
                clusters: cluster_count,
            });
        }

        let fat_offset = start + sector_size as usize * reserved_sectors as usize;
        let root_dir_offset = fat_offset + sector_size as usize * fat_sectors as usize;
        let data_offset = root_dir_offset + sector_size as usize * root_dir_sectors as usize;

        let geometry = Geometry {
            start,
            sector_size,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            root_entry_count,
            total_sectors_16,
            media_descriptor,
            sectors_per_fat,
            sectors_per_track,
            num_heads,
            hidden_sectors,
            total_sectors_32,
            total_sectors,
            root_dir_sectors,
            fat_offset,
            root_dir_offset,
            data_offset,
            cluster_count,
        };

        if geometry.fat_size() < 2 * cluster_count {
            return Err(Fat16Error::invalid_geometry(format!(
                "FAT of {} bytes cannot hold {} entries",
                geometry.fat_size(),
                cluster_count
            )));
        }

        let data_end = geometry.data_offset
            + (cluster_count - FIRST_DATA_CLUSTER as usize) * geometry.cluster_size();
        if image.len() < data_end {
            return Err(Fat16Error::truncated(data_end, image.len()));
        }

        log::debug!(
            "FAT16 geometry at offset {}: {} clusters of {} bytes, {} FATs",
            start,
            cluster_count,
            geometry.cluster_size(),
            num_fats
        );
        Ok(geometry)
    }

    pub fn cluster_size(&self) -> usize {
        self.sector_size as usize * self.sectors_per_cluster as usize
    }

    /// Size in bytes of one FAT copy
    pub fn fat_size(&self) -> usize {
        self.sector_size as usize * self.sectors_per_fat as usize
    }

    pub fn fat_copy_offset(&self, copy: usize) -> usize {
        self.fat_offset + copy * self.fat_size()
    }

    pub fn is_valid_cluster(&self, cluster: usize) -> bool {
        (FIRST_DATA_CLUSTER as usize..self.cluster_count).contains(&cluster)
    }

    /// Byte offset of a data cluster. No range check.
    ///
    /// # Panics
    ///
    /// Panics for the reserved cluster numbers 0 and 1.
    pub fn cluster_offset(&self, cluster: usize) -> usize {
        self.data_offset + (cluster - FIRST_DATA_CLUSTER as usize) * self.cluster_size()
    }

    /// Directory slots available in one cluster
    pub fn entries_per_cluster(&self) -> usize {
        self.cluster_size() / super::DIR_ENTRY_SIZE
    }
}
