//! FAT table access for FAT16

use byteorder::{ByteOrder, LittleEndian};

use super::FIRST_DATA_CLUSTER;

/// Lowest FAT16 end-of-chain value
pub const FAT16_EOC_MIN: u16 = 0xFFF8;

/// FAT16 bad cluster marker
pub const FAT16_BAD_CLUSTER: u16 = 0xFFF7;

/// FAT16 free cluster marker
pub const FAT16_FREE_CLUSTER: u16 = 0x0000;

/// Clears the clean-shutdown bit when applied to the high byte of entry 1
pub const CLEAN_SHUTDOWN_MASK: u8 = 0x7F;

/// Byte of entry 1 that carries the clean-shutdown bit
pub(crate) const CLEAN_SHUTDOWN_BYTE: usize = 3;

/// Status bits of entry 1 (clean shutdown, no hard error)
const ENTRY1_STATUS_BITS: u16 = 0xC000;

/// Read-only view over one FAT copy
#[derive(Debug, Clone, Copy)]
pub struct FatTable<'a> {
    data: &'a [u8],
}

impl<'a> FatTable<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Get a FAT entry value; entries past the end of the table read as end-of-chain
    pub fn get_entry(&self, cluster: usize) -> u16 {
        let offset = cluster * 2;
        if offset + 2 > self.data.len() {
            return FAT16_EOC_MIN;
        }
        LittleEndian::read_u16(&self.data[offset..offset + 2])
    }

    /// The end-of-chain value this volume writes, stored in entry 1.
    ///
    /// The status bits of entry 1 read as set, so a volume marked dirty
    /// still reports 0xFFFF rather than a valid cluster number.
    pub fn end_of_chain_marker(&self) -> u16 {
        self.get_entry(1) | ENTRY1_STATUS_BITS
    }

    /// Whether the clean-shutdown flag of entry 1 is set
    pub fn is_clean(&self) -> bool {
        self.data
            .get(CLEAN_SHUTDOWN_BYTE)
            .is_some_and(|b| b & !CLEAN_SHUTDOWN_MASK != 0)
    }

    /// Follow the chain beginning at `start`.
    ///
    /// `cluster_count` bounds both the addressable cluster numbers and the
    /// number of clusters the chain may yield.
    pub fn chain(&self, start: u16, cluster_count: usize) -> ClusterChain<'a> {
        ClusterChain {
            fat: *self,
            next: start,
            end_marker: self.end_of_chain_marker(),
            cluster_count,
            budget: cluster_count.saturating_sub(FIRST_DATA_CLUSTER as usize),
        }
    }

    /// Count clusters in a chain
    pub fn count_chain(&self, start: u16, cluster_count: usize) -> usize {
        self.chain(start, cluster_count).count()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Set a FAT entry value in a raw FAT copy
pub(crate) fn set_entry(fat: &mut [u8], cluster: usize, value: u16) {
    let offset = cluster * 2;
    LittleEndian::write_u16(&mut fat[offset..offset + 2], value);
}

/// Cluster numbers of one file or directory, in chain order.
///
/// A clone walks the remaining sequence independently of the original.
#[derive(Debug, Clone)]
pub struct ClusterChain<'a> {
    fat: FatTable<'a>,
    next: u16,
    end_marker: u16,
    cluster_count: usize,
    budget: usize,
}

impl ClusterChain<'_> {
    fn stop(&mut self) -> Option<u16> {
        self.next = FAT16_FREE_CLUSTER;
        None
    }
}

impl Iterator for ClusterChain<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        let current = self.next;
        if current == self.end_marker || current < FIRST_DATA_CLUSTER || current >= FAT16_EOC_MIN
        {
            return None;
        }
        if current as usize >= self.cluster_count {
            log::warn!(
                "Cluster chain points at {} outside 2..{}",
                current,
                self.cluster_count
            );
            return self.stop();
        }
        if self.budget == 0 {
            log::warn!(
                "Cluster chain still running at {} after visiting every cluster, assuming a loop",
                current
            );
            return self.stop();
        }
        self.budget -= 1;
        self.next = self.fat.get_entry(current as usize);
        Some(current)
    }
}
