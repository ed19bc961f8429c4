//! Random cluster permutation and the in-place rewrite that applies it.
//!
//! The rewrite runs in four steps: preflight checks, relocation of cluster
//! contents along the permutation's cycles, regeneration of every FAT copy
//! under the new numbering, and patching of every directory entry's start
//! cluster. Only one cluster of data is in flight at any time.

use std::collections::HashSet;

use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

use super::FIRST_DATA_CLUSTER;
use super::directory::{DirEntry, DirLocation};
use super::fat_table::{self, CLEAN_SHUTDOWN_BYTE, CLEAN_SHUTDOWN_MASK, FatTable};
use super::volume::Fat16Volume;
use crate::error::{Fat16Error, Result};

/// Bijection from old to new cluster numbers over `0..cluster_count`,
/// fixing the two reserved entries 0 and 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPermutation {
    map: Vec<u16>,
}

impl ClusterPermutation {
    /// Uniformly random permutation drawn from the operating system's CSPRNG
    pub fn random(cluster_count: usize) -> Result<ClusterPermutation> {
        Self::generate(cluster_count, &mut OsRng)
    }

    /// Uniformly random permutation drawn from `rng` (Fisher-Yates)
    pub fn generate<R>(cluster_count: usize, rng: &mut R) -> Result<ClusterPermutation>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        check_cluster_count(cluster_count)?;
        let mut map: Vec<u16> = (0..cluster_count).map(|n| n as u16).collect();
        map[FIRST_DATA_CLUSTER as usize..].shuffle(rng);
        Ok(ClusterPermutation { map })
    }

    /// Wrap an explicit mapping, `map[old] == new`
    pub fn from_mapping(map: Vec<u16>) -> Result<ClusterPermutation> {
        check_cluster_count(map.len())?;
        if map[0] != 0 || map[1] != 1 {
            return Err(Fat16Error::invalid_permutation(
                "reserved entries 0 and 1 must map to themselves",
            ));
        }

        let mut seen = vec![false; map.len()];
        for (old, &new) in map.iter().enumerate().skip(FIRST_DATA_CLUSTER as usize) {
            let new = new as usize;
            if new < FIRST_DATA_CLUSTER as usize || new >= map.len() {
                return Err(Fat16Error::invalid_permutation(format!(
                    "cluster {} maps to {} outside 2..{}",
                    old,
                    new,
                    map.len()
                )));
            }
            if seen[new] {
                return Err(Fat16Error::invalid_permutation(format!(
                    "cluster {} is the target of more than one cluster",
                    new
                )));
            }
            seen[new] = true;
        }
        Ok(ClusterPermutation { map })
    }

    /// New number of `old`; `None` for values that are not cluster numbers
    pub fn new_number(&self, old: u16) -> Option<u16> {
        self.map.get(old as usize).copied()
    }

    /// Number of entries, the reserved ones included
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.map
    }
}

fn check_cluster_count(cluster_count: usize) -> Result<()> {
    if cluster_count < FIRST_DATA_CLUSTER as usize || cluster_count > u16::MAX as usize + 1 {
        return Err(Fat16Error::invalid_permutation(format!(
            "{} entries cannot be numbered with 16-bit clusters",
            cluster_count
        )));
    }
    Ok(())
}

/// What a shuffle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShuffleReport {
    /// Data clusters in the volume
    pub clusters: usize,
    /// Clusters whose physical slot changed
    pub moved: usize,
    /// Non-trivial cycles of the permutation
    pub cycles: usize,
    /// Subdirectories whose entries were patched (the root excluded)
    pub directories: usize,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Fat16Volume<B> {
    /// Move every data cluster to a random new slot, keeping all files intact.
    pub fn shuffle_clusters(&mut self) -> Result<ShuffleReport> {
        let permutation = ClusterPermutation::random(self.geometry().cluster_count)?;
        self.apply_permutation(&permutation)
    }

    /// Renumber every cluster `i` as `permutation[i]`: its content moves to
    /// that slot, chains are rewritten to match, and directory entries are
    /// pointed at the new start clusters.
    ///
    /// Preflight failures leave the image untouched. Once relocation has
    /// started, an error leaves it inconsistent.
    pub fn apply_permutation(&mut self, permutation: &ClusterPermutation) -> Result<ShuffleReport> {
        let cluster_count = self.geometry().cluster_count;
        if permutation.len() != cluster_count {
            return Err(Fat16Error::invalid_permutation(format!(
                "permutation covers {} entries, volume has {}",
                permutation.len(),
                cluster_count
            )));
        }
        let directories = self.check_directory_tree()?;
        log::info!(
            "Shuffling {} clusters across {} subdirectories",
            cluster_count - FIRST_DATA_CLUSTER as usize,
            directories
        );

        let old_fat = self.fat().data().to_vec();
        let (moved, cycles) = self.relocate_clusters(permutation)?;
        self.rewrite_fats(permutation, &old_fat);
        let directories = self.fixup_directories(permutation)?;

        let report = ShuffleReport {
            clusters: cluster_count - FIRST_DATA_CLUSTER as usize,
            moved,
            cycles,
            directories,
        };
        log::info!(
            "Shuffle complete: {} clusters moved in {} cycles",
            report.moved,
            report.cycles
        );
        Ok(report)
    }

    /// Count subdirectories, failing if any is reachable twice
    fn check_directory_tree(&self) -> Result<usize> {
        let mut pending = vec![DirLocation::Root];
        let mut visited = HashSet::new();
        while let Some(location) = pending.pop() {
            for entry in self.dir_entries(location) {
                if let Some(cluster) = entry.subdirectory_cluster() {
                    if !visited.insert(cluster) {
                        return Err(Fat16Error::DirectoryCycle { cluster });
                    }
                    pending.push(DirLocation::Cluster(cluster));
                }
            }
        }
        Ok(visited.len())
    }

    /// Afterwards slot `permutation[i]` holds what slot `i` held before.
    ///
    /// Each cycle of the permutation is followed from its lowest member:
    /// the displaced cluster is read before its slot is overwritten and
    /// then carried on to its own target, until the cycle closes on the
    /// starting slot.
    fn relocate_clusters(&mut self, permutation: &ClusterPermutation) -> Result<(usize, usize)> {
        let map = permutation.as_slice();
        let size = self.geometry().cluster_size();
        let mut settled = vec![false; map.len()];
        let mut in_flight = vec![0u8; size];
        let mut displaced = vec![0u8; size];
        let mut moved = 0;
        let mut cycles = 0;

        for start in FIRST_DATA_CLUSTER as usize..map.len() {
            if settled[start] || map[start] as usize == start {
                continue;
            }

            self.read_cluster_into(start, &mut in_flight)?;
            let mut slot = map[start] as usize;
            loop {
                let closes = slot == start;
                if !closes {
                    self.read_cluster_into(slot, &mut displaced)?;
                }
                self.write_cluster(slot, &in_flight)?;
                settled[slot] = true;
                moved += 1;
                if closes {
                    break;
                }
                std::mem::swap(&mut in_flight, &mut displaced);
                slot = map[slot] as usize;
            }
            cycles += 1;
        }

        log::debug!("Relocated {} clusters in {} cycles", moved, cycles);
        Ok((moved, cycles))
    }

    /// Rebuild every FAT copy from the pre-shuffle table: the entry of old
    /// cluster `i` moves to slot `permutation[i]` and its successor is
    /// renumbered; end-of-chain, bad and free values are kept as they are.
    fn rewrite_fats(&mut self, permutation: &ClusterPermutation, old_fat: &[u8]) {
        let old = FatTable::new(old_fat);
        for copy in 0..self.geometry().num_fats as usize {
            let fat = self.fat_copy_mut(copy);
            for (old_cluster, &new_cluster) in permutation
                .as_slice()
                .iter()
                .enumerate()
                .skip(FIRST_DATA_CLUSTER as usize)
            {
                let next = old.get_entry(old_cluster);
                let value = permutation.new_number(next).unwrap_or(next);
                fat_table::set_entry(fat, new_cluster as usize, value);
            }
            fat[CLEAN_SHUTDOWN_BYTE] &= CLEAN_SHUTDOWN_MASK;
            log::debug!("Rewrote FAT copy {}", copy);
        }
    }

    /// Point every directory entry at its cluster's new number, walking
    /// subdirectories through the already rewritten chains.
    fn fixup_directories(&mut self, permutation: &ClusterPermutation) -> Result<usize> {
        let mut pending = vec![DirLocation::Root];
        let mut visited = HashSet::new();
        while let Some(location) = pending.pop() {
            let entries: Vec<DirEntry> = self.dir_entries(location).collect();
            for entry in entries {
                if entry.is_volume_label() {
                    continue;
                }
                let old = entry.start_cluster();
                let Some(new) = permutation.new_number(old) else {
                    log::warn!(
                        "Entry '{}' starts at {} outside the volume, left as is",
                        entry.name(),
                        old
                    );
                    continue;
                };
                if new != old {
                    let offset = entry.start_cluster_offset();
                    LittleEndian::write_u16(&mut self.bytes_mut()[offset..offset + 2], new);
                }
                if entry.subdirectory_cluster().is_some() {
                    if !visited.insert(new) {
                        return Err(Fat16Error::DirectoryCycle { cluster: new });
                    }
                    pending.push(DirLocation::Cluster(new));
                }
            }
        }
        Ok(visited.len())
    }
}
