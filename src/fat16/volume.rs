//! FAT16 volume accessor and cluster store

use super::boot::Geometry;
use super::directory::{DirEntries, DirEntry, DirLocation, TreeWalk};
use super::fat_table::{ClusterChain, FatTable};
use crate::error::{Fat16Error, Result};

/// A FAT16 volume inside a mutable byte region.
///
/// `B` is whatever holds the image: a `Vec<u8>`, a `&mut [u8]`, or a memory
/// map. The volume may start at a nonzero offset of that region, e.g. a
/// partition inside a whole-disk image.
pub struct Fat16Volume<B> {
    data: B,
    geometry: Geometry,
}

impl<B: AsRef<[u8]>> Fat16Volume<B> {
    /// Parse the boot sector at `start` and wrap the image.
    pub fn open(data: B, start: usize) -> Result<Fat16Volume<B>> {
        let geometry = Geometry::parse(data.as_ref(), start)?;
        log::info!(
            "Opened FAT16 volume: {} clusters, {} bytes per cluster, data at 0x{:X}",
            geometry.cluster_count - 2,
            geometry.cluster_size(),
            geometry.data_offset
        );
        Ok(Fat16Volume { data, geometry })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.data
    }

    fn check_cluster(&self, cluster: usize) -> Result<()> {
        if !self.geometry.is_valid_cluster(cluster) {
            return Err(Fat16Error::ClusterOutOfRange {
                cluster,
                cluster_count: self.geometry.cluster_count,
            });
        }
        Ok(())
    }

    /// Byte offset of a cluster in the backing image
    pub fn cluster_offset(&self, cluster: usize) -> Result<usize> {
        self.check_cluster(cluster)?;
        Ok(self.geometry.cluster_offset(cluster))
    }

    /// Copy of one cluster's bytes
    pub fn read_cluster(&self, cluster: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.geometry.cluster_size()];
        self.read_cluster_into(cluster, &mut buf)?;
        Ok(buf)
    }

    /// Copy one cluster into `buf`, which must be exactly one cluster long
    pub fn read_cluster_into(&self, cluster: usize, buf: &mut [u8]) -> Result<()> {
        let size = self.geometry.cluster_size();
        if buf.len() != size {
            return Err(Fat16Error::ClusterSizeMismatch {
                expected: size,
                actual: buf.len(),
            });
        }
        let offset = self.cluster_offset(cluster)?;
        buf.copy_from_slice(&self.bytes()[offset..offset + size]);
        Ok(())
    }

    /// One FAT copy; `None` past the last copy
    pub fn fat_copy(&self, copy: usize) -> Option<FatTable<'_>> {
        if copy >= self.geometry.num_fats as usize {
            return None;
        }
        let offset = self.geometry.fat_copy_offset(copy);
        Some(FatTable::new(
            &self.bytes()[offset..offset + self.geometry.fat_size()],
        ))
    }

    /// The first FAT copy, the one chains are read from
    pub fn fat(&self) -> FatTable<'_> {
        let offset = self.geometry.fat_offset;
        FatTable::new(&self.bytes()[offset..offset + self.geometry.fat_size()])
    }

    pub fn fat_entry(&self, cluster: usize) -> u16 {
        self.fat().get_entry(cluster)
    }

    pub fn end_of_chain_marker(&self) -> u16 {
        self.fat().end_of_chain_marker()
    }

    /// Cluster chain of a file or directory, read from the first FAT
    pub fn chain(&self, start: u16) -> ClusterChain<'_> {
        self.fat().chain(start, self.geometry.cluster_count)
    }

    pub fn chain_len(&self, start: u16) -> usize {
        self.chain(start).count()
    }

    /// Concatenated contents of every cluster in a chain
    pub fn read_chain(&self, start: u16) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for cluster in self.chain(start) {
            let offset = self.cluster_offset(cluster as usize)?;
            data.extend_from_slice(&self.bytes()[offset..offset + self.geometry.cluster_size()]);
        }
        Ok(data)
    }

    /// Contents of a file, cut to its recorded size. Directories are
    /// returned whole since their entries carry no size.
    pub fn read_file(&self, entry: &DirEntry) -> Result<Vec<u8>> {
        let mut data = self.read_chain(entry.start_cluster())?;
        if !entry.is_directory() {
            data.truncate(entry.file_size() as usize);
        }
        Ok(data)
    }

    pub fn dir_entries(&self, location: DirLocation) -> DirEntries<'_> {
        DirEntries::new(self.bytes(), self.fat(), self.geometry, location)
    }

    pub fn root_entries(&self) -> DirEntries<'_> {
        self.dir_entries(DirLocation::Root)
    }

    /// Depth-first walk over the whole directory tree
    pub fn walk(&self) -> TreeWalk<'_> {
        TreeWalk::new(self.bytes(), self.fat(), self.geometry)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Fat16Volume<B> {
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Overwrite one cluster; `data` must be exactly one cluster long
    pub fn write_cluster(&mut self, cluster: usize, data: &[u8]) -> Result<()> {
        let size = self.geometry.cluster_size();
        if data.len() != size {
            return Err(Fat16Error::ClusterSizeMismatch {
                expected: size,
                actual: data.len(),
            });
        }
        let offset = self.cluster_offset(cluster)?;
        self.bytes_mut()[offset..offset + size].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn fat_copy_mut(&mut self, copy: usize) -> &mut [u8] {
        let offset = self.geometry.fat_copy_offset(copy);
        let size = self.geometry.fat_size();
        &mut self.bytes_mut()[offset..offset + size]
    }
}
