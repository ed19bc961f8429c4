//! In-memory FAT16 images for unit tests

use byteorder::{ByteOrder, LittleEndian};

use super::directory::{ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_VOLUME_ID};
use super::fat_table::set_entry;
use super::lfn::{LFN_ATTRIBUTE, lfn_checksum};

pub(crate) const SECTOR: usize = 512;
const TOTAL_SECTORS: usize = 4200;
const RESERVED: usize = 1;
const FATS: usize = 2;
const SECTORS_PER_FAT: usize = 17;
const ROOT_ENTRIES: usize = 512;
const ROOT_SECTORS: usize = ROOT_ENTRIES * 32 / SECTOR;

/// 4135-cluster FAT16 volume, one 512-byte sector per cluster
pub(crate) struct SampleImage {
    bytes: Vec<u8>,
}

impl SampleImage {
    pub(crate) fn new() -> Self {
        let mut bytes = vec![0u8; TOTAL_SECTORS * SECTOR];
        bytes[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        bytes[3..11].copy_from_slice(b"MSWIN4.1");
        LittleEndian::write_u16(&mut bytes[0x0B..], SECTOR as u16);
        bytes[0x0D] = 1;
        LittleEndian::write_u16(&mut bytes[0x0E..], RESERVED as u16);
        bytes[0x10] = FATS as u8;
        LittleEndian::write_u16(&mut bytes[0x11..], ROOT_ENTRIES as u16);
        LittleEndian::write_u16(&mut bytes[0x13..], TOTAL_SECTORS as u16);
        bytes[0x15] = 0xF8;
        LittleEndian::write_u16(&mut bytes[0x16..], SECTORS_PER_FAT as u16);
        bytes[0x1FE] = 0x55;
        bytes[0x1FF] = 0xAA;

        let mut image = SampleImage { bytes };
        image.set_fat(0, 0xFFF8);
        image.set_fat(1, 0xFFFF);
        image
    }

    /// Root: volume label, `Alpha.txt` (A.TXT, clusters 5 9 3), a deleted
    /// entry, SUB (cluster 4) holding B.TXT (cluster 7), and an empty file.
    pub(crate) fn populated() -> Self {
        let mut image = SampleImage::new();
        image.root_entry(0, b"TESTVOL    ", ATTR_VOLUME_ID, 0, 0);
        let raw = lfn_fragment(0x41, "Alpha.txt", lfn_checksum(b"A       TXT"));
        image.write_root_slot(1, &raw);
        image.root_entry(2, b"A       TXT", ATTR_ARCHIVE, 5, 1300);
        image.root_entry(3, b"\xE5LD     TXT", ATTR_ARCHIVE, 6, 10);
        image.root_entry(4, b"SUB        ", ATTR_DIRECTORY, 4, 0);
        image.root_entry(5, b"EMPTY   TXT", ATTR_ARCHIVE, 0, 0);
        // past the end marker, never listed
        image.root_entry(7, b"GHOST   TXT", ATTR_ARCHIVE, 8, 1);

        image.link(&[5, 9, 3]);
        for cluster in [5, 9, 3] {
            image.fill_cluster(cluster);
        }

        image.link(&[4]);
        image.cluster_entry(4, 0, b".          ", ATTR_DIRECTORY, 4, 0);
        image.cluster_entry(4, 1, b"..         ", ATTR_DIRECTORY, 0, 0);
        image.cluster_entry(4, 2, b"B       TXT", ATTR_ARCHIVE, 7, 100);

        image.link(&[7]);
        image.fill_cluster(7);
        image
    }

    fn fat_offset(copy: usize) -> usize {
        (RESERVED + copy * SECTORS_PER_FAT) * SECTOR
    }

    fn root_offset() -> usize {
        (RESERVED + FATS * SECTORS_PER_FAT) * SECTOR
    }

    pub(crate) fn cluster_offset(cluster: u16) -> usize {
        (RESERVED + FATS * SECTORS_PER_FAT + ROOT_SECTORS) * SECTOR
            + (cluster as usize - 2) * SECTOR
    }

    /// Distinct bytes for every cluster number
    pub(crate) fn pattern(cluster: u16) -> Vec<u8> {
        (0..SECTOR)
            .map(|i| (i as u16).wrapping_mul(31).wrapping_add(cluster.wrapping_mul(7)) as u8)
            .enumerate()
            .map(|(i, b)| match i {
                0 => cluster as u8,
                1 => (cluster >> 8) as u8,
                _ => b,
            })
            .collect()
    }

    pub(crate) fn set_fat(&mut self, cluster: usize, value: u16) {
        for copy in 0..FATS {
            let offset = Self::fat_offset(copy);
            set_entry(&mut self.bytes[offset..offset + SECTORS_PER_FAT * SECTOR], cluster, value);
        }
    }

    /// Link clusters into one chain ending in 0xFFFF
    pub(crate) fn link(&mut self, chain: &[u16]) {
        for pair in chain.windows(2) {
            self.set_fat(pair[0] as usize, pair[1]);
        }
        if let Some(&last) = chain.last() {
            self.set_fat(last as usize, 0xFFFF);
        }
    }

    pub(crate) fn fill_cluster(&mut self, cluster: u16) {
        let offset = Self::cluster_offset(cluster);
        self.bytes[offset..offset + SECTOR].copy_from_slice(&Self::pattern(cluster));
    }

    fn write_root_slot(&mut self, slot: usize, raw: &[u8; 32]) {
        let offset = Self::root_offset() + slot * 32;
        self.bytes[offset..offset + 32].copy_from_slice(raw);
    }

    pub(crate) fn root_entry(&mut self, slot: usize, name: &[u8; 11], attr: u8, start: u16, size: u32) {
        self.write_root_slot(slot, &short_entry(name, attr, start, size));
    }

    pub(crate) fn cluster_entry(
        &mut self,
        cluster: u16,
        slot: usize,
        name: &[u8; 11],
        attr: u8,
        start: u16,
        size: u32,
    ) {
        let offset = Self::cluster_offset(cluster) + slot * 32;
        self.bytes[offset..offset + 32].copy_from_slice(&short_entry(name, attr, start, size));
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub(crate) fn short_entry(name: &[u8; 11], attr: u8, start: u16, size: u32) -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[0..11].copy_from_slice(name);
    raw[0x0B] = attr;
    LittleEndian::write_u16(&mut raw[0x1A..], start);
    LittleEndian::write_u32(&mut raw[0x1C..], size);
    raw
}

/// One LFN fragment holding up to 13 characters of `text`
pub(crate) fn lfn_fragment(sequence: u8, text: &str, checksum: u8) -> [u8; 32] {
    const OFFSETS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    let mut raw = [0u8; 32];
    raw[0] = sequence;
    raw[0x0B] = LFN_ATTRIBUTE;
    raw[0x0D] = checksum;

    let mut units: Vec<u16> = text.encode_utf16().collect();
    if units.len() < 13 {
        units.push(0x0000);
    }
    units.resize(13, 0xFFFF);
    for (unit, pos) in units.iter().zip(OFFSETS) {
        raw[pos..pos + 2].copy_from_slice(&unit.to_le_bytes());
    }
    raw
}
