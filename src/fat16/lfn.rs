//! Long File Name (LFN) fragments, reassembled for listings

use super::directory::DirEntry;

/// LFN entry attribute marker
pub const LFN_ATTRIBUTE: u8 = 0x0F;

/// Set in the sequence byte of the fragment holding the end of the name
const LFN_LAST_ENTRY: u8 = 0x40;

const LFN_SEQUENCE_MASK: u8 = 0x1F;

/// Maximum number of characters in a LFN entry
const LFN_CHARS_PER_ENTRY: usize = 13;

/// Byte offsets of the 13 UTF-16 units inside a fragment
const LFN_CHAR_OFFSETS: [usize; LFN_CHARS_PER_ENTRY] =
    [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

/// Calculate checksum for a short name
pub fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

/// Collects the LFN fragments that precede a short entry.
///
/// Fragments are stored last-first on disk; a run is only accepted when
/// its sequence numbers count down to 1 without gaps and its checksum
/// matches the short entry that follows it.
#[derive(Debug, Default)]
pub struct LongNameBuilder {
    units: Vec<u16>,
    checksum: u8,
    expected: u8,
    valid: bool,
}

impl LongNameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one LFN fragment
    pub fn push(&mut self, entry: &DirEntry) {
        let raw = entry.raw();
        let sequence = raw[0] & LFN_SEQUENCE_MASK;

        if raw[0] & LFN_LAST_ENTRY != 0 && sequence > 0 {
            self.units = vec![0xFFFF; sequence as usize * LFN_CHARS_PER_ENTRY];
            self.checksum = raw[0x0D];
            self.valid = true;
        } else if !self.valid
            || sequence == 0
            || sequence + 1 != self.expected
            || raw[0x0D] != self.checksum
        {
            self.valid = false;
            return;
        }
        self.expected = sequence;

        let base = (sequence as usize - 1) * LFN_CHARS_PER_ENTRY;
        for (i, &pos) in LFN_CHAR_OFFSETS.iter().enumerate() {
            self.units[base + i] = u16::from_le_bytes([raw[pos], raw[pos + 1]]);
        }
    }

    /// Long name belonging to `short`, if a complete matching run was fed.
    /// Resets the builder either way.
    pub fn finish(&mut self, short: &DirEntry) -> Option<String> {
        let complete = self.valid
            && self.expected == 1
            && self.checksum == lfn_checksum(&short.short_name());
        let units = std::mem::take(&mut self.units);
        self.valid = false;
        self.expected = 0;

        if !complete {
            return None;
        }
        let end = units
            .iter()
            .position(|&c| c == 0x0000 || c == 0xFFFF)
            .unwrap_or(units.len());
        String::from_utf16(&units[..end]).ok()
    }
}
