//! Human-readable listing of a volume: geometry, then every file and
//! directory with its cluster chain, indented by depth.

use std::io::{self, Write};

use super::directory::TreeEntry;
use super::lfn::LongNameBuilder;
use super::volume::Fat16Volume;

const INDENT: &str = "    ";

impl<B: AsRef<[u8]>> Fat16Volume<B> {
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let geometry = self.geometry();
        writeln!(out, "sector size: {}", geometry.sector_size)?;
        writeln!(out, "sectors per cluster: {}", geometry.sectors_per_cluster)?;
        writeln!(out, "number of clusters: {}", geometry.cluster_count)?;
        writeln!(out, "rootdir offset: 0x{:X}", geometry.root_dir_offset)?;
        writeln!(out, "data offset: 0x{:X}", geometry.data_offset)?;
        writeln!(out, "number of fats: {}", geometry.num_fats)?;
        writeln!(out, "number of rootdir entries: {}", geometry.root_entry_count)?;
        writeln!(out)?;

        let mut long_name = LongNameBuilder::new();
        for TreeEntry { depth, entry } in self.walk() {
            if entry.is_long_name() {
                long_name.push(&entry);
                continue;
            }
            let name = long_name.finish(&entry).unwrap_or_else(|| entry.name());
            if entry.is_volume_label() {
                continue;
            }

            let chain = self
                .chain(entry.start_cluster())
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let suffix = if entry.is_directory() { "/" } else { "" };
            writeln!(
                out,
                "{}{}{}{}{}",
                INDENT.repeat(depth),
                name,
                suffix,
                INDENT,
                chain
            )?;
        }
        Ok(())
    }
}
