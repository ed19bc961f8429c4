//! fat16-shuffle: randomly permute the physical cluster layout of a FAT16 image
//! while preserving every file's content, name, size and place in the tree.

pub mod error;
pub mod fat16;
pub mod mapped;

// Re-export main types
pub use error::{Fat16Error, Result};
pub use fat16::{
    boot::Geometry,
    directory::{DirEntry, DirLocation, TreeEntry},
    shuffle::{ClusterPermutation, ShuffleReport},
    volume::Fat16Volume,
};
