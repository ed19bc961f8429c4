//! Error types for the fat16-shuffle library

use std::io;

use thiserror::Error;

/// Result type for fat16-shuffle operations
pub type Result<T> = std::result::Result<T, Fat16Error>;

/// Main error type for fat16-shuffle operations
#[derive(Error, Debug)]
pub enum Fat16Error {
    /// I/O error from opening or mapping the image
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The image ends before a structure that must be present
    #[error("Image truncated: need {needed} bytes, have {available} bytes")]
    Truncated { needed: usize, available: usize },

    /// Boot parameter block values that cannot describe a volume
    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    /// Cluster count outside the FAT16 range (FAT12 or FAT32 volume)
    #[error("Not a FAT16 volume: {clusters} clusters (expected 4086..=65525)")]
    NotFat16 { clusters: usize },

    /// A cluster number that does not address the data region
    #[error("Cluster {cluster} out of range (valid: 2..{cluster_count})")]
    ClusterOutOfRange { cluster: usize, cluster_count: usize },

    /// A cluster write whose buffer is not exactly one cluster long
    #[error("Cluster size mismatch: expected {expected} bytes, got {actual} bytes")]
    ClusterSizeMismatch { expected: usize, actual: usize },

    /// A cluster mapping that is not a bijection over the volume
    #[error("Invalid permutation: {message}")]
    InvalidPermutation { message: String },

    /// A directory reachable through more than one entry
    #[error("Directory at cluster {cluster} is reachable more than once")]
    DirectoryCycle { cluster: u16 },
}

// Convenience constructors
impl Fat16Error {
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    pub fn invalid_permutation(message: impl Into<String>) -> Self {
        Self::InvalidPermutation {
            message: message.into(),
        }
    }

    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }
}
