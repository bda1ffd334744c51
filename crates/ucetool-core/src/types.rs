//! Core types for UCE containers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A UCE file split into its read-only asset region and its save partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UceContainer {
    asset_region: Vec<u8>,
    save_region: Vec<u8>,
    total_length: u64,
}

impl UceContainer {
    /// Build a container from its two regions
    pub fn new(asset_region: Vec<u8>, save_region: Vec<u8>) -> Self {
        let total_length = asset_region.len() as u64 + save_region.len() as u64;
        Self {
            asset_region,
            save_region,
            total_length,
        }
    }

    /// Read-only asset region (emulator core, ROM, metadata)
    pub fn asset_region(&self) -> &[u8] {
        &self.asset_region
    }

    /// Mutable save partition region
    pub fn save_region(&self) -> &[u8] {
        &self.save_region
    }

    /// Total length of the container in bytes
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Byte offset where the save region begins
    pub fn boundary(&self) -> u64 {
        self.asset_region.len() as u64
    }

    /// True when the container carries a zero-size save partition
    pub fn has_empty_save_region(&self) -> bool {
        self.save_region.is_empty()
    }

    /// Split into `(asset_region, save_region)`
    pub fn into_regions(self) -> (Vec<u8>, Vec<u8>) {
        (self.asset_region, self.save_region)
    }
}

/// Fixed-size filesystem image holding save data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePartitionImage {
    bytes: Vec<u8>,
}

impl SavePartitionImage {
    /// Wrap raw image bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Image size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Raw image bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the image and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Summary of a directory tree materialized from a save partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    /// Root directory of the materialized tree
    pub root: PathBuf,

    /// Number of regular files (and other non-directory entries)
    pub files: usize,

    /// Number of directories below the root
    pub directories: usize,

    /// Apparent size of all regular files in bytes
    pub bytes: u64,
}

/// Rule for locating the boundary after the asset region's declared length
///
/// `boundary = align_up(declared_length, alignment) + trailer_len`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLayout {
    /// Block granularity the asset region is padded to (1 = no padding)
    pub alignment: u64,

    /// Bytes between the padded asset image and the save partition
    pub trailer_len: u64,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        Self {
            alignment: 1,
            trailer_len: 0,
        }
    }
}

/// How the save partition is exposed to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditStrategy {
    /// Loop-mount the image (Linux, root only); edits land in place
    Mount,
    /// Extract to a directory and rebuild a same-size image afterwards
    #[default]
    ExtractRebuild,
}

impl EditStrategy {
    /// Get a human-readable name for this strategy
    pub fn name(&self) -> &'static str {
        match self {
            EditStrategy::Mount => "loop mount",
            EditStrategy::ExtractRebuild => "extract/rebuild",
        }
    }
}

impl fmt::Display for EditStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inspection report for a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Total file length in bytes
    pub total_length: u64,

    /// Length declared by the asset region header
    pub declared_length: u64,

    /// Offset of the save partition
    pub boundary: u64,

    /// Save partition length in bytes
    pub save_length: u64,

    /// Asset filesystem block size
    pub block_size: u32,

    /// Hex MD5 digest of the asset region
    pub asset_md5: String,
}

impl fmt::Display for ContainerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total:      {}", format_size(self.total_length))?;
        writeln!(f, "Declared:   {} bytes", self.declared_length)?;
        writeln!(f, "Boundary:   0x{:08X}", self.boundary)?;
        writeln!(f, "Save part:  {}", format_size(self.save_length))?;
        writeln!(f, "Block size: {} bytes", self.block_size)?;
        write!(f, "Asset MD5:  {}", self.asset_md5)
    }
}

/// Format size in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut unit_idx = 0;

    while value >= 1024.0 && unit_idx < UNITS.len() - 1 {
        value /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", value, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_lengths_add_up() {
        let container = UceContainer::new(vec![1u8; 700], vec![0u8; 324]);
        assert_eq!(container.total_length(), 1024);
        assert_eq!(container.boundary(), 700);
        assert_eq!(container.save_region().len(), 324);
        assert!(!container.has_empty_save_region());
    }

    #[test]
    fn test_empty_save_region() {
        let container = UceContainer::new(vec![1u8; 96], Vec::new());
        assert!(container.has_empty_save_region());
        assert_eq!(container.total_length(), 96);
    }

    #[test]
    fn test_default_layout_is_unpadded() {
        let layout = ContainerLayout::default();
        assert_eq!(layout.alignment, 1);
        assert_eq!(layout.trailer_len, 0);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(EditStrategy::ExtractRebuild.to_string(), "extract/rebuild");
        assert_eq!(EditStrategy::Mount.to_string(), "loop mount");
        assert_eq!(EditStrategy::default(), EditStrategy::ExtractRebuild);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(4 * 1024 * 1024), "4.00 MB");
    }
}
