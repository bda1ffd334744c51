//! SquashFS superblock fields needed to size the asset region
//!
//! Only the header is read; the filesystem body is treated as opaque.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0x00    4     Magic ("hsqs")
//! 0x04    4     Inode count
//! 0x08    4     Modification time
//! 0x0C    4     Block size
//! 0x10    4     Fragment count
//! 0x14    2     Compressor id
//! 0x16    2     Block log
//! 0x18    2     Flags
//! 0x1A    2     Id count
//! 0x1C    2     Major version
//! 0x1E    2     Minor version
//! 0x20    8     Root inode reference
//! 0x28    8     Bytes used
//! ...           Table offsets
//! ```

use ucetool_core::{Error, Result};

/// Parsed squashfs superblock (fields the container engine relies on)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquashfsSuperblock {
    /// Block size of the image (power of two)
    pub block_size: u32,

    /// Compressor identifier (1 = gzip, 4 = xz, ...)
    pub compressor: u16,

    /// Major format version (always 4)
    pub major_version: u16,

    /// Minor format version
    pub minor_version: u16,

    /// Declared length of the image in bytes
    pub bytes_used: u64,
}

impl SquashfsSuperblock {
    /// "hsqs" read as a little-endian u32
    pub const MAGIC: u32 = 0x7371_7368;

    /// Size of the superblock in bytes
    pub const SIZE: usize = 96;

    /// Supported major version
    pub const MAJOR_VERSION: u16 = 4;

    /// Smallest legal block size (4 KiB)
    pub const MIN_BLOCK_SIZE: u32 = 4096;

    /// Largest legal block size (1 MiB)
    pub const MAX_BLOCK_SIZE: u32 = 1024 * 1024;

    const BLOCK_SIZE_OFFSET: usize = 0x0C;
    const COMPRESSOR_OFFSET: usize = 0x14;
    const MAJOR_OFFSET: usize = 0x1C;
    const MINOR_OFFSET: usize = 0x1E;
    const BYTES_USED_OFFSET: usize = 0x28;

    /// Parse a superblock from the first bytes of the asset region
    ///
    /// # Errors
    ///
    /// Returns `Error::Format` if:
    /// - Fewer than 96 bytes are available
    /// - The magic or major version is wrong
    /// - The block size is not a power of two in 4 KiB..1 MiB
    /// - The declared length is smaller than the superblock itself
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < Self::SIZE {
            return Err(Error::format(format!(
                "container is {} bytes, shorter than the {}-byte asset header",
                header.len(),
                Self::SIZE
            )));
        }

        let magic = read_u32(header, 0);
        if magic != Self::MAGIC {
            return Err(Error::format(format!(
                "Invalid asset region magic: expected 0x{:08X}, got 0x{:08X}",
                Self::MAGIC,
                magic
            )));
        }

        let major_version = read_u16(header, Self::MAJOR_OFFSET);
        if major_version != Self::MAJOR_VERSION {
            return Err(Error::format(format!(
                "Unsupported squashfs version {}",
                major_version
            )));
        }

        let block_size = read_u32(header, Self::BLOCK_SIZE_OFFSET);
        if !block_size.is_power_of_two()
            || !(Self::MIN_BLOCK_SIZE..=Self::MAX_BLOCK_SIZE).contains(&block_size)
        {
            return Err(Error::format(format!(
                "Invalid squashfs block size: {}",
                block_size
            )));
        }

        let bytes_used = read_u64(header, Self::BYTES_USED_OFFSET);
        if bytes_used < Self::SIZE as u64 {
            return Err(Error::format(format!(
                "Declared asset length {} is smaller than its header",
                bytes_used
            )));
        }

        Ok(Self {
            block_size,
            compressor: read_u16(header, Self::COMPRESSOR_OFFSET),
            major_version,
            minor_version: read_u16(header, Self::MINOR_OFFSET),
            bytes_used,
        })
    }

    /// Write a minimal superblock declaring `bytes_used` (for synthesizing containers)
    pub fn synthesize(bytes_used: u64, block_size: u32) -> [u8; Self::SIZE] {
        let mut header = [0u8; Self::SIZE];
        header[0..4].copy_from_slice(&Self::MAGIC.to_le_bytes());
        header[Self::BLOCK_SIZE_OFFSET..Self::BLOCK_SIZE_OFFSET + 4]
            .copy_from_slice(&block_size.to_le_bytes());
        header[Self::COMPRESSOR_OFFSET..Self::COMPRESSOR_OFFSET + 2]
            .copy_from_slice(&1u16.to_le_bytes());
        header[Self::MAJOR_OFFSET..Self::MAJOR_OFFSET + 2]
            .copy_from_slice(&Self::MAJOR_VERSION.to_le_bytes());
        header[Self::BYTES_USED_OFFSET..Self::BYTES_USED_OFFSET + 8]
            .copy_from_slice(&bytes_used.to_le_bytes());
        header
    }
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
