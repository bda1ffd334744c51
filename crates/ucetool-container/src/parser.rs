//! Container parser: locate the asset/save boundary inside a UCE file

use crate::squashfs::SquashfsSuperblock;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;
use ucetool_core::{
    align_up, checked_add_u64, format_size, validate_allocation_size, ContainerLayout,
    ContainerSummary, Error, Result, UceContainer, MAX_CONTAINER_SIZE,
};

/// Where the regions of a container begin and end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// Length the asset header declares for itself
    pub declared_length: u64,

    /// Offset of the first save partition byte
    pub offset: u64,

    /// Total container length
    pub total_length: u64,
}

impl Boundary {
    /// Save partition length in bytes
    pub fn save_length(&self) -> u64 {
        self.total_length - self.offset
    }
}

/// Splits UCE files into asset and save regions
///
/// # Example
///
/// ```rust,no_run
/// use ucetool_container::ContainerParser;
/// use ucetool_core::ContainerLayout;
/// use std::path::Path;
///
/// let parser = ContainerParser::new(ContainerLayout::default());
/// let container = parser.parse(Path::new("game.uce")).unwrap();
/// println!("save partition: {} bytes", container.save_region().len());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerParser {
    layout: ContainerLayout,
}

impl ContainerParser {
    /// Create a parser using the given boundary rule
    pub fn new(layout: ContainerLayout) -> Self {
        Self { layout }
    }

    /// Boundary rule in use
    pub fn layout(&self) -> ContainerLayout {
        self.layout
    }

    /// Parse a container file from disk
    ///
    /// # Errors
    ///
    /// - `Error::Format` if the header is missing, invalid, or declares more
    ///   bytes than the file holds
    /// - `Error::Io` if the file cannot be read
    pub fn parse(&self, path: &Path) -> Result<UceContainer> {
        let mut file = File::open(path)?;
        let container = self.parse_stream(&mut file)?;
        debug!(
            "Parsed {}: asset {} + save {}",
            path.display(),
            format_size(container.boundary()),
            format_size(container.save_region().len() as u64)
        );
        Ok(container)
    }

    /// Parse a container from any readable and seekable stream
    pub fn parse_stream<R: Read + Seek>(&self, stream: &mut R) -> Result<UceContainer> {
        let (boundary, _) = self.locate(stream)?;

        let asset_len = validate_allocation_size(boundary.offset, MAX_CONTAINER_SIZE, "Asset region")?;
        let save_len =
            validate_allocation_size(boundary.save_length(), MAX_CONTAINER_SIZE, "Save region")?;

        stream.seek(SeekFrom::Start(0))?;
        let mut asset_region = vec![0u8; asset_len];
        stream.read_exact(&mut asset_region)?;
        let mut save_region = vec![0u8; save_len];
        stream.read_exact(&mut save_region)?;

        Ok(UceContainer::new(asset_region, save_region))
    }

    /// Compute the region boundary without loading either region
    pub fn locate<R: Read + Seek>(&self, stream: &mut R) -> Result<(Boundary, SquashfsSuperblock)> {
        let total_length = stream.seek(SeekFrom::End(0))?;
        if total_length > MAX_CONTAINER_SIZE {
            return Err(Error::format(format!(
                "container size {} exceeds limit {}",
                total_length, MAX_CONTAINER_SIZE
            )));
        }

        stream.seek(SeekFrom::Start(0))?;
        let mut header = Vec::with_capacity(SquashfsSuperblock::SIZE);
        stream
            .by_ref()
            .take(SquashfsSuperblock::SIZE as u64)
            .read_to_end(&mut header)?;
        let superblock = SquashfsSuperblock::parse(&header)?;

        let padded = align_up(superblock.bytes_used, self.layout.alignment, "Asset boundary")?;
        let offset = checked_add_u64(padded, self.layout.trailer_len, "Asset boundary")?;

        if offset > total_length {
            return Err(Error::format(format!(
                "truncated container: asset region needs {} bytes but file is {} bytes",
                offset, total_length
            )));
        }

        Ok((
            Boundary {
                declared_length: superblock.bytes_used,
                offset,
                total_length,
            },
            superblock,
        ))
    }

    /// Inspect a container file and digest its asset region
    pub fn summarize(&self, path: &Path) -> Result<ContainerSummary> {
        let mut file = File::open(path)?;
        let (boundary, superblock) = self.locate(&mut file)?;

        file.seek(SeekFrom::Start(0))?;
        let mut context = md5::Context::new();
        let mut remaining = boundary.offset;
        let mut buffer = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let chunk = remaining.min(buffer.len() as u64) as usize;
            file.read_exact(&mut buffer[..chunk])?;
            context.consume(&buffer[..chunk]);
            remaining -= chunk as u64;
        }

        Ok(ContainerSummary {
            total_length: boundary.total_length,
            declared_length: boundary.declared_length,
            boundary: boundary.offset,
            save_length: boundary.save_length(),
            block_size: superblock.block_size,
            asset_md5: format!("{:x}", context.compute()),
        })
    }
}
