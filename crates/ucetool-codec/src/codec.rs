//! Save partition codec: image bytes <-> directory tree

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use ucetool_core::{
    format_size, validate_allocation_size, Error, ExtractedTree, ImageTool, Result,
    SavePartitionImage, MAX_SAVE_PARTITION_SIZE,
};
use walkdir::WalkDir;

/// Permission bits forced onto every extracted entry
pub const NORMALIZED_MODE: u32 = 0o755;

/// Converts save partitions to directory trees and back
///
/// The filesystem format itself is handled by an external [`ImageTool`];
/// this type owns sizing, scratch image files, permission normalization,
/// and capacity enforcement.
pub struct SavePartitionCodec<'a> {
    tool: &'a dyn ImageTool,
    work_dir: Option<PathBuf>,
}

impl<'a> SavePartitionCodec<'a> {
    /// Create a codec driving the given tool
    ///
    /// Intermediate image files go to the system temp directory unless a
    /// work directory is set.
    pub fn new(tool: &'a dyn ImageTool) -> Self {
        Self {
            tool,
            work_dir: None,
        }
    }

    /// Place intermediate image files in `dir`
    pub fn with_work_dir(mut self, dir: &Path) -> Self {
        self.work_dir = Some(dir.to_path_buf());
        self
    }

    fn scratch_image(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("save-").suffix(".img");
        let file = match &self.work_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    /// Materialize `image` as a directory tree under `dest`
    ///
    /// Every entry below `dest` ends up with mode 0755 regardless of what the
    /// image recorded. Partial output is left behind on failure.
    ///
    /// # Errors
    /// - `Error::Codec` if the image cannot be decoded
    /// - `Error::Io` if writing the tree fails
    pub fn extract(&self, image: &[u8], dest: &Path) -> Result<ExtractedTree> {
        fs::create_dir_all(dest)?;

        if image.is_empty() {
            debug!("Empty save partition, nothing to extract");
            return tree_summary(dest);
        }

        let mut scratch = self.scratch_image()?;
        scratch.write_all(image)?;
        scratch.as_file().sync_all()?;

        debug!(
            "Extracting {} save partition with {}",
            format_size(image.len() as u64),
            self.tool.identify()
        );
        self.tool.dump(scratch.path(), dest)?;
        normalize_permissions(dest)?;

        let tree = tree_summary(dest)?;
        info!(
            "Extracted {} files and {} directories into {}",
            tree.files,
            tree.directories,
            dest.display()
        );
        Ok(tree)
    }

    /// Build a fresh image of exactly `target_size` bytes from `source`
    ///
    /// # Errors
    /// - `Error::Capacity` if the content cannot fit in `target_size` bytes
    /// - `Error::Codec` if the tool produced an image of the wrong size
    /// - `Error::Io` / `Error::Tool` if the tool cannot run
    pub fn build(&self, source: &Path, target_size: u64) -> Result<SavePartitionImage> {
        let size = validate_allocation_size(target_size, MAX_SAVE_PARTITION_SIZE, "Save partition")?;
        let tree = tree_summary(source)?;
        let required = tree.bytes;

        if required > target_size {
            return Err(Error::capacity(required, target_size));
        }
        if target_size == 0 {
            // A zero-size partition cannot hold even an empty directory
            if tree.files + tree.directories > 0 {
                return Err(Error::capacity(required, 0));
            }
            return Ok(SavePartitionImage::from_bytes(Vec::new()));
        }

        // Zero-filled image of the target size for the builder to populate
        let scratch = self.scratch_image()?;
        scratch.as_file().set_len(target_size)?;

        debug!(
            "Building {} save partition from {} with {}",
            format_size(target_size),
            source.display(),
            self.tool.identify()
        );
        self.tool
            .populate(source, scratch.path())
            .map_err(|e| match e {
                Error::Capacity { .. } => Error::capacity(required, target_size),
                other => other,
            })?;

        let mut bytes = Vec::with_capacity(size);
        File::open(scratch.path())?.read_to_end(&mut bytes)?;
        if bytes.len() != size {
            return Err(Error::codec(format!(
                "{} produced a {}-byte image, expected {}",
                self.tool.identify(),
                bytes.len(),
                size
            )));
        }

        Ok(SavePartitionImage::from_bytes(bytes))
    }
}

/// Force mode 0755 onto every entry below `root`
///
/// Symlinks are skipped so their targets are never touched.
pub fn normalize_permissions(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_symlink() {
            continue;
        }
        set_mode(entry.path(), NORMALIZED_MODE)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Count files, directories and bytes below `root`
pub fn tree_summary(root: &Path) -> Result<ExtractedTree> {
    let mut tree = ExtractedTree {
        root: root.to_path_buf(),
        files: 0,
        directories: 0,
        bytes: 0,
    };

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            tree.directories += 1;
        } else {
            tree.files += 1;
            if file_type.is_file() {
                tree.bytes += entry.metadata().map_err(std::io::Error::from)?.len();
            }
        }
    }

    Ok(tree)
}
