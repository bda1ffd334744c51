//! Container assembler: atomic write-back of `asset || save`

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};
use ucetool_core::{format_size, Error, Result};

/// Reassembles containers on disk
///
/// All writes go to a temporary file in the target's directory and are
/// renamed over the target only after a complete, synced write. A reader
/// of the target path sees either the old bytes or the new bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerAssembler;

impl ContainerAssembler {
    /// Create a new assembler
    pub fn new() -> Self {
        Self
    }

    /// Write `asset_region || save_region` to `path`
    ///
    /// # Returns
    /// Number of bytes written
    ///
    /// # Errors
    /// Returns `Error::Io` if the parent directory is not writable or the
    /// write fails; `path` is untouched in that case.
    pub fn rebuild(&self, path: &Path, asset_region: &[u8], save_region: &[u8]) -> Result<u64> {
        let written = write_atomic(path, |file| {
            file.write_all(asset_region)?;
            file.write_all(save_region)
        })?;

        info!(
            "Rebuilt {} ({} asset + {} save)",
            path.display(),
            format_size(asset_region.len() as u64),
            format_size(save_region.len() as u64)
        );
        Ok(written)
    }

    /// Write a single region to its own file
    pub fn write_region(&self, path: &Path, bytes: &[u8]) -> Result<u64> {
        write_atomic(path, |file| file.write_all(bytes))
    }
}

/// Atomically replace `path` with whatever `fill` writes
///
/// The temporary file is removed if `fill` or any later step fails.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<u64>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".ucetool-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    // Keep the target's mode instead of the temp file's 0600
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    fill(temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;
    let written = temp.as_file().metadata()?.len();

    debug!(
        "Renaming {} over {}",
        temp.path().display(),
        path.display()
    );
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_rebuild_concatenates_regions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.uce");
        fs::write(&path, b"old contents").unwrap();

        let written = ContainerAssembler::new()
            .rebuild(&path, &[1u8; 700], &[2u8; 324])
            .unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(written, 1024);
        assert_eq!(data.len(), 1024);
        assert!(data[..700].iter().all(|&b| b == 1));
        assert!(data[700..].iter().all(|&b| b == 2));
        assert_eq!(entries(dir.path()), vec!["game.uce".to_string()]);
    }

    #[test]
    fn test_interrupted_write_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.uce");
        fs::write(&path, vec![7u8; 1024]).unwrap();

        let result = write_atomic(&path, |file| {
            file.write_all(&[1u8; 300])?;
            Err(io::Error::new(io::ErrorKind::Interrupted, "power loss"))
        });

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(fs::read(&path).unwrap(), vec![7u8; 1024]);
        assert_eq!(entries(dir.path()), vec!["game.uce".to_string()]);
    }

    #[test]
    fn test_missing_parent_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("game.uce");

        let result = ContainerAssembler::new().rebuild(&path, b"asset", b"save");
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_keeps_target_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("game.uce");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        ContainerAssembler::new().rebuild(&path, b"asset", b"save").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_write_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("save.img");

        let written = ContainerAssembler::new().write_region(&path, &[3u8; 64]).unwrap();
        assert_eq!(written, 64);
        assert_eq!(fs::read(&path).unwrap(), vec![3u8; 64]);
    }
}
