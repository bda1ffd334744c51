//! Scratch directory owned by a session

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use ucetool_core::Result;
use uuid::Uuid;

/// A uniquely named working directory removed when the guard drops
///
/// Call [`ScratchDir::preserve`] to keep the directory on disk instead.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    armed: bool,
}

impl ScratchDir {
    /// Create a new scratch directory under `root` (system temp dir if `None`)
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let path = root.join(format!("ucetool-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        debug!("Created scratch directory {}", path.display());

        Ok(Self { path, armed: true })
    }

    /// Location of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an entry inside the directory
    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Disarm the guard and leave the directory in place
    pub fn preserve(mut self) -> PathBuf {
        self.armed = false;
        self.path.clone()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed scratch directory {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
