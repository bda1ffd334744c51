//! Loop-mount support for the mount strategy

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};
use ucetool_codec::run_tool;
use ucetool_core::{Error, Mounter, PrivilegeCheck, Result};

/// `mount -o loop` / `umount` mounter
#[derive(Debug, Clone)]
pub struct LoopMounter {
    /// Path or name of the `mount` binary
    pub mount: PathBuf,

    /// Path or name of the `umount` binary
    pub umount: PathBuf,
}

impl Default for LoopMounter {
    fn default() -> Self {
        Self {
            mount: PathBuf::from("mount"),
            umount: PathBuf::from("umount"),
        }
    }
}

impl Mounter for LoopMounter {
    fn identify(&self) -> &str {
        "loop mount"
    }

    fn mount(&self, image: &Path, target: &Path) -> Result<()> {
        run_tool(
            Command::new(&self.mount)
                .arg("-o")
                .arg("loop")
                .arg(image)
                .arg(target),
        )?;
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        run_tool(Command::new(&self.umount).arg(target))?;
        Ok(())
    }
}

/// An active mount, released when dropped
pub struct MountGuard<'a> {
    mounter: &'a dyn Mounter,
    target: PathBuf,
    mounted: bool,
}

impl<'a> MountGuard<'a> {
    /// Mount `image` at `target`
    pub fn mount(mounter: &'a dyn Mounter, image: &Path, target: &Path) -> Result<Self> {
        mounter.mount(image, target)?;
        debug!("Mounted {} at {}", image.display(), target.display());
        Ok(Self {
            mounter,
            target: target.to_path_buf(),
            mounted: true,
        })
    }

    /// Mount point
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Unmount now, reporting failure
    pub fn unmount(mut self) -> Result<()> {
        self.mounted = false;
        self.mounter.unmount(&self.target)?;
        debug!("Unmounted {}", self.target.display());
        Ok(())
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.mounted {
            if let Err(e) = self.mounter.unmount(&self.target) {
                warn!("Failed to unmount {}: {}", self.target.display(), e);
            }
        }
    }
}

/// Privilege check against the running process
///
/// Loop mounting needs Linux and an effective uid of 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPrivilege;

impl PrivilegeCheck for HostPrivilege {
    fn ensure_can_mount(&self) -> Result<()> {
        if !cfg!(target_os = "linux") {
            return Err(Error::permission(format!(
                "mount strategy is only available on Linux (running on {})",
                std::env::consts::OS
            )));
        }
        if !running_as_root() {
            return Err(Error::permission(
                "mount strategy requires running as root",
            ));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}
