//! Capability traits for the external collaborators of an edit session
//!
//! Every subprocess the engine depends on sits behind one of these traits so
//! the session can be driven by fakes in tests.

use crate::error::Result;
use std::path::Path;

/// External filesystem-image reader/builder for save partitions
pub trait ImageTool: Send + Sync {
    /// Get a human-readable identifier for this tool
    fn identify(&self) -> &str;

    /// Recursively dump the root of `image` into the existing directory `dest`
    fn dump(&self, image: &Path, dest: &Path) -> Result<()>;

    /// Populate the pre-sized blank image file `image` from `source`
    ///
    /// The image file must keep its length.
    fn populate(&self, source: &Path, image: &Path) -> Result<()>;
}

/// Loop-mount capability
pub trait Mounter: Send + Sync {
    /// Get a human-readable identifier for this mounter
    fn identify(&self) -> &str;

    /// Expose `image` as a filesystem mounted at `target`
    fn mount(&self, image: &Path, target: &Path) -> Result<()>;

    /// Release the mount at `target`, flushing edits back into the image
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// Hands a directory to the user for editing and blocks until the editor exits
pub trait EditorInvoker: Send + Sync {
    fn edit(&self, dir: &Path) -> Result<()>;
}

/// Blocks until the user states that editing is complete
pub trait Confirmation: Send + Sync {
    fn wait_for_user(&self, dir: &Path) -> Result<()>;
}

/// Checks whether the host can run the loop-mount strategy
pub trait PrivilegeCheck: Send + Sync {
    /// Returns `Error::Permission` when mounting is not possible
    fn ensure_can_mount(&self) -> Result<()>;
}
