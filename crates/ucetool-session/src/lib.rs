//! # UCE Tool Session
//!
//! Orchestrates editing the save partition embedded in a UCE container:
//! - **EditSession**: the open/edit/commit/abort state machine
//! - **SessionConfig**: explicit per-session configuration
//! - **LoopMounter / CommandEditor / StdinConfirmation / HostPrivilege**:
//!   the production implementations of the session's capabilities
//!
//! Two strategies are supported. The mount strategy loop-mounts the save
//! image (Linux, root only) so edits land in the image directly. The
//! extract/rebuild strategy unpacks the image into a directory and builds a
//! same-size image from it once the user confirms they are done.

pub mod config;
pub mod editor;
pub mod mount;
pub mod scratch;
pub mod session;

pub use config::SessionConfig;
pub use editor::{CommandEditor, StdinConfirmation};
pub use mount::{HostPrivilege, LoopMounter, MountGuard};
pub use scratch::ScratchDir;
pub use session::{Capabilities, CommitOutcome, EditSession, SessionOutcome, SessionState};
