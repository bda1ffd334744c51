//! Edit session: parse -> expose save partition -> rebuild -> write back
//!
//! ```text
//! open()   Idle -> Prepared      parse, optional verified backup, scratch dir
//! edit()   Prepared -> Edited    mount or extract/edit/confirm/build
//!                    -> Discarded on any failure (nothing written)
//! commit() Edited -> Rebuilt     atomic write of asset || new save
//! abort()  any -> Discarded
//! drop     Closed                scratch dir and mounts released
//! ```

use crate::config::SessionConfig;
use crate::mount::MountGuard;
use crate::scratch::ScratchDir;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use ucetool_codec::SavePartitionCodec;
use ucetool_container::{backup_path_for, create_verified_backup, ContainerAssembler, ContainerParser};
use ucetool_core::{
    format_size, validate_container_path, Confirmation, EditStrategy, EditorInvoker, Error,
    ImageTool, Mounter, PrivilegeCheck, Result,
};

/// Name of the scratch image file used by the mount strategy
const IMAGE_FILE: &str = "save.img";

/// Name of the directory the save partition is exposed in
const CONTENTS_DIR: &str = "save_part_contents";

/// External collaborators a session drives
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub image_tool: &'a dyn ImageTool,
    pub mounter: &'a dyn Mounter,
    pub editor: &'a dyn EditorInvoker,
    pub confirmation: &'a dyn Confirmation,
    pub privilege: &'a dyn PrivilegeCheck,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Container parsed, scratch space ready
    Prepared,
    /// Save partition handed to the editor
    Editing,
    /// New save partition ready to commit
    Edited,
    /// Container rewritten on disk
    Rebuilt,
    /// Session ended without writing
    Discarded,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Container that was rewritten
    pub path: PathBuf,
    /// Bytes written to the container
    pub bytes_written: u64,
    /// Verified backup of the original, if one was requested
    pub backup_path: Option<PathBuf>,
}

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The container was rewritten
    Rebuilt(CommitOutcome),
    /// Nothing was written
    Discarded { backup_path: Option<PathBuf> },
}

/// One edit of one container's save partition
///
/// The session exclusively owns its scratch directory and, in the mount
/// strategy, the loop mount. Both are released on every exit path.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use ucetool_codec::E2fsTools;
/// use ucetool_session::{Capabilities, CommandEditor, EditSession, HostPrivilege, LoopMounter,
///     SessionConfig, StdinConfirmation};
///
/// let tools = E2fsTools::default();
/// let mounter = LoopMounter::default();
/// let editor = CommandEditor::default();
/// let confirmation = StdinConfirmation::default();
/// let caps = Capabilities {
///     image_tool: &tools,
///     mounter: &mounter,
///     editor: &editor,
///     confirmation: &confirmation,
///     privilege: &HostPrivilege,
/// };
///
/// let mut session = EditSession::open(Path::new("game.uce"), SessionConfig::default(), caps).unwrap();
/// session.edit().unwrap();
/// session.commit().unwrap();
/// ```
pub struct EditSession<'a> {
    source: PathBuf,
    config: SessionConfig,
    caps: Capabilities<'a>,
    asset_region: Vec<u8>,
    save_region: Vec<u8>,
    new_save: Option<Vec<u8>>,
    backup_path: Option<PathBuf>,
    scratch: Option<ScratchDir>,
    state: SessionState,
}

impl<'a> EditSession<'a> {
    /// Parse `path` and prepare scratch space
    ///
    /// # Errors
    /// - `Error::InvalidPath` if `path` is not an existing regular file
    /// - `Error::Permission` if the mount strategy is not possible here
    /// - `Error::Format` if the container is malformed
    /// - `Error::BackupMismatch` / `Error::Io` if the backup fails
    ///
    /// The container is never modified by this call.
    pub fn open(path: &Path, config: SessionConfig, caps: Capabilities<'a>) -> Result<Self> {
        let source = validate_container_path(path)?;

        if config.strategy == EditStrategy::Mount {
            caps.privilege.ensure_can_mount()?;
        }

        let container = ContainerParser::new(config.layout).parse(&source)?;

        let backup_path = if config.backup {
            let dest = backup_path_for(&source, &config.backup_suffix);
            create_verified_backup(&source, &dest)?;
            Some(dest)
        } else {
            None
        };

        let scratch = ScratchDir::create(config.scratch_root.as_deref())?;

        info!(
            "Opened {} ({} asset, {} save partition, {})",
            source.display(),
            format_size(container.boundary()),
            format_size(container.save_region().len() as u64),
            config.strategy
        );

        let (asset_region, save_region) = container.into_regions();
        Ok(Self {
            source,
            config,
            caps,
            asset_region,
            save_region,
            new_save: None,
            backup_path,
            scratch: Some(scratch),
            state: SessionState::Prepared,
        })
    }

    /// Run a whole session: open, edit, and commit
    ///
    /// On failure the session is aborted and the container left untouched.
    pub fn run(path: &Path, config: SessionConfig, caps: Capabilities<'a>) -> Result<SessionOutcome> {
        let mut session = EditSession::open(path, config, caps)?;

        if let Err(e) = session.edit() {
            error!(
                "Editing {} failed, container left untouched: {}",
                session.source.display(),
                e
            );
            return Err(e);
        }

        session.commit().map(SessionOutcome::Rebuilt)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Canonical path of the container being edited
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Verified backup path, if one was written
    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    /// Scratch directory owned by the session
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(ScratchDir::path)
    }

    /// Expose the save partition to the editor and capture the result
    ///
    /// Any failure moves the session to `Discarded`.
    pub fn edit(&mut self) -> Result<()> {
        if self.state != SessionState::Prepared {
            return Err(Error::invalid_state(format!(
                "cannot edit a session in state {:?}",
                self.state
            )));
        }

        self.state = SessionState::Editing;
        let result = match self.config.strategy {
            EditStrategy::Mount => self.edit_mounted(),
            EditStrategy::ExtractRebuild => self.edit_extracted(),
        };

        match result {
            Ok(new_save) => {
                debug!("New save partition is {} bytes", new_save.len());
                self.new_save = Some(new_save);
                self.state = SessionState::Edited;
                Ok(())
            }
            Err(e) => {
                warn!("Discarding edit of {}: {}", self.source.display(), e);
                self.state = SessionState::Discarded;
                Err(e)
            }
        }
    }

    /// Write `asset || new save` back to the container
    pub fn commit(mut self) -> Result<CommitOutcome> {
        if self.state != SessionState::Edited {
            return Err(Error::invalid_state(format!(
                "cannot commit a session in state {:?}",
                self.state
            )));
        }

        let new_save = self
            .new_save
            .take()
            .ok_or_else(|| Error::invalid_state("edited session has no save partition"))?;

        let bytes_written =
            ContainerAssembler::new().rebuild(&self.source, &self.asset_region, &new_save)?;
        self.state = SessionState::Rebuilt;

        let expected = (self.asset_region.len() + new_save.len()) as u64;
        let on_disk = fs::metadata(&self.source).map(|m| m.len());
        match on_disk {
            Ok(len) if len == expected => {}
            Ok(len) => {
                return Err(self.committed(Error::codec(format!(
                    "container is {} bytes on disk, expected {}",
                    len, expected
                ))))
            }
            Err(e) => return Err(self.committed(Error::Io(e))),
        }

        Ok(CommitOutcome {
            path: self.source.clone(),
            bytes_written,
            backup_path: self.backup_path.clone(),
        })
    }

    /// End the session without writing
    pub fn abort(mut self) -> SessionOutcome {
        info!("Aborted edit of {}, nothing written", self.source.display());
        self.state = SessionState::Discarded;
        SessionOutcome::Discarded {
            backup_path: self.backup_path.clone(),
        }
    }

    fn committed(&self, source: Error) -> Error {
        Error::Committed {
            path: self.source.clone(),
            source: Box::new(source),
        }
    }

    fn scratch_path(&self) -> Result<PathBuf> {
        self.scratch
            .as_ref()
            .map(|s| s.path().to_path_buf())
            .ok_or_else(|| Error::invalid_state("session scratch directory already released"))
    }

    fn edit_extracted(&mut self) -> Result<Vec<u8>> {
        let scratch = self.scratch_path()?;
        let contents = scratch.join(CONTENTS_DIR);
        let codec = SavePartitionCodec::new(self.caps.image_tool).with_work_dir(&scratch);

        codec.extract(&self.save_region, &contents)?;
        self.caps.editor.edit(&contents)?;
        self.caps.confirmation.wait_for_user(&contents)?;

        match codec.build(&contents, self.save_region.len() as u64) {
            Ok(image) => Ok(image.into_bytes()),
            Err(e @ Error::Capacity { .. }) => {
                // Keep the edited tree so it can be trimmed and retried
                let kept = match self.scratch.take() {
                    Some(scratch) => scratch.preserve().join(CONTENTS_DIR),
                    None => contents,
                };
                warn!("Edited save data kept in {}", kept.display());
                Err(e.with_preserved(kept))
            }
            Err(e) => Err(e),
        }
    }

    fn edit_mounted(&mut self) -> Result<Vec<u8>> {
        if self.save_region.is_empty() {
            return Err(Error::codec("save partition is empty, nothing to mount"));
        }

        let dir = self.scratch_path()?;
        let image = dir.join(IMAGE_FILE);
        let mount_point = dir.join(CONTENTS_DIR);
        fs::write(&image, &self.save_region)?;
        fs::create_dir_all(&mount_point)?;

        let guard = MountGuard::mount(self.caps.mounter, &image, &mount_point)?;
        self.caps.editor.edit(guard.target())?;
        guard.unmount()?;
        fs::remove_dir(&mount_point)?;

        let new_save = fs::read(&image)?;
        if new_save.len() != self.save_region.len() {
            return Err(Error::codec(format!(
                "mounted image changed size from {} to {} bytes",
                self.save_region.len(),
                new_save.len()
            )));
        }

        Ok(new_save)
    }
}

impl Drop for EditSession<'_> {
    fn drop(&mut self) {
        debug!(
            "Closing session for {} in state {:?}",
            self.source.display(),
            self.state
        );
    }
}
