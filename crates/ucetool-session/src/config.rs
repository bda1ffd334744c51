//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ucetool_core::{ContainerLayout, EditStrategy};

/// Configuration for an edit session
///
/// Passed by value to [`EditSession::open`](crate::EditSession::open); nothing
/// is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Write a verified copy of the container before editing
    pub backup: bool,

    /// Extension appended to the container path for the backup
    pub backup_suffix: String,

    /// How the save partition is exposed for editing
    pub strategy: EditStrategy,

    /// Boundary rule for the asset region
    pub layout: ContainerLayout,

    /// Directory scratch space is created in (system temp dir if unset)
    pub scratch_root: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backup: false,
            backup_suffix: "bak".to_string(),
            strategy: EditStrategy::default(),
            layout: ContainerLayout::default(),
            scratch_root: None,
        }
    }
}

impl SessionConfig {
    /// Enable or disable the backup copy
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Set the edit strategy
    pub fn with_strategy(mut self, strategy: EditStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the boundary rule
    pub fn with_layout(mut self, layout: ContainerLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the scratch root directory
    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = Some(root);
        self
    }
}
