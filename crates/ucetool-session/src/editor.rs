//! Handing the save partition to the user

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};
use ucetool_codec::run_tool;
use ucetool_core::{Confirmation, EditorInvoker, Result};

/// Launches an external program (usually a file manager) on the directory
#[derive(Debug, Clone)]
pub struct CommandEditor {
    /// Program to run with the directory as its only argument
    pub program: PathBuf,
}

impl CommandEditor {
    /// Editor running `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl CommandEditor {
    /// Editor for this host: `explorer.exe` on Windows, otherwise
    /// `configured` or `thunar`
    pub fn for_platform(configured: Option<PathBuf>) -> Self {
        Self::resolve(cfg!(windows), configured)
    }

    fn resolve(windows: bool, configured: Option<PathBuf>) -> Self {
        if windows {
            if let Some(program) = configured {
                warn!("Ignoring {} on Windows, using explorer.exe", program.display());
            }
            return Self::new("explorer.exe");
        }
        Self::new(configured.unwrap_or_else(|| PathBuf::from("thunar")))
    }
}

impl Default for CommandEditor {
    fn default() -> Self {
        Self::for_platform(None)
    }
}

impl EditorInvoker for CommandEditor {
    fn edit(&self, dir: &Path) -> Result<()> {
        info!("Opening {} with {}", dir.display(), self.program.display());
        run_tool(Command::new(&self.program).arg(dir))?;
        Ok(())
    }
}

/// Waits for the user to press enter on stdin
#[derive(Debug, Clone)]
pub struct StdinConfirmation {
    /// Text printed before waiting
    pub prompt: String,
}

impl Default for StdinConfirmation {
    fn default() -> Self {
        Self {
            prompt: "Press enter when ready".to_string(),
        }
    }
}

impl Confirmation for StdinConfirmation {
    fn wait_for_user(&self, dir: &Path) -> Result<()> {
        println!("Save partition contents are in {}", dir.display());
        print!("{} ", self.prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}
