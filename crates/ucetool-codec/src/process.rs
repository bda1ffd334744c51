//! Blocking subprocess execution for external tools

use std::ffi::OsStr;
use std::io;
use std::process::{Command, Output};
use tracing::debug;
use ucetool_core::{Error, Result};

/// Run `cmd` to completion, capturing its output
///
/// # Errors
/// - `Error::Io` if the program cannot be started (a missing binary is
///   reported by name)
/// - `Error::Tool` if it exits unsuccessfully
pub fn run_tool(cmd: &mut Command) -> Result<Output> {
    let program = display(cmd.get_program());
    debug!("Running {} {}", program, render_args(cmd));

    let output = cmd.output().map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("missing required command: {}", program),
        )),
        _ => Error::Io(err),
    })?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::Tool {
            program,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn display(s: &OsStr) -> String {
    s.to_string_lossy().into_owned()
}

fn render_args(cmd: &Command) -> String {
    cmd.get_args().map(display).collect::<Vec<_>>().join(" ")
}
