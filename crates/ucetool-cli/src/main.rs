//! UCE Tool CLI - inspect UCE cartridges and edit their save partitions

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use ucetool_codec::E2fsTools;
use ucetool_container::{ContainerAssembler, ContainerParser};
use ucetool_core::{format_size, ContainerLayout, EditStrategy};
use ucetool_session::{
    Capabilities, CommandEditor, EditSession, HostPrivilege, LoopMounter, SessionConfig,
    SessionOutcome, StdinConfirmation,
};

#[derive(Parser)]
#[command(name = "ucetool")]
#[command(about = "Inspect UCE cartridges and edit their save partitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show the region layout and asset digest of a container
    Info {
        /// UCE file
        path: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Write the asset region and the save partition to separate files
    Split {
        /// UCE file
        path: PathBuf,

        /// Output file for the asset region
        #[arg(long)]
        asset_out: PathBuf,

        /// Output file for the save partition image
        #[arg(long)]
        save_out: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Edit the save partition of a container in place
    Edit {
        /// UCE file
        path: PathBuf,

        /// Write a verified <file>.bak copy first
        #[arg(long)]
        backup: bool,

        /// Loop-mount the save partition instead of extracting it (Linux, root)
        #[arg(long)]
        mount: bool,

        /// Program used to edit the save partition directory (Windows always uses explorer.exe)
        #[arg(long, env = "UCETOOL_EDITOR")]
        editor: Option<PathBuf>,

        /// debugfs binary
        #[arg(long, env = "UCETOOL_DEBUGFS")]
        debugfs: Option<PathBuf>,

        /// mke2fs binary
        #[arg(long, env = "UCETOOL_MKE2FS")]
        mke2fs: Option<PathBuf>,

        /// Directory for scratch files (defaults to the system temp dir)
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

/// Boundary rule options shared by every command
#[derive(Args, Clone, Copy)]
struct LayoutArgs {
    /// Block size the asset region is padded to
    #[arg(long, default_value = "1")]
    align: u64,

    /// Bytes between the padded asset region and the save partition
    #[arg(long, default_value = "0")]
    trailer: u64,
}

impl From<LayoutArgs> for ContainerLayout {
    fn from(args: LayoutArgs) -> Self {
        ContainerLayout {
            alignment: args.align,
            trailer_len: args.trailer,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Info { path, json, layout } => cmd_info(&path, json, layout.into()),
        Command::Split {
            path,
            asset_out,
            save_out,
            layout,
        } => cmd_split(&path, &asset_out, &save_out, layout.into()),
        Command::Edit {
            path,
            backup,
            mount,
            editor,
            debugfs,
            mke2fs,
            scratch_dir,
            layout,
        } => {
            let strategy = if mount {
                EditStrategy::Mount
            } else {
                EditStrategy::ExtractRebuild
            };
            let mut config = SessionConfig::default()
                .with_backup(backup)
                .with_strategy(strategy)
                .with_layout(layout.into());
            config.scratch_root = scratch_dir;

            let mut tools = E2fsTools::default();
            if let Some(debugfs) = debugfs {
                tools.debugfs = debugfs;
            }
            if let Some(mke2fs) = mke2fs {
                tools.mke2fs = mke2fs;
            }
            let editor = CommandEditor::for_platform(editor);

            cmd_edit(&path, config, &tools, &editor)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        eprintln!("{}", outcome_note(&e));
        process::exit(1);
    }
}

/// Tell the user whether the container on disk was touched
fn outcome_note(err: &anyhow::Error) -> &'static str {
    let written = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ucetool_core::Error>())
        .any(|e| !e.nothing_written());

    if written {
        "The container was rewritten before the failure; restore it from the backup if one was made."
    } else {
        "The container was not modified."
    }
}

fn cmd_info(path: &Path, json: bool, layout: ContainerLayout) -> Result<()> {
    let summary = ContainerParser::new(layout)
        .summarize(path)
        .with_context(|| format!("failed to inspect {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("=== UCE Container ===");
        println!("Path:       {}", path.display());
        println!("{}", summary);
    }

    Ok(())
}

fn cmd_split(path: &Path, asset_out: &Path, save_out: &Path, layout: ContainerLayout) -> Result<()> {
    let container = ContainerParser::new(layout)
        .parse(path)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let assembler = ContainerAssembler::new();
    assembler.write_region(asset_out, container.asset_region())?;
    assembler.write_region(save_out, container.save_region())?;

    println!(
        "Asset region: {} -> {}",
        format_size(container.asset_region().len() as u64),
        asset_out.display()
    );
    println!(
        "Save region:  {} -> {}",
        format_size(container.save_region().len() as u64),
        save_out.display()
    );

    Ok(())
}

fn cmd_edit(path: &Path, config: SessionConfig, tools: &E2fsTools, editor: &CommandEditor) -> Result<()> {
    let mounter = LoopMounter::default();
    let confirmation = StdinConfirmation::default();
    let caps = Capabilities {
        image_tool: tools,
        mounter: &mounter,
        editor,
        confirmation: &confirmation,
        privilege: &HostPrivilege,
    };

    match EditSession::run(path, config, caps)? {
        SessionOutcome::Rebuilt(outcome) => {
            println!(
                "Rebuilt {} ({} bytes)",
                outcome.path.display(),
                outcome.bytes_written
            );
            if let Some(backup) = outcome.backup_path {
                println!("Original saved as {}", backup.display());
            }
        }
        SessionOutcome::Discarded { .. } => {
            println!("No changes written to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucetool_core::Error;

    #[test]
    fn test_outcome_note() {
        let untouched = anyhow::Error::new(Error::capacity(10, 5)).context("edit failed");
        assert_eq!(outcome_note(&untouched), "The container was not modified.");

        let plain = anyhow::anyhow!("no such file");
        assert_eq!(outcome_note(&plain), "The container was not modified.");

        let rewritten = anyhow::Error::new(Error::Committed {
            path: PathBuf::from("game.uce"),
            source: Box::new(Error::codec("length mismatch")),
        });
        assert!(outcome_note(&rewritten).starts_with("The container was rewritten"));
    }
}
