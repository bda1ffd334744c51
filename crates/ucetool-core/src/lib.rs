//! # UCE Tool Core
//!
//! Core types, capability traits, and error handling for the UCE cartridge
//! engine.
//!
//! A UCE file is a read-only **asset region** (a squashfs image holding the
//! emulator core, ROM and metadata) followed by a **save partition** (a small
//! fixed-size filesystem image holding save games). The engine splits the two,
//! lets the save partition be edited as a directory tree, and reassembles the
//! container with the asset region untouched.
//!
//! ## Example
//!
//! ```rust
//! use ucetool_core::UceContainer;
//!
//! let container = UceContainer::new(vec![0u8; 700], vec![0u8; 324]);
//! assert_eq!(container.total_length(), 1024);
//! assert_eq!(container.boundary(), 700);
//! ```

pub mod error;
pub mod limits;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use limits::*;
pub use traits::{Confirmation, EditorInvoker, ImageTool, Mounter, PrivilegeCheck};
pub use types::{
    format_size, ContainerLayout, ContainerSummary, EditStrategy, ExtractedTree,
    SavePartitionImage, UceContainer,
};
