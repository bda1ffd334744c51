//! # UCE Tool Container
//!
//! Splitting and reassembling UCE containers:
//! - **ContainerParser**: finds the asset/save boundary from the squashfs superblock
//! - **ContainerAssembler**: writes `asset || save` back atomically
//! - **Backups**: byte-for-byte verified copies of a container
//!
//! ## Example
//!
//! ```rust,no_run
//! use ucetool_container::{ContainerAssembler, ContainerParser};
//! use std::path::Path;
//!
//! let path = Path::new("game.uce");
//! let container = ContainerParser::default().parse(path).unwrap();
//! ContainerAssembler::new()
//!     .rebuild(path, container.asset_region(), container.save_region())
//!     .unwrap();
//! ```

pub mod assembler;
pub mod backup;
pub mod parser;
pub mod squashfs;

pub use assembler::{write_atomic, ContainerAssembler};
pub use backup::{backup_path_for, create_verified_backup, verify_identical};
pub use parser::{Boundary, ContainerParser};
pub use squashfs::SquashfsSuperblock;
