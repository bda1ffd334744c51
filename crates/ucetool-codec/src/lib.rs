//! # UCE Tool Codec
//!
//! Save partition handling for UCE containers:
//! - **SavePartitionCodec**: extract an image to a directory (with mode
//!   normalization) and build a same-size image from a directory
//! - **E2fsTools**: the e2fsprogs-backed [`ImageTool`](ucetool_core::ImageTool)
//!
//! ## Example
//!
//! ```rust,no_run
//! use ucetool_codec::{E2fsTools, SavePartitionCodec};
//! use std::path::Path;
//!
//! let tools = E2fsTools::default();
//! let codec = SavePartitionCodec::new(&tools);
//! let image = std::fs::read("save.img").unwrap();
//! codec.extract(&image, Path::new("save_part_contents")).unwrap();
//! let rebuilt = codec.build(Path::new("save_part_contents"), image.len() as u64).unwrap();
//! assert_eq!(rebuilt.size(), image.len() as u64);
//! ```

pub mod codec;
pub mod e2fs;
pub mod process;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use codec::{normalize_permissions, tree_summary, SavePartitionCodec, NORMALIZED_MODE};
pub use e2fs::E2fsTools;
pub use process::run_tool;
