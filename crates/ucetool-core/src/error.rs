//! Cartridge engine error types

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for UCE container operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or truncated container
    #[error("Invalid container format: {0}")]
    Format(String),

    /// I/O error while reading or writing files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External tool exited unsuccessfully
    #[error("{program} failed (exit code {code:?}): {stderr}")]
    Tool {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Save partition image could not be decoded or produced
    #[error("Save partition codec error: {0}")]
    Codec(String),

    /// Rebuilt content does not fit in the original partition
    #[error(
        "Save partition content does not fit in {available} bytes \
         ({required} bytes of file data plus filesystem overhead)"
    )]
    Capacity {
        required: u64,
        available: u64,
        /// Edited tree kept on disk so it can be trimmed and retried
        preserved: Option<PathBuf>,
    },

    /// Mount strategy attempted without the required platform or privilege
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Backup copy differs from the original
    #[error("Backup verification failed: {0}")]
    BackupMismatch(String),

    /// Operation invoked in the wrong session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Source path missing or not a regular file
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Failure detected after the container was already replaced
    #[error("{} was rewritten, but {source}", .path.display())]
    Committed {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias for UCE container operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Create a codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    /// Create a capacity error with no preserved tree
    pub fn capacity(required: u64, available: u64) -> Self {
        Error::Capacity {
            required,
            available,
            preserved: None,
        }
    }

    /// Create a permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Error::Permission(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Error::InvalidPath(msg.into())
    }

    /// Attach the location of a preserved edit tree to a capacity error
    pub fn with_preserved(self, path: PathBuf) -> Self {
        match self {
            Error::Capacity {
                required,
                available,
                ..
            } => Error::Capacity {
                required,
                available,
                preserved: Some(path),
            },
            other => other,
        }
    }

    /// True when the original container is guaranteed untouched
    ///
    /// Only `Committed` is raised after the atomic rename; every other
    /// variant aborts before the container is replaced.
    pub fn nothing_written(&self) -> bool {
        !matches!(self, Error::Committed { .. })
    }

    /// True when the error is an I/O-class failure (including subprocess failures)
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Tool { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_preserved_only_touches_capacity() {
        let err = Error::capacity(10, 5).with_preserved(PathBuf::from("/tmp/keep"));
        match err {
            Error::Capacity {
                required,
                available,
                preserved,
            } => {
                assert_eq!(required, 10);
                assert_eq!(available, 5);
                assert_eq!(preserved, Some(PathBuf::from("/tmp/keep")));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = Error::format("bad").with_preserved(PathBuf::from("/tmp/keep"));
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_nothing_written() {
        let untouched = [
            Error::format("bad magic"),
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
            Error::Tool {
                program: "mke2fs".to_string(),
                code: Some(1),
                stderr: String::new(),
            },
            Error::codec("bad superblock"),
            Error::capacity(10, 5),
            Error::permission("not root"),
            Error::BackupMismatch("differs".to_string()),
            Error::invalid_state("closed"),
            Error::invalid_path("missing"),
        ];
        for err in &untouched {
            assert!(err.nothing_written(), "{err}");
        }

        let committed = Error::Committed {
            path: PathBuf::from("game.uce"),
            source: Box::new(Error::codec("length mismatch")),
        };
        assert!(!committed.nothing_written());
        assert_eq!(
            committed.to_string(),
            "game.uce was rewritten, but Save partition codec error: length mismatch"
        );
    }

    #[test]
    fn test_capacity_message() {
        assert_eq!(
            Error::capacity(990_000, 1_048_576).to_string(),
            "Save partition content does not fit in 1048576 bytes \
             (990000 bytes of file data plus filesystem overhead)"
        );
    }

    #[test]
    fn test_tool_error_is_io_class() {
        let err = Error::Tool {
            program: "debugfs".to_string(),
            code: Some(1),
            stderr: "bad superblock".to_string(),
        };
        assert!(err.is_io());
        assert!(!Error::codec("x").is_io());
        assert_eq!(
            err.to_string(),
            "debugfs failed (exit code Some(1)): bad superblock"
        );
    }
}
