//! Size limits and validation helpers
//!
//! Containers and save partitions are held in memory while a session runs,
//! so every size read from a header is checked before allocating.

use crate::Error;
use std::path::{Path, PathBuf};

/// Maximum container size we'll load (4 GB)
pub const MAX_CONTAINER_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Maximum save partition size we'll allocate (1 GB)
pub const MAX_SAVE_PARTITION_SIZE: u64 = 1024 * 1024 * 1024;

/// Validate that a size is within allocation limits
pub fn validate_allocation_size(size: u64, limit: u64, context: &str) -> crate::Result<usize> {
    if size > limit {
        return Err(Error::format(format!(
            "{} size {} exceeds limit {}",
            context, size, limit
        )));
    }

    u64_to_usize(size, context)
}

/// Safely add two u64 values with overflow checking
pub fn checked_add_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| Error::format(format!("{}: addition overflow", context)))
}

/// Round `value` up to a multiple of `alignment`
pub fn align_up(value: u64, alignment: u64, context: &str) -> crate::Result<u64> {
    if alignment == 0 {
        return Err(Error::format(format!("{}: alignment must be non-zero", context)));
    }

    let remainder = value % alignment;
    if remainder == 0 {
        return Ok(value);
    }

    checked_add_u64(value, alignment - remainder, context)
}

/// Safely convert u64 to usize with platform checking
pub fn u64_to_usize(value: u64, context: &str) -> crate::Result<usize> {
    value.try_into().map_err(|_| {
        Error::format(format!(
            "{}: value {} exceeds platform usize limit",
            context, value
        ))
    })
}

/// Validate that `path` names an existing regular file
///
/// # Returns
/// Canonical absolute path if valid, error otherwise
pub fn validate_container_path(path: &Path) -> crate::Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::invalid_path("Empty path"));
    }

    let canonical = path.canonicalize().map_err(|e| {
        Error::invalid_path(format!(
            "{} does not exist or is inaccessible: {}",
            path.display(),
            e
        ))
    })?;

    if !canonical.is_file() {
        return Err(Error::invalid_path(format!(
            "{} is not a regular file",
            canonical.display()
        )));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_validate_allocation_size() {
        assert_eq!(validate_allocation_size(1024, MAX_SAVE_PARTITION_SIZE, "test").unwrap(), 1024);
        assert!(validate_allocation_size(
            MAX_SAVE_PARTITION_SIZE + 1,
            MAX_SAVE_PARTITION_SIZE,
            "test"
        )
        .is_err());
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(700, 1, "test").unwrap(), 700);
        assert_eq!(align_up(700, 4096, "test").unwrap(), 4096);
        assert_eq!(align_up(8192, 4096, "test").unwrap(), 8192);
        assert!(align_up(1, 0, "test").is_err());
        assert!(align_up(u64::MAX, 4096, "test").is_err());
    }

    #[test]
    fn test_checked_add_u64() {
        assert_eq!(checked_add_u64(1, 2, "test").unwrap(), 3);
        assert!(checked_add_u64(u64::MAX, 1, "test").is_err());
    }

    #[test]
    fn test_validate_container_path() {
        assert!(validate_container_path(Path::new("")).is_err());
        assert!(validate_container_path(Path::new("/nonexistent/game.uce")).is_err());

        let dir = tempdir().unwrap();
        assert!(matches!(
            validate_container_path(dir.path()),
            Err(Error::InvalidPath(_))
        ));

        let file = NamedTempFile::new().unwrap();
        assert!(validate_container_path(file.path()).is_ok());
    }
}
