//! Verified byte-for-byte backups of a container

use crate::assembler::write_atomic;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use ucetool_core::{Error, Result};

/// Backup path for `source`: the source file name with `.suffix` appended
pub fn backup_path_for(source: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = source.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy `source` to `dest` and verify the copy byte-for-byte
///
/// # Errors
/// Returns `Error::BackupMismatch` if the copy does not compare equal, or
/// `Error::Io` if either file cannot be read or written.
pub fn create_verified_backup(source: &Path, dest: &Path) -> Result<u64> {
    let permissions = fs::metadata(source)?.permissions();
    let written = write_atomic(dest, |file| {
        file.set_permissions(permissions)?;
        let mut reader = File::open(source)?;
        io::copy(&mut reader, file).map(|_| ())
    })?;

    verify_identical(source, dest)?;

    info!("Backed up {} to {}", source.display(), dest.display());
    Ok(written)
}

/// Compare two files byte-for-byte
pub fn verify_identical(a: &Path, b: &Path) -> Result<()> {
    let len_a = a.metadata()?.len();
    let len_b = b.metadata()?.len();
    if len_a != len_b {
        return Err(Error::BackupMismatch(format!(
            "{} is {} bytes but {} is {} bytes",
            a.display(),
            len_a,
            b.display(),
            len_b
        )));
    }

    let mut reader_a = BufReader::new(File::open(a)?);
    let mut reader_b = BufReader::new(File::open(b)?);
    let mut buf_a = vec![0u8; 64 * 1024];
    let mut buf_b = vec![0u8; 64 * 1024];
    let mut offset: u64 = 0;

    loop {
        let n = read_full(&mut reader_a, &mut buf_a)?;
        let m = read_full(&mut reader_b, &mut buf_b)?;
        if n != m {
            return Err(Error::BackupMismatch(format!(
                "files diverge in length near offset {}",
                offset
            )));
        }
        if n == 0 {
            return Ok(());
        }
        if let Some(pos) = buf_a[..n].iter().zip(&buf_b[..n]).position(|(x, y)| x != y) {
            return Err(Error::BackupMismatch(format!(
                "files differ at offset {}",
                offset + pos as u64
            )));
        }
        offset += n as u64;
    }
}

/// Fill `buf` as far as the reader allows
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
