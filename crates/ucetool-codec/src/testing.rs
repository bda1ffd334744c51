//! Deterministic in-process [`ImageTool`] for tests
//!
//! Images use a tiny archive format instead of a real filesystem so tests run
//! without e2fsprogs:
//!
//! ```text
//! "UCEARCH1"
//! repeated: kind u8 (1 = dir, 2 = file) | mode u32 | path len u16 | path | [data len u64 | data]
//! kind 0 terminator, zero padding to the image size
//! ```
//!
//! Entries are stored in walk order (components sorted by name) and carry
//! their recorded permission bits, so extraction followed by rebuilding is
//! byte-exact whenever the recorded modes are already 0755.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use ucetool_core::{Error, ImageTool, Result};
use walkdir::WalkDir;

const MAGIC: &[u8; 8] = b"UCEARCH1";
const KIND_END: u8 = 0;
const KIND_DIR: u8 = 1;
const KIND_FILE: u8 = 2;

/// One archived entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-separated path relative to the image root
    pub path: String,
    /// Recorded permission bits
    pub mode: u32,
    /// File content, `None` for directories
    pub data: Option<Vec<u8>>,
}

impl ArchiveEntry {
    /// Directory entry
    pub fn dir(path: &str, mode: u32) -> Self {
        Self {
            path: path.to_string(),
            mode,
            data: None,
        }
    }

    /// File entry
    pub fn file(path: &str, mode: u32, data: Vec<u8>) -> Self {
        Self {
            path: path.to_string(),
            mode,
            data: Some(data),
        }
    }
}

/// Archive-format image tool
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveTool;

impl ArchiveTool {
    /// Encode `entries` into an image of exactly `size` bytes
    pub fn encode(entries: &[ArchiveEntry], size: usize) -> Result<Vec<u8>> {
        let mut sorted: Vec<&ArchiveEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| Path::new(&a.path).cmp(Path::new(&b.path)));

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(MAGIC);
        for entry in sorted {
            let kind = if entry.data.is_some() { KIND_FILE } else { KIND_DIR };
            out.push(kind);
            out.extend_from_slice(&entry.mode.to_le_bytes());
            out.extend_from_slice(&(entry.path.len() as u16).to_le_bytes());
            out.extend_from_slice(entry.path.as_bytes());
            if let Some(ref data) = entry.data {
                out.extend_from_slice(&(data.len() as u64).to_le_bytes());
                out.extend_from_slice(data);
            }
        }
        out.push(KIND_END);

        if out.len() > size {
            return Err(Error::capacity(out.len() as u64, size as u64));
        }
        out.resize(size, 0);
        Ok(out)
    }

    /// Decode an image back into entries
    pub fn decode(image: &[u8]) -> Result<Vec<ArchiveEntry>> {
        if image.len() < MAGIC.len() || &image[..MAGIC.len()] != MAGIC {
            return Err(Error::codec("not an archive image"));
        }

        let mut cursor = Cursor { buf: image, pos: MAGIC.len() };
        let mut entries = Vec::new();
        loop {
            let kind = cursor.take(1)?[0];
            if kind == KIND_END {
                return Ok(entries);
            }
            let mode = u32::from_le_bytes(cursor.array()?);
            let path_len = u16::from_le_bytes(cursor.array()?) as usize;
            let path = String::from_utf8(cursor.take(path_len)?.to_vec())
                .map_err(|_| Error::codec("entry path is not UTF-8"))?;
            let data = match kind {
                KIND_DIR => None,
                KIND_FILE => {
                    let len = u64::from_le_bytes(cursor.array()?) as usize;
                    Some(cursor.take(len)?.to_vec())
                }
                other => return Err(Error::codec(format!("unknown entry kind {}", other))),
            };
            entries.push(ArchiveEntry { path, mode, data });
        }
    }

    /// Collect the entries of a directory tree in walk order
    pub fn collect(root: &Path) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::codec("entry outside archive root"))?;
            let path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let mode = mode_of(entry.path())?;
            if entry.file_type().is_dir() {
                entries.push(ArchiveEntry::dir(&path, mode));
            } else {
                entries.push(ArchiveEntry::file(&path, mode, fs::read(entry.path())?));
            }
        }
        Ok(entries)
    }
}

impl ImageTool for ArchiveTool {
    fn identify(&self) -> &str {
        "test archive"
    }

    fn dump(&self, image: &Path, dest: &Path) -> Result<()> {
        for entry in Self::decode(&fs::read(image)?)? {
            let target: PathBuf = dest.join(&entry.path);
            match entry.data {
                None => fs::create_dir_all(&target)?,
                Some(data) => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::File::create(&target)?.write_all(&data)?;
                }
            }
            set_mode(&target, entry.mode)?;
        }
        Ok(())
    }

    fn populate(&self, source: &Path, image: &Path) -> Result<()> {
        let size = fs::metadata(image)?.len() as usize;
        let bytes = Self::encode(&Self::collect(source)?, size)?;
        fs::write(image, bytes)?;
        Ok(())
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::codec("archive image is truncated"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

#[cfg(unix)]
fn mode_of(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_path: &Path) -> Result<u32> {
    Ok(0o755)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
