//! e2fsprogs adapter: `debugfs` for extraction, `mke2fs -d` for building

use crate::process::run_tool;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use ucetool_core::{Error, ImageTool, Result};

/// Save partition tool backed by e2fsprogs
#[derive(Debug, Clone)]
pub struct E2fsTools {
    /// Path or name of the `debugfs` binary
    pub debugfs: PathBuf,

    /// Path or name of the `mke2fs` binary
    pub mke2fs: PathBuf,

    /// Filesystem type passed to `mke2fs -t`
    pub fs_type: String,
}

impl Default for E2fsTools {
    fn default() -> Self {
        let debugfs = if cfg!(windows) { "debugfs.exe" } else { "debugfs" };
        let mke2fs = if cfg!(windows) { "mke2fs.exe" } else { "mke2fs" };
        Self {
            debugfs: PathBuf::from(debugfs),
            mke2fs: PathBuf::from(mke2fs),
            fs_type: "ext4".to_string(),
        }
    }
}

/// debugfs messages that mean the image itself is unreadable
const DEBUGFS_DECODE_FAILURES: &[&str] = &[
    "Bad magic number",
    "Couldn't find valid filesystem superblock",
    "Filesystem has unsupported feature",
    "Attempt to read block from filesystem resulted in short read",
];

/// debugfs messages that mean part of the tree was not written out
const DEBUGFS_WRITE_FAILURES: &[&str] = &[
    "rdump:",
    "while writing",
    "while making directory",
    "No space left",
];

/// mke2fs messages that mean the content did not fit
const MKE2FS_CAPACITY_FAILURES: &[&str] = &[
    "Could not allocate block",
    "Could not allocate inode",
    "No space left on device",
    "Filesystem too small",
];

impl E2fsTools {
    /// debugfs script that dumps the image root into `dest_name`
    fn dump_script(dest_name: &str) -> String {
        format!("rdump / \"{}\"\n", dest_name)
    }
}

impl ImageTool for E2fsTools {
    fn identify(&self) -> &str {
        "e2fsprogs (debugfs/mke2fs)"
    }

    fn dump(&self, image: &Path, dest: &Path) -> Result<()> {
        let work_dir = dest
            .parent()
            .ok_or_else(|| Error::invalid_path(format!("{} has no parent", dest.display())))?;
        let dest_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::invalid_path(format!("{} has no usable name", dest.display())))?;

        let script = tempfile::Builder::new()
            .prefix("extract_cmd")
            .suffix(".txt")
            .tempfile_in(work_dir)?;
        fs::write(script.path(), Self::dump_script(dest_name))?;

        let output = run_tool(
            Command::new(&self.debugfs)
                .current_dir(work_dir)
                .arg("-f")
                .arg(script.path())
                .arg(image),
        )
        .map_err(|e| match e {
            Error::Tool { stderr, .. } => Error::codec(format!("debugfs could not read image: {}", stderr)),
            other => other,
        })?;

        check_dump_stderr(&String::from_utf8_lossy(&output.stderr))
    }

    fn populate(&self, source: &Path, image: &Path) -> Result<()> {
        let available = fs::metadata(image)?.len();

        run_tool(
            Command::new(&self.mke2fs)
                .arg("-q")
                .arg("-F")
                .arg("-t")
                .arg(&self.fs_type)
                .arg("-d")
                .arg(source)
                .arg(image),
        )
        .map_err(|e| classify_mke2fs_failure(e, available))?;

        Ok(())
    }
}

/// debugfs reports most failures on stderr while still exiting 0
fn check_dump_stderr(stderr: &str) -> Result<()> {
    if let Some(line) = find_line(stderr, DEBUGFS_DECODE_FAILURES) {
        return Err(Error::codec(format!("debugfs could not read image: {}", line)));
    }
    if let Some(line) = find_line(stderr, DEBUGFS_WRITE_FAILURES) {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("debugfs could not write extracted tree: {}", line),
        )));
    }

    Ok(())
}

fn find_line<'a>(stderr: &'a str, markers: &[&str]) -> Option<&'a str> {
    stderr
        .lines()
        .find(|line| markers.iter().any(|m| line.contains(m)))
        .map(str::trim)
}

/// Turn an out-of-space mke2fs failure into a capacity error
fn classify_mke2fs_failure(err: Error, available: u64) -> Error {
    match err {
        Error::Tool { ref stderr, .. }
            if MKE2FS_CAPACITY_FAILURES.iter().any(|m| stderr.contains(m)) =>
        {
            Error::capacity(0, available)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binaries() {
        let tools = E2fsTools::default();
        assert_eq!(tools.fs_type, "ext4");
        if cfg!(unix) {
            assert_eq!(tools.debugfs, PathBuf::from("debugfs"));
            assert_eq!(tools.mke2fs, PathBuf::from("mke2fs"));
        }
    }

    #[test]
    fn test_dump_script() {
        assert_eq!(
            E2fsTools::dump_script("save_part_contents"),
            "rdump / \"save_part_contents\"\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_debugfs_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("save.img");
        let dest = dir.path().join("contents");
        fs::write(&image, [0u8; 16]).unwrap();
        fs::create_dir(&dest).unwrap();

        let tools = E2fsTools {
            debugfs: PathBuf::from("ucetool-missing-debugfs"),
            ..Default::default()
        };

        assert!(matches!(tools.dump(&image, &dest), Err(Error::Io(_))));
    }

    /// Install a stand-in debugfs that runs `body` and return its tool set
    #[cfg(unix)]
    fn fake_debugfs(dir: &Path, body: &str) -> E2fsTools {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-debugfs");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        file.sync_all().unwrap();
        drop(file);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        E2fsTools {
            debugfs: path,
            ..Default::default()
        }
    }

    #[cfg(unix)]
    fn dump_with(body: &str) -> (tempfile::TempDir, Result<()>) {
        let dir = tempfile::tempdir().unwrap();
        let tools = fake_debugfs(dir.path(), body);
        let image = dir.path().join("save.img");
        let dest = dir.path().join("save_part_contents");
        fs::write(&image, [0u8; 1024]).unwrap();

        let result = tools.dump(&image, &dest);
        (dir, result)
    }

    #[cfg(unix)]
    #[test]
    fn test_dump_runs_script_in_parent_dir() {
        let (dir, result) = dump_with(
            "set -e\n\
             test \"$1\" = -f\n\
             grep -q 'rdump / \"save_part_contents\"' \"$2\"\n\
             mkdir save_part_contents\n\
             echo hi > save_part_contents/slot1.srm",
        );

        result.unwrap();
        assert_eq!(
            fs::read(dir.path().join("save_part_contents/slot1.srm")).unwrap(),
            b"hi\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dump_write_failure_is_io_error() {
        let (_dir, result) = dump_with(
            "echo 'rdump: No space left on device while writing file \"slot1.srm\"' >&2\n\
             exit 0",
        );

        match result {
            Err(Error::Io(e)) => assert!(e.to_string().contains("slot1.srm")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_dump_bad_superblock_is_codec_error() {
        let (_dir, result) = dump_with(
            "echo 'debugfs: Bad magic number in super-block while trying to open save.img' >&2\n\
             exit 0",
        );

        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_dump_nonzero_exit_is_codec_error() {
        let (_dir, result) = dump_with("echo 'something broke' >&2\nexit 1");

        match result {
            Err(Error::Codec(msg)) => assert!(msg.contains("something broke")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_check_dump_stderr() {
        assert!(check_dump_stderr("").is_ok());
        assert!(check_dump_stderr("debugfs 1.47.0 (5-Feb-2023)\n").is_ok());
        assert!(matches!(
            check_dump_stderr("rdump: Operation not permitted while making directory \"upper\""),
            Err(Error::Io(_))
        ));
        assert!(matches!(
            check_dump_stderr("Couldn't find valid filesystem superblock."),
            Err(Error::Codec(_))
        ));
    }

    #[test]
    fn test_mke2fs_space_failure_is_capacity_error() {
        let err = Error::Tool {
            program: "mke2fs".to_string(),
            code: Some(1),
            stderr: "__populate_fs: Could not allocate block in ext2 filesystem".to_string(),
        };

        match classify_mke2fs_failure(err, 4096) {
            Error::Capacity { available, .. } => assert_eq!(available, 4096),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_mke2fs_failures_pass_through() {
        let err = Error::Tool {
            program: "mke2fs".to_string(),
            code: Some(1),
            stderr: "invalid option -- 'd'".to_string(),
        };

        assert!(matches!(classify_mke2fs_failure(err, 4096), Error::Tool { .. }));
    }
}
