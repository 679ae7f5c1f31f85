// Owner-only file helpers for config, database and log files.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Restrict an existing file to `0600`. No-op when the file is missing or on
/// non-Unix targets.
pub fn ensure_owner_only_file(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if !path.exists() {
            return Ok(());
        }

        let mode = fs::metadata(path)?.permissions().mode() & 0o777;
        if mode != 0o600 {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Restrict an existing directory to `0700`.
pub fn ensure_owner_only_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if !path.exists() {
            return Ok(());
        }

        let mode = fs::metadata(path)?.permissions().mode() & 0o777;
        if mode != 0o700 {
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        }
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Open `path` for appending, creating it with mode `0600` if needed.
pub fn open_private_append(path: &Path) -> io::Result<fs::File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        OpenOptions::new().create(true).append(true).mode(0o600).open(path)
    }
    #[cfg(not(unix))]
    {
        OpenOptions::new().create(true).append(true).open(path)
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename, so
/// readers never observe a half-written file. Parent directories are created.
pub fn write_private_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        #[cfg(unix)]
        let mut file = {
            use std::os::unix::fs::OpenOptionsExt;
            OpenOptions::new().create(true).write(true).truncate(true).mode(0o600).open(&tmp_path)?
        };
        #[cfg(not(unix))]
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;

        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    ensure_owner_only_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents_and_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a").join("b").join("db.json");

        write_private_atomic(&path, b"first").unwrap();
        write_private_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_file_name("db.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        write_private_atomic(&path, b"x = 1").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn append_keeps_existing_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("droppy.log");

        writeln!(open_private_append(&path).unwrap(), "one").unwrap();
        writeln!(open_private_append(&path).unwrap(), "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn owner_only_helpers_ignore_missing_paths() {
        let tmp = TempDir::new().unwrap();
        ensure_owner_only_file(&tmp.path().join("missing")).unwrap();
        ensure_owner_only_dir(&tmp.path().join("missing-dir")).unwrap();
    }
}
