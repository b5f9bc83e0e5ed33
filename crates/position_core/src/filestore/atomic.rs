//! Crash-safe file replacement.

use crate::repo::{RepoError, RepoResult};
use std::io::Write;
use std::path::Path;

/// Prefix of in-flight temp files; readers skip anything starting with it.
pub const TEMP_FILE_PREFIX: &str = ".tmp-";

/// Writes `contents` to `path` via a synced temp file and a rename, so
/// readers observe either the old or the new file, never a partial one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> RepoResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .map_err(|err| RepoError::io(format!("create temp file in `{}`", dir.display()), err))?;

    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| RepoError::io(format!("write temp file for `{}`", path.display()), err))?;

    temp.persist(path)
        .map_err(|err| RepoError::io(format!("replace `{}`", path.display()), err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_atomic;
    use std::fs;

    #[test]
    fn replaces_existing_file_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_items.yaml");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
