use std::{fs, io, path::Path};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates `path` and its parents unless it already is a directory.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
///
/// # Example
///
/// ```no_run
/// use wheelhouse_utils::fs::ensure_dir_exists;
///
/// ensure_dir_exists("/srv/wheelhouse/media/dists").unwrap();
/// ```
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => {
            Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            })
        }
        Err(_) => {
            fs::create_dir_all(path).map_err(|source| {
                FileSystemError::Directory {
                    path: path.to_path_buf(),
                    action: "create",
                    source,
                }
            })
        }
    }
}

/// Removes a file, or a directory tree. A missing path is not an error.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };

    result.map_err(|source| {
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source,
        }
    })
}

/// Renames `from` over `to`, replacing any existing file.
///
/// Both paths must live on the same filesystem for the replacement to be atomic.
pub fn replace_file<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> FileSystemResult<()> {
    let to = to.as_ref();
    fs::rename(from.as_ref(), to).map_err(|source| {
        FileSystemError::File {
            path: to.to_path_buf(),
            action: "replace",
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_safe_remove_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_file.txt");
        fs::write(&file_path, "hello").unwrap();
        safe_remove(&file_path).unwrap();
        assert!(!file_path.exists());
    }

    #[test]
    fn test_safe_remove_dir() {
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("sub");
        fs::create_dir(&sub_dir).unwrap();
        safe_remove(&sub_dir).unwrap();
        assert!(!sub_dir.exists());
    }

    #[test]
    fn test_safe_remove_non_existent() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("non_existent.txt");
        safe_remove(&file_path).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let new_dir = dir.path().join("media").join("dists");
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file_path),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_replace_file_overwrites_target() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("staged");
        let to = dir.path().join("final");
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();

        replace_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
    }

    #[test]
    fn test_replace_file_missing_source() {
        let dir = tempdir().unwrap();
        let result = replace_file(dir.path().join("missing"), dir.path().join("final"));
        assert!(result.is_err());
    }
}
