use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use md5::{Digest, Md5};

use crate::error::{HashError, HashResult};

const BLOCK_SIZE: usize = 64 * 1024;

/// Calculates the MD5 checksum of a file.
///
/// The file is read in fixed-size blocks so arbitrarily large artifacts never have to be held
/// in memory. The digest is returned as a lowercase hex-encoded string.
///
/// # Arguments
///
/// * `file_path` - The path to the file to calculate the checksum for.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be opened or read.
///
/// # Example
///
/// ```no_run
/// use wheelhouse_utils::error::HashResult;
/// use wheelhouse_utils::hash::calculate_checksum;
///
/// fn main() -> HashResult<()> {
///     let checksum = calculate_checksum("/path/to/file")?;
///     println!("Checksum is {}", checksum);
///     Ok(())
/// }
/// ```
pub fn calculate_checksum<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    };

    let file = File::open(file_path).map_err(read_failed)?;
    hash_reader(file).map_err(|err| {
        match err {
            HashError::StreamFailed { source } => read_failed(source),
            other => other,
        }
    })
}

/// Computes the MD5 checksum of everything readable from `reader`.
pub fn hash_reader<R: Read>(reader: R) -> HashResult<String> {
    let (_, checksum) = copy_with_checksum(reader, std::io::sink())?;
    Ok(checksum)
}

/// Copies `reader` into `writer` block by block, hashing the bytes on the way through.
///
/// Returns the number of bytes copied together with the hex-encoded MD5 digest. This lets a
/// caller stage an upload and learn its checksum in a single pass.
///
/// # Errors
///
/// * [`HashError::StreamFailed`] if reading or writing fails.
pub fn copy_with_checksum<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
) -> HashResult<(u64, String)> {
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut total = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(HashError::StreamFailed {
                    source: err,
                })
            }
        };
        hasher.update(&buffer[..read]);
        writer
            .write_all(&buffer[..read])
            .map_err(|err| HashError::StreamFailed { source: err })?;
        total += read as u64;
    }

    writer
        .flush()
        .map_err(|err| HashError::StreamFailed { source: err })?;

    Ok((total, format!("{:x}", hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use tempfile::NamedTempFile;

    use super::{calculate_checksum, copy_with_checksum, hash_reader};

    #[test]
    fn test_calculate_checksum() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world\n").unwrap();
        let path = file.path();

        let checksum = calculate_checksum(path).unwrap();
        assert_eq!(checksum, "6f5902ac237024bdd0c176cb93063dc4");
    }

    #[test]
    fn test_calculate_checksum_file_not_found() {
        let result = calculate_checksum("/path/to/nonexistent/file");
        assert!(result.is_err());
    }

    #[test]
    fn test_calculate_checksum_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = calculate_checksum(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_reader_empty() {
        let checksum = hash_reader(Cursor::new(Vec::new())).unwrap();
        assert_eq!(checksum, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_copy_with_checksum_spans_blocks() {
        let payload = vec![b'a'; 200 * 1024];
        let mut sink = Vec::new();

        let (copied, checksum) = copy_with_checksum(Cursor::new(&payload), &mut sink).unwrap();

        assert_eq!(copied, payload.len() as u64);
        assert_eq!(sink, payload);
        assert_eq!(checksum, hash_reader(Cursor::new(&payload)).unwrap());
    }
}
