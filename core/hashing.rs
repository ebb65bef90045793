use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const HASH_BUFFER_SIZE: usize = 8 * 1024;

/// Lowercase hex SHA-256 of the file contents, read through a fixed buffer.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let hex = format!("{:x}", hasher.finalize());
    log::trace!("sha256 {} {}", hex, path.display());
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn hashes_known_content() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.as_file_mut().write_all(b"abc").unwrap();
        assert_eq!(
            sha256_file(temp_file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hashes_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();
        assert_eq!(
            sha256_file(temp_file.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_larger_than_buffer_matches_one_shot_digest() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let content = vec![b'x'; HASH_BUFFER_SIZE * 3 + 17];
        temp_file.as_file_mut().write_all(&content).unwrap();
        let expected = format!("{:x}", Sha256::digest(&content));
        assert_eq!(sha256_file(temp_file.path()).unwrap(), expected);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sha256_file(&dir.path().join("missing.txt")).is_err());
    }
}
