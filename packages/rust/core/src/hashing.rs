//! Content hashing for idempotency tracking.
//!
//! The digest recorded with each successful conversion identifies exactly
//! which file version produced that output. Runs never consult it to skip
//! reconversion; re-running is safe and deterministic, not incremental.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use docnorm_shared::{DocNormError, Result};

/// Read size per chunk; files are never loaded whole.
const CHUNK_SIZE: usize = 8192;

/// SHA-256 digest of a file's content as lowercase hex, streamed in chunks.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| DocNormError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| DocNormError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"Hello World").expect("write");

        let first = digest_file(&path).expect("digest");
        let second = digest_file(&path).expect("digest");
        assert_eq!(first, second);
        // SHA-256 of "Hello World" is a known vector.
        assert_eq!(
            first,
            "a591a6d40bf420404a011733cfb7b190d62c65bf0bcda32b57b277d9ad9f146e"
        );
    }

    #[test]
    fn digest_is_content_sensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"Hello World").expect("write");
        std::fs::write(&b, b"Hello Worle").expect("write");

        assert_ne!(
            digest_file(&a).expect("digest"),
            digest_file(&b).expect("digest")
        );
    }

    #[test]
    fn digest_spans_multiple_chunks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0x42u8; CHUNK_SIZE * 3 + 7]).expect("write");

        let digest = digest_file(&path).expect("digest");
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = digest_file(&dir.path().join("nope.bin"));
        assert!(matches!(result, Err(DocNormError::Io { .. })));
    }
}
