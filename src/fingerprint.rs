//! Content fingerprinting for change detection.
//!
//! A source file's fingerprint is the SHA-256 of its bytes, streamed in
//! fixed-size blocks so large documents never load whole into memory. Two
//! imports of the same name are "the same content" exactly when their
//! fingerprints match.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BLOCK_SIZE: usize = 64 * 1024;

/// Returns the lowercase hex SHA-256 digest of the file's bytes.
/// Fails on any read error; never returns a partial digest.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
