use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use xxhash_rust::xxh3::{Xxh3, xxh3_128};

/// Read buffer size used when streaming a file through the hasher
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hash an in-memory buffer. Same digest as [`hash_file`] over the same bytes.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    format_digest(xxh3_128(data))
}

/// Stream a file through XXH3-128 in fixed-size chunks.
///
/// # Errors
///
/// Returns [`Error::SourceUnavailable`] if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<String> {
    let unavailable = |source| Error::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unavailable)?;
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(unavailable)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format_digest(hasher.digest128()))
}

/// Check a file against a previously recorded digest
///
/// # Errors
///
/// Returns an error if the file cannot be hashed.
pub fn verify_hash(path: &Path, expected_hash: &str) -> Result<bool> {
    Ok(hash_file(path)? == expected_hash)
}

fn format_digest(digest: u128) -> String {
    format!("{digest:032x}")
}

/// Reader adapter that digests every byte read through it.
///
/// Lets a copy hash exactly the bytes it wrote, without a second pass.
pub struct HashingReader<R> {
    inner: R,
    hasher: Xxh3,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Xxh3::new(),
            bytes: 0,
        }
    }

    /// Number of bytes read so far
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Consume the reader and return the hex digest of everything read
    #[must_use]
    pub fn finish(self) -> String {
        format_digest(self.hasher.digest128())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}
