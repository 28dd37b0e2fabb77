//! Content hashing for the duplicate funnel.
//!
//! # Overview
//!
//! Two digests are computed here:
//!
//! - **Quick fingerprint**: BLAKE3 over the file size plus a bounded sample
//!   (head and tail). Used only to filter candidates; never proof of equality.
//! - **Full digest**: SHA-256 over the whole file, streamed through a fixed
//!   buffer. This is the only digest that justifies deletion.
//!
//! # Bounded I/O
//!
//! The quick fingerprint never reads more than `2 * sample_size` bytes,
//! whatever the file size. Files up to `2 * sample_size` bytes are read once
//! in full instead of issuing overlapping head/tail reads.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest as _, Sha256};

use super::HashError;

/// A 32-byte content digest (both BLAKE3 and SHA-256 produce 32 bytes).
pub type Digest = [u8; 32];

/// Default number of bytes sampled from each end of a file (8 KiB).
pub const DEFAULT_SAMPLE_SIZE: usize = 8 * 1024;

/// Buffer size for streaming the full digest (256 KiB).
pub const FULL_HASH_BUFFER_SIZE: usize = 256 * 1024;

/// File hasher for the quick and full stages.
///
/// Cheap to clone; each worker thread holds its own copy.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    sample_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 8 KiB sample size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    /// Create a hasher with a custom sample size.
    ///
    /// A zero sample size is raised to 1 byte.
    #[must_use]
    pub fn with_sample_size(sample_size: usize) -> Self {
        Self {
            sample_size: sample_size.max(1),
        }
    }

    /// Bytes sampled from each end of a large file.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Compute the quick fingerprint of the file at `path`.
    ///
    /// `size` is the size recorded by the walker and is folded into the digest.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened, read or seeked.
    pub fn quick_fingerprint(&self, path: &Path, size: u64) -> Result<Digest, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        quick_fingerprint_reader(&mut file, size, self.sample_size)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Compute the SHA-256 digest of the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::SizeChanged`] when the number of bytes read does
    /// not equal `expected_size`, or another [`HashError`] on I/O failure.
    pub fn full_digest(&self, path: &Path, expected_size: u64) -> Result<Digest, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let (digest, read) = full_digest_reader(file).map_err(|e| HashError::from_io(path, e))?;

        if read != expected_size {
            return Err(HashError::SizeChanged {
                path: path.to_path_buf(),
                expected: expected_size,
                actual: read,
            });
        }

        Ok(digest)
    }
}

/// Quick fingerprint over any seekable reader.
///
/// # Errors
///
/// Propagates any I/O error from the reader.
pub fn quick_fingerprint_reader<R: Read + Seek>(
    reader: &mut R,
    size: u64,
    sample_size: usize,
) -> io::Result<Digest> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&size.to_le_bytes());

    let sample = sample_size as u64;
    if size <= sample.saturating_mul(2) {
        let mut buf = Vec::with_capacity(size as usize);
        reader.take(size).read_to_end(&mut buf)?;
        hasher.update(&buf);
    } else {
        let mut buf = vec![0u8; sample_size];

        let head = read_up_to(reader, &mut buf)?;
        hasher.update(&buf[..head]);

        reader.seek(SeekFrom::End(-(sample as i64)))?;
        let tail = read_up_to(reader, &mut buf)?;
        hasher.update(&buf[..tail]);
    }

    Ok(*hasher.finalize().as_bytes())
}

/// Stream a reader through SHA-256, returning the digest and the byte count.
///
/// # Errors
///
/// Propagates any I/O error from the reader.
pub fn full_digest_reader<R: Read>(mut reader: R) -> io::Result<(Digest, u64)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; FULL_HASH_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((hasher.finalize().into(), total))
}

/// Fill `buf` as far as the reader allows; short only at end of input.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Convert a digest to a lowercase hexadecimal string.
#[must_use]
pub fn hash_to_hex(hash: &Digest) -> String {
    use std::fmt::Write;
    hash.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
