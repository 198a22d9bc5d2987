#![deny(missing_docs)]

//! Computes content digests that are bit-identical to the object ids a version control system
//! assigns to file contents.
//!
//! A blob digest is the SHA-1 hash of the content prefixed with a small header:
//!
//! ```text
//! "blob " + <decimal byte length> + "\0" + <content>
//! ```
//!
//! Because this is the exact framing git uses for blob objects, a digest computed by this crate
//! for a file can be compared directly with the hash git reports for the same content.
//!
//! # Examples
//!
//! ```no_run
//! use pkghash_digest::{compute_bytes_blob_digest, compute_file_blob_digest};
//!
//! // The well-known id of the empty blob.
//! let empty = compute_bytes_blob_digest(b"");
//! assert_eq!(format!("{empty:x}"), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
//!
//! let digest = compute_file_blob_digest("package.json").unwrap();
//! println!("package.json: {digest:x}");
//! ```
//!
//! # Available functions
//!
//! - [`compute_bytes_blob_digest`]: Computes the blob digest of an in-memory buffer.
//! - [`compute_file_blob_digest`]: Computes the blob digest of a file on disk.
//! - [`compute_reader_blob_digest`]: Computes the blob digest of a stream with a known length.
//! - [`parse_digest_from_hex`]: Given a hex representation of a digest, parses it to bytes.
//! - [`HashingReader`]: An object that wraps a readable object and computes the hash of all
//!   content read through it.

pub use digest;

use digest::{Digest, Output};
use std::{
    io::{self, Read},
    path::Path,
};

pub use sha1::Sha1;

/// A type alias for the output of a blob digest.
pub type GitBlobHash = Output<Sha1>;

/// The length of the lowercase hex rendering of a [`GitBlobHash`].
pub const GIT_BLOB_HASH_HEX_LEN: usize = 40;

/// Returns the header that precedes the content of a blob of `len` bytes.
pub fn blob_header(len: u64) -> Vec<u8> {
    format!("blob {len}\0").into_bytes()
}

/// Compute the blob digest of the specified bytes.
pub fn compute_bytes_blob_digest(bytes: impl AsRef<[u8]>) -> GitBlobHash {
    let bytes = bytes.as_ref();
    let mut hasher = Sha1::default();
    hasher.update(blob_header(bytes.len() as u64));
    hasher.update(bytes);
    hasher.finalize()
}

/// Compute the blob digest of the file at the specified location.
///
/// The header is derived from the size reported by the filesystem. If the number of bytes that
/// are actually read differs (because the file was modified while it was being hashed) an error
/// of kind [`io::ErrorKind::InvalidData`] is returned instead of a digest that matches neither
/// version of the file.
pub fn compute_file_blob_digest(path: impl AsRef<Path>) -> Result<GitBlobHash, io::Error> {
    let file = fs_err::File::open(path.as_ref())?;
    let len = file.metadata()?.len();
    compute_reader_blob_digest(file, len)
}

/// Compute the blob digest of `len` bytes read from `reader`.
///
/// Fails with [`io::ErrorKind::InvalidData`] if the reader does not yield exactly `len` bytes.
pub fn compute_reader_blob_digest(reader: impl Read, len: u64) -> Result<GitBlobHash, io::Error> {
    let mut hasher = Sha1::default();
    hasher.update(blob_header(len));

    let mut reader = HashingReader::with_hasher(reader, hasher);
    let read = io::copy(&mut reader, &mut io::sink())?;
    if read != len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected {len} bytes but read {read}, the content changed while hashing"),
        ));
    }

    let (_, hash) = reader.finalize();
    Ok(hash)
}

/// Parses a hash hex string to a digest.
pub fn parse_digest_from_hex<D: Digest>(str: &str) -> Option<Output<D>> {
    let mut hash = <Output<D>>::default();
    match hex::decode_to_slice(str, &mut hash) {
        Ok(_) => Some(hash),
        Err(_) => None,
    }
}

/// A simple object that provides a [`Read`] implementation that also immediately hashes the bytes
/// read from it. Call [`HashingReader::finalize`] to retrieve both the original `impl Read`
/// object as well as the hash.
pub struct HashingReader<R, D: Digest> {
    reader: R,
    hasher: D,
}

impl<R, D: Digest + Default> HashingReader<R, D> {
    /// Constructs a new instance from a reader and a new (empty) hasher.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            hasher: Default::default(),
        }
    }
}

impl<R, D: Digest> HashingReader<R, D> {
    /// Constructs a new instance from a reader and a hasher that may already contain data.
    pub fn with_hasher(reader: R, hasher: D) -> Self {
        Self { reader, hasher }
    }

    /// Consumes this instance and returns the original reader and the hash of all bytes read from
    /// this instance.
    pub fn finalize(self) -> (R, Output<D>) {
        (self.reader, self.hasher.finalize())
    }
}

impl<R: Read, D: Digest> Read for HashingReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let bytes_read = self.reader.read(buf)?;
        self.hasher.update(&buf[..bytes_read]);
        Ok(bytes_read)
    }
}
