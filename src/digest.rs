//! Content digest of the attested document

use crate::error::Result;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

/// Content hashed when no input is given. The verification service does not
/// check the digest against any invoice, so the resulting code is still valid.
pub const FALLBACK_PAYLOAD: &[u8] = b"KSeF is dead, baby, KSeF is dead...";

/// Length of a [`ContentDigest`] in bytes
pub const DIGEST_LEN: usize = 32;

/// Where the attested content comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestSource {
    /// A file on disk
    File(PathBuf),
    /// Standard input, read to end of stream
    Stdin,
    /// [`FALLBACK_PAYLOAD`]
    Fallback,
}

impl DigestSource {
    /// Interpret a command-line argument: empty means fallback, `-` means stdin.
    pub fn from_arg(arg: &str) -> Self {
        match arg.trim() {
            "" => Self::Fallback,
            "-" => Self::Stdin,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// Read the whole source and hash it.
    pub fn digest(&self) -> Result<ContentDigest> {
        match self {
            Self::File(path) => {
                let file = File::open(path)?;
                digest_reader(file)
            }
            Self::Stdin => digest_reader(io::stdin().lock()),
            Self::Fallback => Ok(ContentDigest::of(FALLBACK_PAYLOAD)),
        }
    }
}

impl fmt::Display for DigestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Stdin => f.write_str("standard input"),
            Self::Fallback => f.write_str("placeholder content"),
        }
    }
}

/// Stream a reader through SHA-256 until end of input.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<ContentDigest> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(ContentDigest(hasher.finalize().into()))
}

/// SHA-256 digest of the attested content
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Hash an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Wrap an already computed digest.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Base64URL without padding, as embedded in verification links
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", hex::encode(self.0))
    }
}
