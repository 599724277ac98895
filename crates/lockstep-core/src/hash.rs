//! Digest-based hash folding.
//!
//! Maps arbitrary strings to signed 32-bit integers by digesting the
//! UTF-8 bytes of the key and folding the first four digest bytes into
//! a big-endian `i32`. Five standard digest algorithms are supported;
//! an unknown algorithm name fails at construction, never at call time.

use std::sync::Arc;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::CoreError;

/// A pure string-to-`i32` hash function.
///
/// Implementations are stateless, deterministic, and safe to share
/// across threads; the ring and filters take them as `Arc<dyn HashFn>`.
pub trait HashFn: Send + Sync {
    /// Hashes a key to a signed 32-bit value.
    fn fold(&self, key: &str) -> i32;

    /// Algorithm name, for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Digest algorithms supported by [`DigestFolder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// MD5 (128-bit digest)
    Md5,
    /// SHA-1 (160-bit digest)
    Sha1,
    /// SHA-256 (256-bit digest)
    Sha256,
    /// SHA-384 (384-bit digest)
    Sha384,
    /// SHA-512 (512-bit digest)
    Sha512,
}

impl DigestAlgorithm {
    /// The five standard algorithms, in fixed order.
    pub const ALL: [DigestAlgorithm; 5] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    /// Looks up an algorithm by name.
    ///
    /// Accepts canonical names (`"MD5"`, `"SHA-256"`) and the dashless
    /// lowercase forms (`"sha256"`). Unknown names are a configuration
    /// error raised here, at construction.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(CoreError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    /// Canonical algorithm name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// First four digest bytes of `data`.
    ///
    /// Every supported digest emits at least 16 bytes, so four bytes are
    /// always available.
    fn leading_bytes(self, data: &[u8]) -> [u8; 4] {
        fn take4(digest: &[u8]) -> [u8; 4] {
            [digest[0], digest[1], digest[2], digest[3]]
        }

        match self {
            Self::Md5 => take4(Md5::digest(data).as_slice()),
            Self::Sha1 => take4(Sha1::digest(data).as_slice()),
            Self::Sha256 => take4(Sha256::digest(data).as_slice()),
            Self::Sha384 => take4(Sha384::digest(data).as_slice()),
            Self::Sha512 => take4(Sha512::digest(data).as_slice()),
        }
    }
}

/// Digest-backed [`HashFn`].
///
/// Folds the first four digest bytes big-endian, treating each byte as
/// unsigned before shifting, so the full signed 32-bit range including
/// negatives is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestFolder {
    algorithm: DigestAlgorithm,
}

impl DigestFolder {
    /// Creates a folder over the given algorithm.
    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Creates a folder from an algorithm name.
    ///
    /// Fails fast with [`CoreError::UnsupportedAlgorithm`] so a
    /// misconfigured name can never surface at call time.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Ok(Self::new(DigestAlgorithm::from_name(name)?))
    }

    /// The underlying algorithm.
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
}

impl HashFn for DigestFolder {
    fn fold(&self, key: &str) -> i32 {
        i32::from_be_bytes(self.algorithm.leading_bytes(key.as_bytes()))
    }

    fn name(&self) -> &'static str {
        self.algorithm.name()
    }
}

/// Builds the five standard digest folders, MD5 through SHA-512.
///
/// Construct once at startup and inject into the components that need
/// them; there is no global registry.
pub fn standard_folders() -> Vec<Arc<dyn HashFn>> {
    DigestAlgorithm::ALL
        .iter()
        .map(|&algorithm| Arc::new(DigestFolder::new(algorithm)) as Arc<dyn HashFn>)
        .collect()
}
