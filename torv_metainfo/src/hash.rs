//! Fixed size hash wrappers for the two digest schemes used by metainfo files.

use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Length of a SHA-1 hash.
pub const SHA1_HASH_LEN: usize = 20;

/// Length of a SHA-256 hash.
pub const SHA256_HASH_LEN: usize = 32;

/// SHA-1 hash wrapper type for performing operations on the hash.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Sha1Hash {
    hash: [u8; SHA1_HASH_LEN],
}

impl Sha1Hash {
    /// Create a `Sha1Hash` by hashing the given bytes.
    pub fn from_bytes(bytes: &[u8]) -> Sha1Hash {
        let mut digest = Sha1::new();
        digest.update(bytes);

        Sha1Hash { hash: digest.finalize().into() }
    }

    /// Create a `Sha1Hash` directly from the given hash bytes.
    pub fn from_hash(hash: &[u8]) -> Option<Sha1Hash> {
        if hash.len() != SHA1_HASH_LEN {
            None
        } else {
            let mut owned_hash = [0u8; SHA1_HASH_LEN];
            owned_hash.copy_from_slice(hash);

            Some(Sha1Hash { hash: owned_hash })
        }
    }

    /// Lowercase hex form of the hash.
    pub fn hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl AsRef<[u8]> for Sha1Hash {
    fn as_ref(&self) -> &[u8] {
        &self.hash
    }
}

impl From<[u8; SHA1_HASH_LEN]> for Sha1Hash {
    fn from(hash: [u8; SHA1_HASH_LEN]) -> Sha1Hash {
        Sha1Hash { hash }
    }
}

impl From<Sha1Hash> for [u8; SHA1_HASH_LEN] {
    fn from(hash: Sha1Hash) -> [u8; SHA1_HASH_LEN] {
        hash.hash
    }
}

impl PartialEq<[u8]> for Sha1Hash {
    fn eq(&self, other: &[u8]) -> bool {
        self.hash[..] == *other
    }
}

// ---------------------------------------------------------------------------//

/// SHA-256 hash wrapper type for performing operations on the hash.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Sha256Hash {
    hash: [u8; SHA256_HASH_LEN],
}

impl Default for Sha256Hash {
    fn default() -> Sha256Hash {
        Sha256Hash { hash: [0u8; SHA256_HASH_LEN] }
    }
}

impl Sha256Hash {
    /// Create a `Sha256Hash` by hashing the given bytes.
    pub fn from_bytes(bytes: &[u8]) -> Sha256Hash {
        let mut digest = Sha256::new();
        digest.update(bytes);

        Sha256Hash { hash: digest.finalize().into() }
    }

    /// Create a `Sha256Hash` directly from the given hash bytes.
    pub fn from_hash(hash: &[u8]) -> Option<Sha256Hash> {
        if hash.len() != SHA256_HASH_LEN {
            None
        } else {
            let mut owned_hash = [0u8; SHA256_HASH_LEN];
            owned_hash.copy_from_slice(hash);

            Some(Sha256Hash { hash: owned_hash })
        }
    }

    /// The all zeroes hash used to pad merkle leaf layers.
    pub fn zero() -> Sha256Hash {
        Sha256Hash::default()
    }

    /// Lowercase hex form of the hash.
    pub fn hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.hash
    }
}

impl From<[u8; SHA256_HASH_LEN]> for Sha256Hash {
    fn from(hash: [u8; SHA256_HASH_LEN]) -> Sha256Hash {
        Sha256Hash { hash }
    }
}

impl From<Sha256Hash> for [u8; SHA256_HASH_LEN] {
    fn from(hash: Sha256Hash) -> [u8; SHA256_HASH_LEN] {
        hash.hash
    }
}

impl PartialEq<[u8]> for Sha256Hash {
    fn eq(&self, other: &[u8]) -> bool {
        self.hash[..] == *other
    }
}

#[cfg(test)]
mod tests {
    use super::{Sha1Hash, Sha256Hash};

    #[test]
    fn positive_sha1_empty_input() {
        let hash = Sha1Hash::from_bytes(b"");

        assert_eq!(hash.hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn positive_sha256_hex_round_trip() {
        let hash = Sha256Hash::from_bytes(b"torv");
        let raw: [u8; 32] = hash.into();

        assert_eq!(Sha256Hash::from_hash(&raw).unwrap(), hash);
        assert_eq!(hash.hex().len(), 64);
    }

    #[test]
    fn negative_from_hash_wrong_length() {
        assert!(Sha1Hash::from_hash(&[0u8; 19]).is_none());
        assert!(Sha256Hash::from_hash(&[0u8; 31]).is_none());
    }
}
