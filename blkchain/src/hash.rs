// Rust blkchain library
// Written in 2026 by
//     The blkchain developers
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication
// along with this software.
// If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.
//

//! 256-bit hashes.
//!
//! Block and transaction identifiers are double-SHA256 digests. They are kept
//! in internal byte order and shown in the conventional reversed hex form, so
//! the mainnet genesis block reads `000000000019d668...`.

use core::fmt;
use core::str::FromStr;

use bitcoin::hashes::{Hash, sha256d};
use bitcoin::{BlockHash, TxMerkleNode, Txid};
use thiserror::Error;

/// Error returned when parsing a [`Hash256`] from a hex string fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HashParseError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The input decoded to the wrong number of bytes.
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 256-bit hash in internal (little-endian) byte order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash, used as the "no stop" marker in header requests.
    pub const ZERO: Hash256 = Hash256([0; 32]);

    /// Wraps raw bytes that are already in internal byte order.
    pub const fn from_byte_array(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    /// Returns the raw bytes in internal byte order.
    pub const fn to_byte_array(self) -> [u8; 32] {
        self.0
    }

    /// Borrows the raw bytes in internal byte order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes `SHA256(SHA256(data))`.
    pub fn double_sha256(data: &[u8]) -> Self {
        Hash256(sha256d::Hash::hash(data).to_byte_array())
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(HashParseError::InvalidLength(bytes.len()));
        }
        bytes.reverse();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash256(out))
    }
}

impl From<BlockHash> for Hash256 {
    fn from(hash: BlockHash) -> Self {
        Hash256(hash.to_byte_array())
    }
}

impl From<Hash256> for BlockHash {
    fn from(hash: Hash256) -> Self {
        BlockHash::from_byte_array(hash.0)
    }
}

impl From<Txid> for Hash256 {
    fn from(hash: Txid) -> Self {
        Hash256(hash.to_byte_array())
    }
}

impl From<TxMerkleNode> for Hash256 {
    fn from(hash: TxMerkleNode) -> Self {
        Hash256(hash.to_byte_array())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Hash256 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Hash256 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
