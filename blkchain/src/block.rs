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

//! Blocks and block headers.
//!
//! A [`BlockHeader`] is the 80-byte summary that links a block to its
//! predecessor. Its hash is the double-SHA256 of the consensus serialization
//! and is recomputed on demand, so a header cannot disagree with its own id.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::hash::Hash256;
use crate::transaction::Tx;

/// Size of a serialized block header in bytes.
pub const HEADER_SIZE: usize = 80;

/// Network magic of Bitcoin mainnet, as read little-endian off the wire.
pub const MAIN_NET_MAGIC: u32 = 0xD9B4_BEF9;

/// Returns the magic of `network` in the same representation as [`MAIN_NET_MAGIC`].
pub fn network_magic(network: bitcoin::Network) -> u32 {
    u32::from_le_bytes(network.magic().to_bytes())
}

/// A block header.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockHeader {
    /// Block version, as the raw consensus value.
    pub version: u32,
    /// Hash of the previous block.
    pub prev_hash: Hash256,
    /// Merkle root of the block's transactions.
    pub merkle_root: Hash256,
    /// Block time, unix seconds.
    pub time: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

impl BlockHeader {
    /// Consensus serialization of the header.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(self.prev_hash.as_bytes());
        buf[36..68].copy_from_slice(self.merkle_root.as_bytes());
        buf[68..72].copy_from_slice(&self.time.to_le_bytes());
        buf[72..76].copy_from_slice(&self.bits.to_le_bytes());
        buf[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    /// The block hash.
    pub fn hash(&self) -> Hash256 {
        Hash256::double_sha256(&self.serialize())
    }
}

impl From<&bitcoin::block::Header> for BlockHeader {
    fn from(header: &bitcoin::block::Header) -> Self {
        BlockHeader {
            version: header.version.to_consensus() as u32,
            prev_hash: header.prev_blockhash.into(),
            merkle_root: header.merkle_root.into(),
            time: header.time,
            bits: header.bits.to_consensus(),
            nonce: header.nonce,
        }
    }
}

impl From<bitcoin::block::Header> for BlockHeader {
    fn from(header: bitcoin::block::Header) -> Self {
        BlockHeader::from(&header)
    }
}

/// A full block.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Block {
    /// Magic of the network the block was received from.
    pub magic: u32,
    /// The block header.
    pub header: BlockHeader,
    /// Transactions, coinbase first.
    pub txs: Vec<Tx>,
}

impl Block {
    /// Converts a wire block received on the network identified by `magic`.
    pub fn from_wire(block: &bitcoin::Block, magic: u32) -> Self {
        Block {
            magic,
            header: BlockHeader::from(&block.header),
            txs: block.txdata.iter().map(Tx::from).collect(),
        }
    }

    /// The block hash.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Whether any transaction in the block carries witness data.
    pub fn has_witness(&self) -> bool {
        self.txs.iter().any(|tx| tx.seg_wit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Network;
    use bitcoin::blockdata::constants::genesis_block;
    use bitcoin::consensus::encode::serialize;

    #[test]
    fn test_genesis_header_hash() {
        let genesis = genesis_block(Network::Bitcoin);
        let header = BlockHeader::from(&genesis.header);

        assert_eq!(
            header.hash().to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(header.hash(), genesis.block_hash().into());
        assert_eq!(header.time, 1231006505);
        assert_eq!(header.bits, 0x1d00ffff);
        assert_eq!(header.nonce, 2083236893);
        assert!(header.prev_hash.is_zero());
    }

    #[test]
    fn test_serialization_matches_wire() {
        let genesis = genesis_block(Network::Bitcoin);
        let header = BlockHeader::from(&genesis.header);

        assert_eq!(header.serialize().to_vec(), serialize(&genesis.header));
    }

    #[test]
    fn test_block_from_wire() {
        let genesis = genesis_block(Network::Bitcoin);
        let block = Block::from_wire(&genesis, MAIN_NET_MAGIC);

        assert_eq!(block.magic, MAIN_NET_MAGIC);
        assert_eq!(block.txs.len(), 1);
        assert_eq!(block.txs[0].tx_outs[0].value, 50 * 100_000_000);
        assert!(!block.has_witness());
        assert_eq!(block.hash(), genesis.block_hash().into());
    }

    #[test]
    fn test_network_magic() {
        assert_eq!(network_magic(Network::Bitcoin), MAIN_NET_MAGIC);
        assert_ne!(network_magic(Network::Testnet), MAIN_NET_MAGIC);
    }
}
