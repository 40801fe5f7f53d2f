//! Header and block builders.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::{
    Amount, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxMerkleNode,
    TxOut, Witness, block, transaction,
};

/// A recognizable hash that belongs to no real header.
pub fn test_hash(n: u8) -> BlockHash {
    BlockHash::from_byte_array([n; 32])
}

/// A regtest-style header on top of `prev`. Distinct nonces give distinct hashes.
pub fn header_after(prev: BlockHash, nonce: u32) -> block::Header {
    block::Header {
        version: block::Version::from_consensus(0x2000_0000),
        prev_blockhash: prev,
        merkle_root: TxMerkleNode::all_zeros(),
        time: 1_700_000_000 + nonce,
        bits: CompactTarget::from_consensus(0x207f_ffff),
        nonce,
    }
}

/// `count` linked headers starting on top of `anchor`.
pub fn header_chain(anchor: BlockHash, count: usize) -> Vec<block::Header> {
    let mut headers = Vec::with_capacity(count);
    let mut prev = anchor;
    for i in 0..count {
        let header = header_after(prev, i as u32 + 1);
        prev = header.block_hash();
        headers.push(header);
    }
    headers
}

/// A block carrying `header` and a single coinbase transaction.
///
/// With `witness` set the coinbase input carries the witness reserved value.
pub fn block_for(header: block::Header, witness: bool) -> bitcoin::Block {
    let witness = if witness {
        Witness::from_slice(&[vec![0u8; 32]])
    } else {
        Witness::new()
    };

    let coinbase = Transaction {
        version: transaction::Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(header.nonce.to_le_bytes().to_vec()),
            sequence: Sequence::MAX,
            witness,
        }],
        output: vec![TxOut {
            value: Amount::from_sat(50 * 100_000_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }],
    };

    bitcoin::Block {
        header,
        txdata: vec![coinbase],
    }
}

pub fn block_after(prev: BlockHash, nonce: u32, witness: bool) -> bitcoin::Block {
    block_for(header_after(prev, nonce), witness)
}
