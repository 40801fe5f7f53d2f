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

//! Transactions.
//!
//! A flattened view of a wire transaction: inputs keep their witness stacks as
//! plain byte strings and the whole transaction is flagged as segregated
//! witness when any input carries witness data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::hash::Hash256;

/// Reference to an output of a previous transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutPoint {
    /// Id of the transaction holding the output.
    pub hash: Hash256,
    /// Index of the output within that transaction.
    pub n: u32,
}

/// A transaction input.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TxIn {
    /// The output being spent.
    pub prev_out: OutPoint,
    /// Signature script.
    pub script_sig: Vec<u8>,
    /// Sequence number.
    pub sequence: u32,
    /// Witness stack, empty for legacy inputs.
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    /// Whether this input carries any witness data.
    pub fn has_witness(&self) -> bool {
        !self.witness.is_empty()
    }
}

impl From<&bitcoin::TxIn> for TxIn {
    fn from(input: &bitcoin::TxIn) -> Self {
        TxIn {
            prev_out: OutPoint {
                hash: input.previous_output.txid.into(),
                n: input.previous_output.vout,
            },
            script_sig: input.script_sig.to_bytes(),
            sequence: input.sequence.0,
            witness: input.witness.iter().map(<[u8]>::to_vec).collect(),
        }
    }
}

/// A transaction output.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TxOut {
    /// Value in satoshis.
    pub value: i64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

impl From<&bitcoin::TxOut> for TxOut {
    fn from(output: &bitcoin::TxOut) -> Self {
        TxOut {
            value: i64::try_from(output.value.to_sat()).unwrap_or(i64::MAX),
            script_pubkey: output.script_pubkey.to_bytes(),
        }
    }
}

/// A transaction.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tx {
    /// Transaction version.
    pub version: u32,
    /// Inputs, in wire order.
    pub tx_ins: Vec<TxIn>,
    /// Outputs, in wire order.
    pub tx_outs: Vec<TxOut>,
    /// Lock time.
    pub lock_time: u32,
    /// Set when at least one input has a non-empty witness stack.
    pub seg_wit: bool,
}

impl From<&bitcoin::Transaction> for Tx {
    fn from(tx: &bitcoin::Transaction) -> Self {
        let tx_ins: Vec<TxIn> = tx.input.iter().map(TxIn::from).collect();
        let seg_wit = tx_ins.iter().any(TxIn::has_witness);
        Tx {
            version: tx.version.0 as u32,
            tx_ins,
            tx_outs: tx.output.iter().map(TxOut::from).collect(),
            lock_time: tx.lock_time.to_consensus_u32(),
            seg_wit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::{Amount, ScriptBuf, Sequence, Witness, transaction};

    fn wire_tx(witness: Witness) -> bitcoin::Transaction {
        bitcoin::Transaction {
            version: transaction::Version::TWO,
            lock_time: LockTime::from_consensus(500),
            input: vec![bitcoin::TxIn {
                previous_output: bitcoin::OutPoint {
                    txid: bitcoin::Txid::from_byte_array([7; 32]),
                    vout: 3,
                },
                script_sig: ScriptBuf::from_bytes(vec![0x51]),
                sequence: Sequence(0xfffffffe),
                witness,
            }],
            output: vec![bitcoin::TxOut {
                value: Amount::from_sat(12_345),
                script_pubkey: ScriptBuf::from_bytes(vec![0x00, 0x14]),
            }],
        }
    }

    #[test]
    fn test_legacy_transaction() {
        let tx = Tx::from(&wire_tx(Witness::new()));

        assert_eq!(tx.version, 2);
        assert_eq!(tx.lock_time, 500);
        assert!(!tx.seg_wit);
        assert_eq!(tx.tx_ins[0].prev_out.hash, Hash256::from_byte_array([7; 32]));
        assert_eq!(tx.tx_ins[0].prev_out.n, 3);
        assert_eq!(tx.tx_ins[0].script_sig, vec![0x51]);
        assert_eq!(tx.tx_ins[0].sequence, 0xfffffffe);
        assert_eq!(tx.tx_outs[0].value, 12_345);
        assert_eq!(tx.tx_outs[0].script_pubkey, vec![0x00, 0x14]);
    }

    #[test]
    fn test_oversized_value_saturates() {
        let mut wire = wire_tx(Witness::new());
        wire.output[0].value = Amount::from_sat(u64::MAX);

        assert_eq!(Tx::from(&wire).tx_outs[0].value, i64::MAX);
    }

    #[test]
    fn test_witness_marks_segwit() {
        let witness = Witness::from_slice(&[vec![0x30, 0x44], vec![0x02]]);
        let tx = Tx::from(&wire_tx(witness));

        assert!(tx.seg_wit);
        assert_eq!(tx.tx_ins[0].witness, vec![vec![0x30, 0x44], vec![0x02]]);
    }
}
