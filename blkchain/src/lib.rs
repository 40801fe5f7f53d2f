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

//! # blkchain
//!
//! Plain data model for Bitcoin blocks, block headers and transactions.
//!
//! The types here are what a synchronizer hands to its callers once the wire
//! messages have been decoded: fixed-width integers, [`Hash256`] ids and byte
//! vectors for scripts and witnesses. Conversions from the `bitcoin` crate's
//! wire types live next to each type.
//!
//! ## Available feature flags
//!
//! * `serde` - (dependency), implements `serde`-based serialization and
//!   deserialization. Hashes serialize as reversed hex strings.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(missing_docs)]

pub mod block;
pub mod hash;
pub mod transaction;

pub use block::{Block, BlockHeader, HEADER_SIZE, MAIN_NET_MAGIC, network_magic};
pub use hash::{Hash256, HashParseError};
pub use transaction::{OutPoint, Tx, TxIn, TxOut};

// The wire types the conversions accept.
pub use bitcoin;
