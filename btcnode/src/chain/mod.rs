//! The reconciled chain as seen by callers.

pub mod index;

use async_trait::async_trait;
use blkchain::{Block, BlockHeader};

use crate::error::Result;

pub use index::ChainIndex;

/// A height-ordered header sequence with a cursor and on-demand block reads.
///
/// ```no_run
/// # async fn walk(mut index: impl btcnode::BlockHeaderIndex) -> btcnode::Result<()> {
/// while let Some(header) = index.header() {
///     let block = index.read_block().await?;
///     println!("{} {} txs={}", index.current_height(), header.hash(), block.txs.len());
///     if !index.advance() {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BlockHeaderIndex: Send {
    /// Number of reconciled headers.
    fn count(&self) -> usize;

    /// Height of the header under the cursor.
    fn current_height(&self) -> u32;

    /// Move to the next header; `false` once the chain is exhausted.
    fn advance(&mut self) -> bool;

    /// Header under the cursor, if any.
    fn header(&self) -> Option<BlockHeader>;

    /// Fetch the full block for the header under the cursor.
    ///
    /// Fails with [`BtcNodeError::NoCurrentHeader`](crate::BtcNodeError::NoCurrentHeader)
    /// when the cursor is not on a header.
    async fn read_block(&mut self) -> Result<Block>;
}
