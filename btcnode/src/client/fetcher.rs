//! Block retrieval and new-block waits.

use bitcoin::p2p::message_blockdata::Inventory;
use blkchain::{Block, Hash256, network_magic};
use tokio_util::sync::CancellationToken;

use crate::error::{BtcNodeError, NetworkError, Result};
use crate::network::NetworkManager;

/// Fetches full blocks through a [`NetworkManager`], one at a time.
pub struct BlockFetcher<'a, N: NetworkManager + ?Sized> {
    network: &'a mut N,
    magic: u32,
}

impl<'a, N: NetworkManager + ?Sized> BlockFetcher<'a, N> {
    pub fn new(network: &'a mut N) -> Self {
        let magic = network_magic(network.network());
        Self {
            network,
            magic,
        }
    }

    /// Request block `hash` and convert it to the domain model.
    ///
    /// Fails with [`BtcNodeError::Timeout`] when the peer does not deliver in time.
    pub async fn fetch_block(&mut self, hash: Hash256) -> Result<Block> {
        match self.network.request_block(hash.into()).await {
            Ok(block) => {
                tracing::debug!("Fetched block {} with {} transactions", hash, block.txdata.len());
                Ok(Block::from_wire(&block, self.magic))
            }
            Err(NetworkError::Timeout) => Err(BtcNodeError::Timeout(format!("waiting for block {}", hash))),
            Err(e) => Err(e.into()),
        }
    }

    /// Wait for the peer to announce blocks and fetch them.
    ///
    /// Announcements that name no block are skipped and the wait continues.
    /// Returns [`BtcNodeError::Interrupted`] once `cancel` fires. The token
    /// stays cancelled, so every other waiter on it stops too.
    pub async fn wait_for_blocks(&mut self, cancel: &CancellationToken) -> Result<Vec<Block>> {
        loop {
            let inventory = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BtcNodeError::Interrupted),
                inventory = self.network.next_inventory() => inventory?,
            };

            let mut blocks = Vec::new();
            for item in inventory {
                match item {
                    Inventory::Block(hash) | Inventory::WitnessBlock(hash) => {
                        blocks.push(self.fetch_block(hash.into()).await?);
                    }
                    other => tracing::warn!("Skipping inventory entry {:?}", other),
                }
            }

            if !blocks.is_empty() {
                tracing::info!("Received {} announced blocks", blocks.len());
                return Ok(blocks);
            }
        }
    }
}
