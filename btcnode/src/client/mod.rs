//! High-level client API.

pub mod fetcher;

use async_trait::async_trait;
use blkchain::{Block, BlockHeader, Hash256};
use tokio_util::sync::CancellationToken;

use crate::chain::{BlockHeaderIndex, ChainIndex};
use crate::config::Config;
use crate::error::{BtcNodeError, Result};
use crate::network::{NetworkManager, PeerSession};
use crate::sync::{Anchors, HeaderSynchronizer};

pub use fetcher::BlockFetcher;

/// Connect to `address`, synchronize headers past `anchors`, and return the
/// resulting index with the connection kept open for block reads.
pub async fn open_index(address: &str, config: Config, anchors: &Anchors) -> Result<BtcNode> {
    let mut node = BtcNode::connect(address, config).await?;
    node.synchronize(anchors).await?;
    Ok(node)
}

/// A header chain downloaded from one peer, plus that peer's connection.
pub struct BtcNode<N: NetworkManager = PeerSession> {
    network: N,
    config: Config,
    chain: ChainIndex,
}

impl BtcNode<PeerSession> {
    /// Connect to a peer and complete the handshake.
    pub async fn connect(address: &str, config: Config) -> Result<Self> {
        config.validate().map_err(BtcNodeError::Config)?;
        let session = PeerSession::connect(address, &config).await?;
        Ok(Self::with_network(session, config))
    }
}

impl<N: NetworkManager> BtcNode<N> {
    /// Use an already connected network manager.
    pub fn with_network(network: N, config: Config) -> Self {
        Self {
            network,
            config,
            chain: ChainIndex::default(),
        }
    }

    /// Download and reconcile headers past `anchors`, replacing the current
    /// index. Returns the number of reconciled headers.
    pub async fn synchronize(&mut self, anchors: &Anchors) -> Result<usize> {
        let Some(top_anchor) = anchors.max_height() else {
            return Err(BtcNodeError::Config("at least one anchor is required".to_string()));
        };

        let outcome = HeaderSynchronizer::new(&mut self.network).synchronize(anchors).await?;
        self.chain = ChainIndex::from_outcome(outcome, top_anchor);
        tracing::info!(
            "Header index ready: {} headers, cursor at height {}",
            self.chain.count(),
            self.chain.current_height()
        );
        Ok(self.chain.count())
    }

    pub fn chain(&self) -> &ChainIndex {
        &self.chain
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch one block by hash.
    pub async fn fetch_block(&mut self, hash: Hash256) -> Result<Block> {
        BlockFetcher::new(&mut self.network).fetch_block(hash).await
    }

    /// Wait for the peer to announce new blocks and fetch them.
    pub async fn wait_for_blocks(&mut self, cancel: &CancellationToken) -> Result<Vec<Block>> {
        BlockFetcher::new(&mut self.network).wait_for_blocks(cancel).await
    }

    /// Release the connection.
    pub async fn close(mut self) -> Result<()> {
        self.network.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl<N: NetworkManager> BlockHeaderIndex for BtcNode<N> {
    fn count(&self) -> usize {
        self.chain.count()
    }

    fn current_height(&self) -> u32 {
        self.chain.current_height()
    }

    fn advance(&mut self) -> bool {
        self.chain.advance()
    }

    fn header(&self) -> Option<BlockHeader> {
        self.chain.header()
    }

    async fn read_block(&mut self) -> Result<Block> {
        let header = self.chain.header().ok_or(BtcNodeError::NoCurrentHeader)?;
        self.fetch_block(header.hash()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockNetworkManager, block_for, header_chain, test_hash};
    use bitcoin::Network;

    fn node_with_chain(len: usize) -> (BtcNode<MockNetworkManager>, Vec<bitcoin::block::Header>) {
        let chain = header_chain(test_hash(1), len);
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(chain.clone());
        for header in &chain {
            network.add_block(block_for(*header, false));
        }
        (BtcNode::with_network(network, Config::regtest()), chain)
    }

    #[tokio::test]
    async fn test_synchronize_then_read_blocks() {
        let (mut node, chain) = node_with_chain(3);
        let anchors = Anchors::new().with(20, test_hash(1).into());

        assert_eq!(node.synchronize(&anchors).await.unwrap(), 3);
        assert_eq!(node.current_height(), 21);

        let mut hashes = Vec::new();
        loop {
            let block = node.read_block().await.unwrap();
            assert_eq!(Some(block.header), node.header());
            hashes.push(block.hash());
            if !node.advance() {
                break;
            }
        }

        let expected: Vec<Hash256> = chain.iter().map(|h| h.block_hash().into()).collect();
        assert_eq!(hashes, expected);
        assert_eq!(node.network().block_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_read_block_without_header() {
        let mut node = BtcNode::with_network(MockNetworkManager::new(Network::Regtest), Config::regtest());
        let anchors = Anchors::new().with(5, test_hash(1).into());

        assert_eq!(node.synchronize(&anchors).await.unwrap(), 0);
        assert_eq!(node.current_height(), 5);
        assert!(matches!(node.read_block().await, Err(BtcNodeError::NoCurrentHeader)));
    }

    #[tokio::test]
    async fn test_synchronize_requires_anchors() {
        let (mut node, _) = node_with_chain(1);
        assert!(matches!(node.synchronize(&Anchors::new()).await, Err(BtcNodeError::Config(_))));
        assert!(node.network().locators().is_empty());
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let (node, _) = node_with_chain(1);
        node.close().await.unwrap();
    }
}
