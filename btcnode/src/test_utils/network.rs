use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::p2p::message_blockdata::Inventory;
use bitcoin::{BlockHash, Network, block};

use crate::error::{NetworkError, NetworkResult};
use crate::network::NetworkManager;

/// Mock network manager for testing
///
/// Answers header requests from a queue of batches and block requests from a
/// table, without any wire traffic. Requests it cannot answer wait for the
/// configured timeout and then fail, as a real session would.
pub struct MockNetworkManager {
    network: Network,
    timeout: Duration,
    connected: bool,
    answer_headers: bool,
    batches: VecDeque<Vec<block::Header>>,
    blocks: HashMap<BlockHash, bitcoin::Block>,
    announcements: VecDeque<Vec<Inventory>>,
    locators: Vec<Vec<BlockHash>>,
    block_requests: Vec<BlockHash>,
}

impl MockNetworkManager {
    /// Create a new mock network manager
    pub fn new(network: Network) -> Self {
        Self {
            network,
            timeout: Duration::from_millis(200),
            connected: true,
            answer_headers: true,
            batches: VecDeque::new(),
            blocks: HashMap::new(),
            announcements: VecDeque::new(),
            locators: Vec::new(),
            block_requests: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue a `headers` reply. Once the queue is empty, replies are empty.
    pub fn add_batch(&mut self, headers: Vec<block::Header>) {
        self.batches.push_back(headers);
    }

    pub fn add_block(&mut self, block: bitcoin::Block) {
        self.blocks.insert(block.block_hash(), block);
    }

    /// Queue an inventory announcement.
    pub fn announce(&mut self, inventory: Vec<Inventory>) {
        self.announcements.push_back(inventory);
    }

    /// Stop answering header requests.
    pub fn mute_headers(&mut self) {
        self.answer_headers = false;
    }

    /// Locators of every header request, in order.
    pub fn locators(&self) -> &[Vec<BlockHash>] {
        &self.locators
    }

    /// Hashes of every block request, in order.
    pub fn block_requests(&self) -> &[BlockHash] {
        &self.block_requests
    }

    async fn time_out<T>(&self) -> NetworkResult<T> {
        tokio::time::sleep(self.timeout).await;
        Err(NetworkError::Timeout)
    }
}

#[async_trait]
impl NetworkManager for MockNetworkManager {
    async fn request_headers(&mut self, locator: Vec<BlockHash>) -> NetworkResult<Vec<block::Header>> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }
        self.locators.push(locator);
        if !self.answer_headers {
            return self.time_out().await;
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    async fn request_block(&mut self, hash: BlockHash) -> NetworkResult<bitcoin::Block> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }
        self.block_requests.push(hash);
        match self.blocks.get(&hash) {
            Some(block) => Ok(block.clone()),
            None => self.time_out().await,
        }
    }

    async fn next_inventory(&mut self) -> NetworkResult<Vec<Inventory>> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }
        match self.announcements.pop_front() {
            Some(inventory) => Ok(inventory),
            // Nothing scripted: wait like a quiet peer would.
            None => std::future::pending().await,
        }
    }

    fn network(&self) -> Network {
        self.network
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> NetworkResult<()> {
        self.connected = false;
        Ok(())
    }
}
