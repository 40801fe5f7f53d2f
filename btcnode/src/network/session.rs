//! A connected peer served by a background driver task.
//!
//! The driver owns the transport. Requests from the [`PeerSession`] handle
//! register a one-shot reply slot before the wire request goes out, and
//! inbound messages are routed to the matching slot:
//!
//! - `headers` completes the header slot when the batch is empty or its first
//!   header builds on a hash from that request's locator. Any other batch
//!   answers an earlier request and is discarded.
//! - `block` completes the block slot only when its hash is the one requested.
//! - `inv` goes to a bounded queue drained by [`NetworkManager::next_inventory`].
//! - `ping` is answered. Everything else is ignored.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_blockdata::{GetHeadersMessage, Inventory};
use bitcoin::{BlockHash, Network, block};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{NetworkError, NetworkResult};
use crate::network::NetworkManager;
use crate::network::constants::{PING_INTERVAL, REQUEST_QUEUE_DEPTH};
use crate::network::handshake::{PeerVersion, perform_handshake};
use crate::network::peer;
use crate::network::transport::Transport;

enum Request {
    Headers {
        locator: Vec<BlockHash>,
        reply: oneshot::Sender<Vec<block::Header>>,
    },
    Block {
        hash: BlockHash,
        reply: oneshot::Sender<bitcoin::Block>,
    },
}

/// Handle to a handshaken peer connection.
pub struct PeerSession {
    requests: mpsc::Sender<Request>,
    inventory: mpsc::Receiver<Vec<Inventory>>,
    network: Network,
    timeout: Duration,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
    peer: String,
    version: Option<PeerVersion>,
}

impl PeerSession {
    /// Connect over TCP and complete the version handshake.
    pub async fn connect(address: &str, config: &Config) -> NetworkResult<Self> {
        let (transport, remote) = peer::connect(address, config.network, config.timeout).await?;
        Self::handshake(transport, config, remote).await
    }

    /// Complete the version handshake on an already connected transport.
    pub async fn handshake<T>(mut transport: T, config: &Config, remote: SocketAddr) -> NetworkResult<Self>
    where
        T: Transport + 'static,
    {
        let version = perform_handshake(&mut transport, config, remote).await?;
        let mut session = Self::start(Box::new(transport), config, remote.to_string());
        session.version = Some(version);
        Ok(session)
    }

    /// Start serving a transport whose handshake is already done.
    pub fn start(transport: Box<dyn Transport>, config: &Config, peer: String) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (inventory_tx, inventory_rx) = mpsc::channel(config.inventory_capacity.max(1));
        let shutdown = CancellationToken::new();

        let driver = Driver {
            transport,
            requests: request_rx,
            inventory: inventory_tx,
            shutdown: shutdown.clone(),
            pending_headers: None,
            pending_block: None,
            peer: peer.clone(),
        };

        Self {
            requests: request_tx,
            inventory: inventory_rx,
            network: config.network,
            timeout: config.timeout,
            shutdown,
            driver: Some(tokio::spawn(driver.run())),
            peer,
            version: None,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// The peer's `version` message, when the handshake went through this handle.
    pub fn peer_version(&self) -> Option<&PeerVersion> {
        self.version.as_ref()
    }

    async fn submit<T>(&mut self, request: Request, reply: oneshot::Receiver<T>) -> NetworkResult<T> {
        self.requests.send(request).await.map_err(|_| NetworkError::NotConnected)?;

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(NetworkError::PeerDisconnected),
            Err(_) => Err(NetworkError::Timeout),
        }
    }
}

#[async_trait]
impl NetworkManager for PeerSession {
    async fn request_headers(&mut self, locator: Vec<BlockHash>) -> NetworkResult<Vec<block::Header>> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            Request::Headers {
                locator,
                reply,
            },
            rx,
        )
        .await
    }

    async fn request_block(&mut self, hash: BlockHash) -> NetworkResult<bitcoin::Block> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            Request::Block {
                hash,
                reply,
            },
            rx,
        )
        .await
    }

    async fn next_inventory(&mut self) -> NetworkResult<Vec<Inventory>> {
        self.inventory.recv().await.ok_or(NetworkError::PeerDisconnected)
    }

    fn network(&self) -> Network {
        self.network
    }

    fn is_connected(&self) -> bool {
        !self.shutdown.is_cancelled() && self.driver.as_ref().is_some_and(|d| !d.is_finished())
    }

    async fn disconnect(&mut self) -> NetworkResult<()> {
        self.shutdown.cancel();
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                tracing::warn!("Session driver for {} ended abnormally: {}", self.peer, e);
            }
        }
        Ok(())
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    transport: Box<dyn Transport>,
    requests: mpsc::Receiver<Request>,
    inventory: mpsc::Sender<Vec<Inventory>>,
    shutdown: CancellationToken,
    /// Locator of the outstanding header request and its reply slot.
    pending_headers: Option<(Vec<BlockHash>, oneshot::Sender<Vec<block::Header>>)>,
    pending_block: Option<(BlockHash, oneshot::Sender<bitcoin::Block>)>,
    peer: String,
}

impl Driver {
    async fn run(mut self) {
        let mut ping =
            tokio::time::interval_at(tokio::time::Instant::now() + PING_INTERVAL, PING_INTERVAL);

        loop {
            let step = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(request) => self.dispatch(request).await,
                    None => break,
                },
                received = self.transport.receive_message() => match received {
                    Ok(Some(message)) => self.route(message).await,
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                },
                _ = ping.tick() => {
                    self.transport.send_message(NetworkMessage::Ping(rand::random())).await
                }
            };

            if let Err(e) = step {
                tracing::info!("Session with {} ended: {}", self.peer, e);
                break;
            }
        }

        if let Err(e) = self.transport.shutdown().await {
            tracing::debug!("Shutdown of {} failed: {}", self.peer, e);
        }
    }

    async fn dispatch(&mut self, request: Request) -> NetworkResult<()> {
        match request {
            Request::Headers {
                locator,
                reply,
            } => {
                tracing::debug!("getheaders to {} with {} locator hashes", self.peer, locator.len());
                self.pending_headers = Some((locator.clone(), reply));
                let message = GetHeadersMessage::new(locator, BlockHash::all_zeros());
                self.transport.send_message(NetworkMessage::GetHeaders(message)).await
            }
            Request::Block {
                hash,
                reply,
            } => {
                self.pending_block = Some((hash, reply));
                tracing::debug!("getdata block {} from {}", hash, self.peer);
                self.transport
                    .send_message(NetworkMessage::GetData(vec![Inventory::WitnessBlock(hash)]))
                    .await
            }
        }
    }

    async fn route(&mut self, message: NetworkMessage) -> NetworkResult<()> {
        match message {
            NetworkMessage::Headers(headers) => self.deliver_headers(headers),
            NetworkMessage::Block(block) => self.deliver_block(block),
            NetworkMessage::Inv(inventory) => self.queue_inventory(inventory),
            NetworkMessage::Ping(nonce) => {
                return self.transport.send_message(NetworkMessage::Pong(nonce)).await;
            }
            other => tracing::trace!("Ignoring {} from {}", other.cmd(), self.peer),
        }
        Ok(())
    }

    fn deliver_headers(&mut self, headers: Vec<block::Header>) {
        let Some((locator, reply)) = self.pending_headers.take() else {
            tracing::debug!("Unsolicited batch of {} headers from {}", headers.len(), self.peer);
            return;
        };

        let answers = headers.first().map_or(true, |first| locator.contains(&first.prev_blockhash));
        if !answers {
            tracing::debug!("Discarding stale batch of {} headers from {}", headers.len(), self.peer);
            self.pending_headers = Some((locator, reply));
            return;
        }

        if let Err(headers) = reply.send(headers) {
            tracing::debug!("Header waiter gone, dropped {} late headers", headers.len());
        }
    }

    fn deliver_block(&mut self, block: bitcoin::Block) {
        let hash = block.block_hash();
        match self.pending_block.take() {
            Some((wanted, reply)) if wanted == hash => {
                if reply.send(block).is_err() {
                    tracing::debug!("Block waiter gone, dropped late block {}", hash);
                }
            }
            other => {
                tracing::debug!("Unsolicited block {} from {}", hash, self.peer);
                self.pending_block = other;
            }
        }
    }

    fn queue_inventory(&mut self, inventory: Vec<Inventory>) {
        match self.inventory.try_send(inventory) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    "Inventory queue full, dropping announcement of {} items from {}",
                    dropped.len(),
                    self.peer
                );
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
