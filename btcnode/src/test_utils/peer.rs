//! A scripted remote node speaking the real wire format over an in-memory pipe.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_blockdata::Inventory;
use bitcoin::{BlockHash, Network, block};
use tokio::io::{DuplexStream, duplex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::NetworkResult;
use crate::network::{PeerSession, Transport, V1Transport};

const PIPE_CAPACITY: usize = 1 << 20;

struct ScriptedBatch {
    headers: Vec<block::Header>,
    delay: Option<Duration>,
}

/// Remote side of a test connection.
///
/// Answers the handshake, serves `getheaders` from a queue of batches (an
/// empty batch once the queue runs dry), serves `getdata` from a block table,
/// and answers pings. Every message it receives is recorded.
pub struct MockPeer {
    network: Network,
    batches: VecDeque<ScriptedBatch>,
    blocks: HashMap<BlockHash, bitcoin::Block>,
    handshake: bool,
    answer_headers: bool,
    ignored_header_requests: usize,
    answer_blocks: bool,
}

impl MockPeer {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            batches: VecDeque::new(),
            blocks: HashMap::new(),
            handshake: true,
            answer_headers: true,
            ignored_header_requests: 0,
            answer_blocks: true,
        }
    }

    pub fn with_batch(mut self, headers: Vec<block::Header>) -> Self {
        self.batches.push_back(ScriptedBatch {
            headers,
            delay: None,
        });
        self
    }

    /// Queue a batch that is sent `delay` after its request arrives.
    pub fn with_delayed_batch(mut self, headers: Vec<block::Header>, delay: Duration) -> Self {
        self.batches.push_back(ScriptedBatch {
            headers,
            delay: Some(delay),
        });
        self
    }

    pub fn with_block(mut self, block: bitcoin::Block) -> Self {
        self.blocks.insert(block.block_hash(), block);
        self
    }

    /// Never answer anything, not even the handshake.
    pub fn silent(mut self) -> Self {
        self.handshake = false;
        self.answer_headers = false;
        self.answer_blocks = false;
        self
    }

    pub fn without_header_replies(mut self) -> Self {
        self.answer_headers = false;
        self
    }

    /// Leave the first `count` header requests unanswered, as a node in
    /// initial block download does.
    pub fn ignoring_header_requests(mut self, count: usize) -> Self {
        self.ignored_header_requests = count;
        self
    }

    pub fn without_block_replies(mut self) -> Self {
        self.answer_blocks = false;
        self
    }

    /// The address reported for the mock in logs and version messages.
    pub fn address() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 18444))
    }

    /// Start the peer and return our end of the pipe.
    pub fn spawn(self) -> (V1Transport<DuplexStream>, MockPeerHandle) {
        let network = self.network;
        let (ours, theirs) = duplex(PIPE_CAPACITY);
        let transport = V1Transport::new(theirs, network, "local");
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let received = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(self.serve(transport, actions_rx, received.clone()));
        let handle = MockPeerHandle {
            actions: actions_tx,
            received,
            task,
        };
        (V1Transport::new(ours, network, "mock-peer"), handle)
    }

    /// Start the peer and complete the handshake against it.
    pub async fn connect(self, config: &Config) -> NetworkResult<(PeerSession, MockPeerHandle)> {
        let (transport, handle) = self.spawn();
        let session = PeerSession::handshake(transport, config, Self::address()).await?;
        Ok((session, handle))
    }

    async fn serve(
        mut self,
        mut transport: V1Transport<DuplexStream>,
        mut actions: mpsc::UnboundedReceiver<NetworkMessage>,
        received: Arc<Mutex<Vec<NetworkMessage>>>,
    ) {
        let mut actions_open = true;
        loop {
            tokio::select! {
                action = actions.recv(), if actions_open => match action {
                    Some(message) => {
                        if transport.send_message(message).await.is_err() {
                            break;
                        }
                    }
                    None => actions_open = false,
                },
                message = transport.receive_message() => match message {
                    Ok(Some(message)) => {
                        received.lock().unwrap().push(message.clone());
                        if self.respond(&mut transport, message).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(_) => break,
                },
            }
        }
    }

    async fn respond(
        &mut self,
        transport: &mut V1Transport<DuplexStream>,
        message: NetworkMessage,
    ) -> NetworkResult<()> {
        match message {
            NetworkMessage::Version(theirs) if self.handshake => {
                let mut ours = theirs;
                ours.user_agent = "/MockPeer:0.1.0/".to_string();
                ours.start_height = 0;
                transport.send_message(NetworkMessage::Version(ours)).await?;
                transport.send_message(NetworkMessage::Verack).await?;
            }
            NetworkMessage::Ping(nonce) if self.handshake => {
                transport.send_message(NetworkMessage::Pong(nonce)).await?;
            }
            NetworkMessage::GetHeaders(_) if self.answer_headers && self.ignored_header_requests > 0 => {
                self.ignored_header_requests -= 1;
            }
            NetworkMessage::GetHeaders(_) if self.answer_headers => {
                let batch = self.batches.pop_front().unwrap_or(ScriptedBatch {
                    headers: Vec::new(),
                    delay: None,
                });
                if let Some(delay) = batch.delay {
                    tokio::time::sleep(delay).await;
                }
                transport.send_message(NetworkMessage::Headers(batch.headers)).await?;
            }
            NetworkMessage::GetData(inventory) if self.answer_blocks => {
                for item in inventory {
                    let hash = match item {
                        Inventory::Block(hash) | Inventory::WitnessBlock(hash) => hash,
                        _ => continue,
                    };
                    if let Some(block) = self.blocks.get(&hash) {
                        transport.send_message(NetworkMessage::Block(block.clone())).await?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Test-side control over a running [`MockPeer`].
pub struct MockPeerHandle {
    actions: mpsc::UnboundedSender<NetworkMessage>,
    received: Arc<Mutex<Vec<NetworkMessage>>>,
    task: JoinHandle<()>,
}

impl MockPeerHandle {
    /// Push an arbitrary message to the local side.
    pub fn send(&self, message: NetworkMessage) {
        let _ = self.actions.send(message);
    }

    /// Announce inventory to the local side.
    pub fn announce(&self, inventory: Vec<Inventory>) {
        self.send(NetworkMessage::Inv(inventory));
    }

    /// Everything received so far, in order.
    pub fn received(&self) -> Vec<NetworkMessage> {
        self.received.lock().unwrap().clone()
    }

    /// Locators of every `getheaders` received so far.
    pub fn getheaders_locators(&self) -> Vec<Vec<BlockHash>> {
        self.received()
            .into_iter()
            .filter_map(|message| match message {
                NetworkMessage::GetHeaders(msg) => Some(msg.locator_hashes),
                _ => None,
            })
            .collect()
    }

    /// Wait until `message` has been received. Panics after five seconds.
    pub async fn wait_for(&self, message: &NetworkMessage) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !self.received.lock().unwrap().contains(message) {
            assert!(tokio::time::Instant::now() < deadline, "mock peer never received {:?}", message);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait for the peer task to exit after the local side hung up.
    pub async fn finished(self) {
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("mock peer did not stop")
            .expect("mock peer panicked");
    }
}
