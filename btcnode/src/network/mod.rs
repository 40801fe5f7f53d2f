//! Peer networking: framing, handshake, and the request/response session the
//! synchronizer talks to.

pub mod constants;
pub mod handshake;
pub mod peer;
pub mod session;
pub mod transport;

use async_trait::async_trait;
use bitcoin::p2p::message_blockdata::Inventory;
use bitcoin::{BlockHash, Network, block};

use crate::error::NetworkResult;

pub use handshake::PeerVersion;
pub use session::PeerSession;
pub use transport::{Transport, V1Transport};

/// Single-peer request interface used by the synchronizer and block fetcher.
///
/// Every request is bounded by a timeout chosen by the implementation and fails
/// with [`NetworkError::Timeout`](crate::error::NetworkError::Timeout) when it
/// expires. Callers issue one header request and one block request at a time.
#[async_trait]
pub trait NetworkManager: Send {
    /// Send `getheaders` with `locator` and a zero stop hash and wait for the
    /// `headers` reply. An empty reply means the peer has nothing further.
    async fn request_headers(&mut self, locator: Vec<BlockHash>) -> NetworkResult<Vec<block::Header>>;

    /// Request the witness serialization of block `hash` and wait for it.
    async fn request_block(&mut self, hash: BlockHash) -> NetworkResult<bitcoin::Block>;

    /// Wait for the next inventory announcement.
    ///
    /// Cancel-safe: dropping the future loses no announcement.
    async fn next_inventory(&mut self) -> NetworkResult<Vec<Inventory>>;

    /// Network the peer serves.
    fn network(&self) -> Network;

    fn is_connected(&self) -> bool;

    async fn disconnect(&mut self) -> NetworkResult<()>;
}
