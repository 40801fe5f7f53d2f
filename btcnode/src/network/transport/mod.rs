//! Message transport over a byte stream.

pub mod v1;

use async_trait::async_trait;
use bitcoin::p2p::message::NetworkMessage;

use crate::error::NetworkResult;

pub use v1::V1Transport;

/// Framed message exchange with one peer.
///
/// Implementations keep partial frames in their own buffers, so a pending
/// `receive_message` may be dropped (for example by `tokio::select!`) without
/// losing bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message.
    async fn send_message(&mut self, message: NetworkMessage) -> NetworkResult<()>;

    /// Receive the next message.
    ///
    /// `Ok(None)` means bytes were discarded while resynchronizing and no
    /// complete message is available yet; call again.
    async fn receive_message(&mut self) -> NetworkResult<Option<NetworkMessage>>;

    fn is_connected(&self) -> bool;

    /// Close the write half and mark the transport disconnected.
    async fn shutdown(&mut self) -> NetworkResult<()>;
}
