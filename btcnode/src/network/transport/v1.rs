//! Unencrypted Bitcoin P2P framing.
//!
//! Each frame is:
//! - 4 bytes: network magic
//! - 12 bytes: command, NUL padded
//! - 4 bytes: payload length, little-endian
//! - 4 bytes: first 4 bytes of SHA256d(payload)
//! - payload

use std::io::ErrorKind;

use async_trait::async_trait;
use bitcoin::Network;
use bitcoin::consensus::encode;
use bitcoin::p2p::message::{MAX_MSG_SIZE, NetworkMessage, RawNetworkMessage};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Transport;
use crate::error::{NetworkError, NetworkResult};

/// magic(4) + command(12) + length(4) + checksum(4)
const HEADER_LEN: usize = 24;

const READ_BUFFER_SIZE: usize = 8192;

enum Framed {
    Message(Box<NetworkMessage>),
    NeedMore,
    Skipped,
}

/// V1 transport over any async byte stream, normally a `TcpStream`.
pub struct V1Transport<S> {
    stream: S,
    buffer: Vec<u8>,
    magic: [u8; 4],
    network: Network,
    peer: String,
    connected: bool,
}

impl<S> V1Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    /// Wrap a connected stream. `peer` is only used in log lines.
    pub fn new(stream: S, network: Network, peer: impl Into<String>) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(READ_BUFFER_SIZE),
            magic: network.magic().to_bytes(),
            network,
            peer: peer.into(),
            connected: true,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    async fn read_some(&mut self) -> NetworkResult<()> {
        let mut chunk = [0u8; READ_BUFFER_SIZE];
        match self.stream.read(&mut chunk).await {
            Ok(0) => {
                tracing::info!("Peer {} closed the connection", self.peer);
                self.connected = false;
                Err(NetworkError::PeerDisconnected)
            }
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted) => {
                tracing::info!("Peer {} reset the connection", self.peer);
                self.connected = false;
                Err(NetworkError::PeerDisconnected)
            }
            Err(e) => {
                self.connected = false;
                Err(NetworkError::Io(e))
            }
        }
    }

    /// Try to cut one message off the front of the buffer.
    fn take_frame(&mut self) -> NetworkResult<Framed> {
        if self.buffer.len() >= 4 && self.buffer[..4] != self.magic {
            match self.buffer.windows(4).position(|w| w == self.magic) {
                Some(pos) => {
                    tracing::warn!("{}: skipping {} stray bytes before magic", self.peer, pos);
                    self.buffer.drain(..pos);
                }
                None => {
                    // The tail may still be the start of a magic.
                    let dropped = self.buffer.len() - 3;
                    tracing::warn!("{}: dropping {} bytes without magic", self.peer, dropped);
                    self.buffer.drain(..dropped);
                    return Ok(Framed::Skipped);
                }
            }
        }

        if self.buffer.len() < HEADER_LEN {
            return Ok(Framed::NeedMore);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&self.buffer[16..20]);
        let payload_len = u32::from_le_bytes(len_bytes) as usize;
        if payload_len > MAX_MSG_SIZE {
            return Err(NetworkError::ProtocolError(format!(
                "declared payload length {} exceeds {}",
                payload_len, MAX_MSG_SIZE
            )));
        }

        let frame_len = HEADER_LEN + payload_len;
        if self.buffer.len() < frame_len {
            return Ok(Framed::NeedMore);
        }

        match encode::deserialize::<RawNetworkMessage>(&self.buffer[..frame_len]) {
            Ok(raw) => {
                self.buffer.drain(..frame_len);
                tracing::trace!("{}: received {}", self.peer, raw.payload().cmd());
                Ok(Framed::Message(Box::new(raw.into_payload())))
            }
            Err(e) => {
                // Bad checksum or payload. Step past this magic and resync.
                tracing::warn!("{}: undecodable frame ({}), resyncing", self.peer, e);
                self.buffer.drain(..1);
                Ok(Framed::Skipped)
            }
        }
    }
}

#[async_trait]
impl<S> Transport for V1Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn send_message(&mut self, message: NetworkMessage) -> NetworkResult<()> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }

        let raw = RawNetworkMessage::new(self.network.magic(), message);
        let bytes = encode::serialize(&raw);
        tracing::debug!("{}: sending {} ({} bytes)", self.peer, raw.payload().cmd(), bytes.len());

        let written = match self.stream.write_all(&bytes).await {
            Ok(()) => self.stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!("{}: write failed, disconnecting: {}", self.peer, e);
            self.connected = false;
            return Err(NetworkError::Io(e));
        }
        Ok(())
    }

    async fn receive_message(&mut self) -> NetworkResult<Option<NetworkMessage>> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }

        loop {
            match self.take_frame()? {
                Framed::Message(message) => return Ok(Some(*message)),
                Framed::Skipped => return Ok(None),
                Framed::NeedMore => self.read_some().await?,
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn shutdown(&mut self) -> NetworkResult<()> {
        if self.connected {
            self.connected = false;
            if let Err(e) = self.stream.shutdown().await {
                tracing::debug!("{}: shutdown: {}", self.peer, e);
            }
            tracing::info!("Closed connection to {}", self.peer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::blockdata::constants::genesis_block;
    use tokio::io::duplex;

    fn pair() -> (V1Transport<tokio::io::DuplexStream>, V1Transport<tokio::io::DuplexStream>) {
        let (a, b) = duplex(1 << 16);
        (
            V1Transport::new(a, Network::Regtest, "a"),
            V1Transport::new(b, Network::Regtest, "b"),
        )
    }

    #[test]
    fn test_header_len() {
        assert_eq!(HEADER_LEN, 4 + 12 + 4 + 4);
    }

    #[tokio::test]
    async fn test_exchange_messages() {
        let (mut a, mut b) = pair();

        a.send_message(NetworkMessage::Ping(42)).await.unwrap();
        let block = genesis_block(Network::Regtest);
        a.send_message(NetworkMessage::Headers(vec![block.header])).await.unwrap();

        assert_eq!(b.receive_message().await.unwrap(), Some(NetworkMessage::Ping(42)));
        assert_eq!(
            b.receive_message().await.unwrap(),
            Some(NetworkMessage::Headers(vec![block.header]))
        );
    }

    #[tokio::test]
    async fn test_skips_garbage_before_magic() {
        let (raw, b) = duplex(1 << 16);
        let mut receiver = V1Transport::new(b, Network::Regtest, "b");
        let mut raw = raw;

        let frame = encode::serialize(&RawNetworkMessage::new(
            Network::Regtest.magic(),
            NetworkMessage::Pong(7),
        ));
        let mut bytes = vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee];
        bytes.extend_from_slice(&frame);
        raw.write_all(&bytes).await.unwrap();

        let mut received = None;
        while received.is_none() {
            received = receiver.receive_message().await.unwrap();
        }
        assert_eq!(received, Some(NetworkMessage::Pong(7)));
    }

    #[tokio::test]
    async fn test_oversized_length_is_protocol_error() {
        let (mut raw, b) = duplex(1 << 16);
        let mut receiver = V1Transport::new(b, Network::Regtest, "b");

        let mut header = Network::Regtest.magic().to_bytes().to_vec();
        header.extend_from_slice(b"block\0\0\0\0\0\0\0");
        header.extend_from_slice(&((MAX_MSG_SIZE as u32) + 1).to_le_bytes());
        header.extend_from_slice(&[0, 0, 0, 0]);
        raw.write_all(&header).await.unwrap();

        assert!(matches!(receiver.receive_message().await, Err(NetworkError::ProtocolError(_))));
    }

    #[tokio::test]
    async fn test_eof_is_disconnect() {
        let (a, mut b) = pair();
        drop(a);

        assert!(matches!(b.receive_message().await, Err(NetworkError::PeerDisconnected)));
        assert!(!b.is_connected());
        assert!(matches!(
            b.send_message(NetworkMessage::Verack).await,
            Err(NetworkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_wrong_network_magic_is_ignored() {
        let (mut raw, b) = duplex(1 << 16);
        let mut receiver = V1Transport::new(b, Network::Regtest, "b");

        let foreign = encode::serialize(&RawNetworkMessage::new(
            Network::Bitcoin.magic(),
            NetworkMessage::Ping(1),
        ));
        let ours = encode::serialize(&RawNetworkMessage::new(
            Network::Regtest.magic(),
            NetworkMessage::Ping(2),
        ));
        raw.write_all(&foreign).await.unwrap();
        raw.write_all(&ours).await.unwrap();

        let mut received = None;
        while received.is_none() {
            received = receiver.receive_message().await.unwrap();
        }
        assert_eq!(received, Some(NetworkMessage::Ping(2)));
    }
}
