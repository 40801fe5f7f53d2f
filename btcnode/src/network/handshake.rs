//! Version handshake.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::p2p::ServiceFlags;
use bitcoin::p2p::address::Address;
use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_network::VersionMessage;

use crate::config::Config;
use crate::error::{NetworkError, NetworkResult};
use crate::network::constants::PROTOCOL_VERSION;
use crate::network::transport::Transport;

/// What the peer told us about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerVersion {
    pub version: u32,
    pub services: ServiceFlags,
    pub user_agent: String,
    pub start_height: i32,
}

impl From<&VersionMessage> for PeerVersion {
    fn from(msg: &VersionMessage) -> Self {
        Self {
            version: msg.version,
            services: msg.services,
            user_agent: msg.user_agent.clone(),
            start_height: msg.start_height,
        }
    }
}

/// Exchange `version`/`verack` with the peer.
///
/// Completes once the peer's `version` has been acknowledged and its `verack`
/// received, in either order. Pings arriving meanwhile are answered. The whole
/// exchange is bounded by `config.timeout`.
pub async fn perform_handshake(
    transport: &mut dyn Transport,
    config: &Config,
    remote: SocketAddr,
) -> NetworkResult<PeerVersion> {
    match tokio::time::timeout(config.timeout, exchange(transport, config, remote)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Handshake with {} timed out after {:?}", remote, config.timeout);
            Err(NetworkError::HandshakeTimeout)
        }
    }
}

async fn exchange(
    transport: &mut dyn Transport,
    config: &Config,
    remote: SocketAddr,
) -> NetworkResult<PeerVersion> {
    transport.send_message(NetworkMessage::Version(version_message(config, remote))).await?;
    tracing::debug!("Sent version to {}", remote);

    let mut peer_version: Option<PeerVersion> = None;
    let mut verack_received = false;

    loop {
        let Some(message) = transport.receive_message().await? else {
            continue;
        };

        match message {
            NetworkMessage::Version(msg) => {
                tracing::debug!(
                    "Peer {} is {} (protocol {}, height {})",
                    remote,
                    msg.user_agent,
                    msg.version,
                    msg.start_height
                );
                peer_version = Some(PeerVersion::from(&msg));
                transport.send_message(NetworkMessage::Verack).await?;
            }
            NetworkMessage::Verack => {
                verack_received = true;
            }
            NetworkMessage::Ping(nonce) => {
                transport.send_message(NetworkMessage::Pong(nonce)).await?;
            }
            other => {
                tracing::trace!("Ignoring {} during handshake", other.cmd());
            }
        }

        if verack_received {
            if let Some(version) = peer_version.take() {
                tracing::info!("Handshake with {} complete ({})", remote, version.user_agent);
                return Ok(version);
            }
        }
    }
}

fn version_message(config: &Config, remote: SocketAddr) -> VersionMessage {
    let timestamp =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
    let local = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));

    VersionMessage {
        version: PROTOCOL_VERSION,
        services: ServiceFlags::NONE,
        timestamp,
        receiver: Address::new(&remote, ServiceFlags::NETWORK),
        sender: Address::new(&local, ServiceFlags::NONE),
        nonce: rand::random(),
        user_agent: config.user_agent(),
        start_height: 0,
        // Only blocks are of interest; no transaction relay.
        relay: false,
    }
}
