//! Outbound TCP connection to a single peer.

use std::net::SocketAddr;
use std::time::Duration;

use bitcoin::Network;
use tokio::net::TcpStream;

use crate::error::{NetworkError, NetworkResult};
use crate::network::transport::V1Transport;

/// Connect to `address` (`host:port`), bounded by `timeout`.
///
/// Returns the transport together with the resolved remote address. Expiry and
/// refusal both surface as [`NetworkError::ConnectionFailed`].
pub async fn connect(
    address: &str,
    network: Network,
    timeout: Duration,
) -> NetworkResult<(V1Transport<TcpStream>, SocketAddr)> {
    check_address(address)?;
    tracing::info!("Connecting to {} ({})", address, network);

    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| NetworkError::ConnectionFailed(format!("connection to {} timed out", address)))?
        .map_err(|e| {
            NetworkError::ConnectionFailed(format!("failed to connect to {}: {}", address, e))
        })?;

    stream.set_nodelay(true).map_err(|e| {
        NetworkError::ConnectionFailed(format!("failed to set TCP_NODELAY: {}", e))
    })?;

    let remote = stream.peer_addr()?;
    tracing::debug!("TCP connection to {} established", remote);
    Ok((V1Transport::new(stream, network, remote.to_string()), remote))
}

/// `address` must be `host:port` with a numeric port.
fn check_address(address: &str) -> NetworkResult<()> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| NetworkError::AddressParse(format!("{} has no port", address)))?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(NetworkError::AddressParse(format!("expected host:port, got {}", address)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::transport::Transport;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let (transport, accepted) =
            tokio::join!(connect(&address, Network::Regtest, Duration::from_secs(5)), listener.accept());

        let (transport, remote) = transport.unwrap();
        assert_eq!(remote, accepted.unwrap().0.local_addr().unwrap());
        assert!(transport.is_connected());
        assert_eq!(transport.network(), Network::Regtest);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = connect(&address, Network::Regtest, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(NetworkError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_address() {
        for address in ["localhost", ":8333", "127.0.0.1:port"] {
            let result = connect(address, Network::Regtest, Duration::from_secs(1)).await;
            assert!(matches!(result, Err(NetworkError::AddressParse(_))), "{}", address);
        }
    }
}
