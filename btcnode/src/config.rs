//! Configuration for a btcnode session.

use std::time::Duration;

use bitcoin::Network;

use crate::error::ParseError;

/// Default bound on every blocking wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of inventory announcements buffered between waits.
pub const DEFAULT_INVENTORY_CAPACITY: usize = 32;

const MAX_USER_AGENT_LEN: usize = 256;

/// Parse a network name as accepted on the command line.
pub fn parse_network(name: &str) -> Result<Network, ParseError> {
    match name.to_ascii_lowercase().as_str() {
        "mainnet" | "bitcoin" | "main" => Ok(Network::Bitcoin),
        "testnet" | "test" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        _ => Err(ParseError::InvalidNetwork(name.to_string())),
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Network the peer is expected to serve. Selects the wire magic.
    pub network: Network,

    /// Bound on connect, handshake, and each header or block request.
    pub timeout: Duration,

    /// User agent announced in the version message.
    pub user_agent: Option<String>,

    /// Inventory announcements kept while nobody is waiting for blocks.
    pub inventory_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            inventory_capacity: DEFAULT_INVENTORY_CAPACITY,
        }
    }
}

impl Config {
    /// Create a new configuration for the given network.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn mainnet() -> Self {
        Self::new(Network::Bitcoin)
    }

    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    pub fn regtest() -> Self {
        Self::new(Network::Regtest)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent. Slashes are added when missing.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn with_inventory_capacity(mut self, capacity: usize) -> Self {
        self.inventory_capacity = capacity;
        self
    }

    /// The user agent to announce, normalized to `/name:version/` form.
    pub fn user_agent(&self) -> String {
        let mut agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("/blkchain:{}/", env!("CARGO_PKG_VERSION")));
        if !agent.starts_with('/') {
            agent.insert(0, '/');
        }
        if !agent.ends_with('/') {
            agent.push('/');
        }
        // Peers reject longer strings.
        if agent.len() > MAX_USER_AGENT_LEN {
            let mut end = MAX_USER_AGENT_LEN;
            while !agent.is_char_boundary(end) {
                end -= 1;
            }
            agent.truncate(end);
        }
        agent
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be > 0".to_string());
        }
        if self.inventory_capacity == 0 {
            return Err("inventory_capacity must be > 0".to_string());
        }
        Ok(())
    }
}
