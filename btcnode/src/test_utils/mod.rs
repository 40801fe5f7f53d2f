//! Test utilities: scripted peers and header-chain builders.

pub mod chain;
pub mod network;
pub mod peer;

pub use chain::{block_after, block_for, header_after, header_chain, test_hash};
pub use network::MockNetworkManager;
pub use peer::{MockPeer, MockPeerHandle};
