//! Header-chain reconciliation against a single Bitcoin peer.
//!
//! This library connects to one node and:
//!
//! - Downloads block headers past a set of caller-supplied anchors using the
//!   block-locator protocol
//! - Places every header at a height relative to those anchors
//! - Prunes forks so that exactly one header remains per height
//! - Walks the result with a cursor and fetches full blocks on demand
//! - Waits for newly announced blocks until cancelled
//!
//! # Quick Start
//!
//! ```no_run
//! use btcnode::{Anchors, BlockHeaderIndex, Config, open_index};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let anchors = Anchors::new().with(
//!         840_000,
//!         "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5".parse()?,
//!     );
//!
//!     let mut index = open_index("127.0.0.1:8333", Config::mainnet(), &anchors).await?;
//!     println!("{} headers past the anchors", index.count());
//!
//!     if index.header().is_some() {
//!         let block = index.read_block().await?;
//!         println!("height {} has {} transactions", index.current_height(), block.txs.len());
//!     }
//!     Ok(())
//! }
//! ```

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod sync;

// Re-export main types for convenience
pub use chain::{BlockHeaderIndex, ChainIndex};
pub use client::{BlockFetcher, BtcNode, open_index};
pub use config::Config;
pub use error::{
    BtcNodeError, LoggingError, LoggingResult, NetworkError, NetworkResult, ParseError, Result,
    SyncError, SyncResult,
};
pub use logging::{LogFileConfig, LoggingConfig, LoggingGuard, init_console_logging, init_logging};
pub use network::{NetworkManager, PeerSession, PeerVersion};
pub use sync::{AnchorSpec, Anchors, SyncOutcome};
pub use tokio_util::sync::CancellationToken;
pub use tracing::level_filters::LevelFilter;

// The data model handed to callers.
pub use blkchain;
pub use blkchain::{Block, BlockHeader, Hash256};

pub use bitcoin::Network;

/// Current version of the btcnode library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
