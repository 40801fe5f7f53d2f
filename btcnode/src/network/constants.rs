//! Protocol constants.

use std::time::Duration;

/// Protocol version announced in our `version` message (BIP339 wtxid relay era).
pub const PROTOCOL_VERSION: u32 = 70016;

/// How often the session pings an otherwise idle peer.
pub const PING_INTERVAL: Duration = Duration::from_secs(120);

/// Request channel depth between the session handle and its driver task.
pub const REQUEST_QUEUE_DEPTH: usize = 4;
