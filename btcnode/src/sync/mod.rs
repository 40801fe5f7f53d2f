//! Header synchronization and reconciliation.
//!
//! [`HeaderSynchronizer`] downloads headers with the block-locator protocol,
//! [`ParentHashIndex::resolve_heights`] places them at heights relative to the
//! caller's [`Anchors`], and [`eliminate_orphans`] leaves a single header per
//! height.

pub mod anchors;
pub mod headers;
pub mod heights;
pub mod orphans;

pub use anchors::{AnchorSpec, Anchors};
pub use headers::{HeaderSynchronizer, SyncOutcome};
pub use heights::{HeightIndex, HeightedHeader, ParentHashIndex};
pub use orphans::eliminate_orphans;
