//! Cursor over a reconciled header chain.

use blkchain::BlockHeader;

use crate::sync::{HeightIndex, SyncOutcome};

/// Height-ordered headers with a cursor.
///
/// The cursor starts on the lowest height held. [`advance`](Self::advance)
/// moves through any extra headers at the current height, then to the next
/// height, and reports `false` once the next height holds nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainIndex {
    by_height: HeightIndex,
    count: usize,
    height: u32,
    position: usize,
}

impl ChainIndex {
    /// An index with no headers, reporting `height` as its current height.
    pub fn empty(height: u32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    /// Index the outcome of a synchronization. `fallback_height` is reported
    /// as the current height when nothing was reconciled.
    pub fn from_outcome(outcome: SyncOutcome, fallback_height: u32) -> Self {
        let height = outcome
            .index
            .keys()
            .next()
            .copied()
            .or(outcome.base_height)
            .unwrap_or(fallback_height);

        Self {
            by_height: outcome.index,
            count: outcome.count,
            height,
            position: 0,
        }
    }

    /// Reconciled headers in the index.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current_height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.by_height.is_empty()
    }

    /// Move to the next header. Returns `false` at the end of the chain.
    pub fn advance(&mut self) -> bool {
        if self.by_height.is_empty() {
            return false;
        }

        let here = self.by_height.get(&self.height).map_or(0, Vec::len);
        if self.position + 1 < here {
            self.position += 1;
            return true;
        }

        let Some(next) = self.height.checked_add(1) else {
            return false;
        };
        if self.by_height.get(&next).map_or(true, Vec::is_empty) {
            return false;
        }
        self.height = next;
        self.position = 0;
        true
    }

    /// The header under the cursor, if the current height holds one.
    pub fn header(&self) -> Option<BlockHeader> {
        self.by_height.get(&self.height).and_then(|bucket| bucket.get(self.position)).copied()
    }

    /// Lowest and highest heights held.
    pub fn height_range(&self) -> Option<(u32, u32)> {
        let low = *self.by_height.keys().next()?;
        let high = *self.by_height.keys().next_back()?;
        Some((low, high))
    }
}
