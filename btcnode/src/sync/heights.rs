//! Height assignment.
//!
//! Headers arrive without heights. They are linked by the hash they claim as
//! parent, and heights are then propagated forward from the anchors: a child
//! of a header at height `h` sits at `h + 1`. Headers not reachable from any
//! anchor never get a height and are left out of the resulting
//! [`HeightIndex`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use blkchain::{BlockHeader, Hash256};

use crate::sync::anchors::Anchors;

/// Headers at each height, ascending.
pub type HeightIndex = BTreeMap<u32, Vec<BlockHeader>>;

/// A received header and, once resolved, its height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightedHeader {
    pub header: BlockHeader,
    pub hash: Hash256,
    pub height: Option<u32>,
}

impl HeightedHeader {
    pub fn new(header: BlockHeader) -> Self {
        Self {
            hash: header.hash(),
            header,
            height: None,
        }
    }
}

/// Received headers keyed by the hash of the parent they claim.
///
/// Siblings keep their arrival order.
#[derive(Debug, Default)]
pub struct ParentHashIndex {
    children: HashMap<Hash256, Vec<HeightedHeader>>,
    seen: HashSet<Hash256>,
}

impl ParentHashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `header` under its parent. Returns `false` if the same header was
    /// already linked.
    pub fn insert(&mut self, header: BlockHeader) -> bool {
        let entry = HeightedHeader::new(header);
        if !self.seen.insert(entry.hash) {
            return false;
        }
        self.children.entry(header.prev_hash).or_default().push(entry);
        true
    }

    /// Number of linked headers.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn children_of(&self, parent: &Hash256) -> &[HeightedHeader] {
        self.children.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Assign heights by walking forward from `anchors`.
    ///
    /// Returns the highest anchor height that has at least one child among the
    /// linked headers, or `None` when no header connects to any anchor. Uses
    /// an explicit queue, so chain length does not bound stack depth. A header
    /// reachable by two routes keeps the first height it was given.
    pub fn resolve_heights(&mut self, anchors: &Anchors) -> Option<u32> {
        let mut base = None;
        let mut queue: VecDeque<(Hash256, u32)> = VecDeque::new();
        let mut visited: HashSet<Hash256> = HashSet::new();

        for (height, hashes) in anchors.iter() {
            for hash in hashes {
                if !self.children_of(hash).is_empty() {
                    base = Some(height);
                }
                if visited.insert(*hash) {
                    queue.push_back((*hash, height));
                }
            }
        }

        while let Some((parent, height)) = queue.pop_front() {
            let Some(children) = self.children.get_mut(&parent) else {
                continue;
            };
            let Some(child_height) = height.checked_add(1) else {
                continue;
            };
            for child in children.iter_mut() {
                match child.height {
                    None => child.height = Some(child_height),
                    Some(assigned) if assigned != child_height => {
                        tracing::warn!(
                            "Header {} reachable at heights {} and {}, keeping {}",
                            child.hash,
                            assigned,
                            child_height,
                            assigned
                        );
                    }
                    Some(_) => {}
                }
                if visited.insert(child.hash) {
                    queue.push_back((child.hash, child.height.unwrap_or(child_height)));
                }
            }
        }

        base
    }

    /// Group resolved headers by height. Unresolved headers are dropped.
    pub fn into_height_index(self) -> HeightIndex {
        let mut index = HeightIndex::new();
        let mut unresolved = 0usize;

        for header in self.children.into_values().flatten() {
            match header.height {
                Some(height) => index.entry(height).or_default().push(header.header),
                None => unresolved += 1,
            }
        }

        if unresolved > 0 {
            tracing::info!("Dropped {} headers not connected to any anchor", unresolved);
        }
        index
    }
}
