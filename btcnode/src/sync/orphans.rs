//! Orphan elimination: reduce a [`HeightIndex`] to one header per height.

use blkchain::Hash256;

use crate::error::{SyncError, SyncResult};
use crate::sync::heights::HeightIndex;

/// Collapse competing headers so every height keeps exactly one.
///
/// Heights at the top holding more than one header are dropped entirely,
/// since a fork at the tip cannot be decided yet. Below the tip, the header
/// kept at each contested height is the one whose hash is the parent claimed
/// by the header kept above it. Returns the number of headers left.
///
/// Fails with [`SyncError::AmbiguousChain`] when a contested height has no
/// single matching header, or when every height down to the lowest one is
/// contested.
pub fn eliminate_orphans(index: &mut HeightIndex) -> SyncResult<usize> {
    let mut count: usize = index.values().map(Vec::len).sum();
    let Some(&min) = index.keys().next() else {
        return Ok(0);
    };

    let top = loop {
        let Some((&height, bucket)) = index.iter().next_back() else {
            return Ok(0);
        };
        if bucket.len() <= 1 {
            break height;
        }
        if height == min {
            return Err(SyncError::AmbiguousChain {
                height,
            });
        }
        tracing::info!("Chain is split at tip height {}, dropping {} headers", height, bucket.len());
        count -= bucket.len();
        index.remove(&height);
    };

    let mut expected: Option<Hash256> = index.get(&top).and_then(|b| b.first()).map(|h| h.prev_hash);

    for (&height, bucket) in index.range_mut(min..top).rev() {
        if bucket.len() > 1 {
            let Some(parent) = expected else {
                return Err(SyncError::AmbiguousChain {
                    height,
                });
            };
            let before = bucket.len();
            bucket.retain(|header| {
                let keep = header.hash() == parent;
                if !keep {
                    tracing::info!("Ignoring orphan block {} at height {}", header.hash(), height);
                }
                keep
            });
            if bucket.len() != 1 {
                return Err(SyncError::AmbiguousChain {
                    height,
                });
            }
            count -= before - 1;
        } else if let (Some(header), Some(parent)) = (bucket.first(), expected) {
            if header.hash() != parent {
                tracing::warn!("Header at height {} does not link to the header above it", height);
            }
        }

        // Empty buckets keep the expectation from above.
        if let Some(header) = bucket.first() {
            expected = Some(header.prev_hash);
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{header_after, header_chain, test_hash};
    use blkchain::BlockHeader;

    fn header(prev: Hash256, nonce: u32) -> BlockHeader {
        BlockHeader::from(header_after(prev.into(), nonce))
    }

    /// A linear chain at heights `start..start + len`.
    fn linear(start: u32, len: usize) -> (HeightIndex, Vec<BlockHeader>) {
        let chain: Vec<BlockHeader> =
            header_chain(test_hash(1), len).iter().map(BlockHeader::from).collect();
        let index = chain.iter().enumerate().map(|(i, h)| (start + i as u32, vec![*h])).collect();
        (index, chain)
    }

    #[test]
    fn test_empty_index() {
        let mut index = HeightIndex::new();
        assert_eq!(eliminate_orphans(&mut index).unwrap(), 0);
    }

    #[test]
    fn test_linear_chain_is_untouched_and_idempotent() {
        let (mut index, _) = linear(10, 6);
        let original = index.clone();

        assert_eq!(eliminate_orphans(&mut index).unwrap(), 6);
        assert_eq!(index, original);
        assert_eq!(eliminate_orphans(&mut index).unwrap(), 6);
        assert_eq!(index, original);
    }

    #[test]
    fn test_single_fork_keeps_parent_of_descendant() {
        let anchor: Hash256 = test_hash(1).into();
        let a = header(anchor, 1);
        let b = header(anchor, 2);
        let c = header(a.hash(), 3);
        let mut index = HeightIndex::from([(101, vec![a, b]), (102, vec![c])]);

        assert_eq!(eliminate_orphans(&mut index).unwrap(), 2);
        assert_eq!(index[&101], vec![a]);
        assert_eq!(index[&102], vec![c]);

        // Already singular: a second pass changes nothing.
        let settled = index.clone();
        assert_eq!(eliminate_orphans(&mut index).unwrap(), 2);
        assert_eq!(index, settled);
    }

    #[test]
    fn test_forks_at_several_heights() {
        let anchor: Hash256 = test_hash(1).into();
        let a1 = header(anchor, 1);
        let x1 = header(anchor, 2);
        let y1 = header(anchor, 3);
        let a2 = header(a1.hash(), 4);
        let x2 = header(x1.hash(), 5);
        let a3 = header(a2.hash(), 6);
        let mut index = HeightIndex::from([(1, vec![x1, a1, y1]), (2, vec![a2, x2]), (3, vec![a3])]);

        assert_eq!(eliminate_orphans(&mut index).unwrap(), 3);
        assert_eq!(index[&1], vec![a1]);
        assert_eq!(index[&2], vec![a2]);
    }

    #[test]
    fn test_fork_at_tip_is_discarded() {
        let (mut index, chain) = linear(50, 4);
        let tip = chain[3].hash();
        index.insert(54, vec![header(tip, 100), header(tip, 101)]);
        index.insert(55, vec![header(tip, 102), header(tip, 103), header(tip, 104)]);

        assert_eq!(eliminate_orphans(&mut index).unwrap(), 4);
        assert_eq!(index.keys().copied().collect::<Vec<_>>(), vec![50, 51, 52, 53]);
    }

    #[test]
    fn test_all_heights_forked_is_ambiguous() {
        let anchor: Hash256 = test_hash(1).into();
        let mut index = HeightIndex::from([
            (1, vec![header(anchor, 1), header(anchor, 2)]),
            (2, vec![header(anchor, 3), header(anchor, 4)]),
        ]);

        assert!(matches!(
            eliminate_orphans(&mut index),
            Err(SyncError::AmbiguousChain {
                height: 1
            })
        ));
    }

    #[test]
    fn test_no_matching_parent_is_ambiguous() {
        let anchor: Hash256 = test_hash(1).into();
        let a = header(anchor, 1);
        let b = header(anchor, 2);
        let stranger = header(test_hash(7).into(), 3);
        let mut index = HeightIndex::from([(1, vec![a, b]), (2, vec![stranger])]);

        assert!(matches!(
            eliminate_orphans(&mut index),
            Err(SyncError::AmbiguousChain {
                height: 1
            })
        ));
    }

    #[test]
    fn test_gap_keeps_expected_parent() {
        let anchor: Hash256 = test_hash(1).into();
        let a = header(anchor, 1);
        let b = header(anchor, 2);
        let c = header(a.hash(), 3);
        let mut index = HeightIndex::from([(1, vec![a, b]), (2, vec![]), (3, vec![c])]);

        assert_eq!(eliminate_orphans(&mut index).unwrap(), 2);
        assert_eq!(index[&1], vec![a]);
    }
}
