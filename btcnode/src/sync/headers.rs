//! The header download loop.

use bitcoin::BlockHash;
use blkchain::BlockHeader;

use crate::error::SyncResult;
use crate::network::NetworkManager;
use crate::sync::anchors::Anchors;
use crate::sync::heights::{HeightIndex, ParentHashIndex};
use crate::sync::orphans::eliminate_orphans;

/// Result of a completed header download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// One header per height after orphan elimination.
    pub index: HeightIndex,
    /// Headers in `index`.
    pub count: usize,
    /// Highest anchor height that received children, if any did.
    pub base_height: Option<u32>,
}

/// Downloads headers from one peer and reconciles them into a [`HeightIndex`].
pub struct HeaderSynchronizer<'a, N: NetworkManager + ?Sized> {
    network: &'a mut N,
}

impl<'a, N: NetworkManager + ?Sized> HeaderSynchronizer<'a, N> {
    pub fn new(network: &'a mut N) -> Self {
        Self {
            network,
        }
    }

    /// Download every header the peer has past `anchors`, then assign heights
    /// and eliminate orphans.
    ///
    /// Requests go out one at a time. The first carries the anchor locator;
    /// each later one carries only the last header received. An empty reply
    /// ends the download. A peer that sends nothing yields an empty outcome.
    pub async fn synchronize(&mut self, anchors: &Anchors) -> SyncResult<SyncOutcome> {
        let mut parents = ParentHashIndex::new();
        let mut locator: Vec<BlockHash> = anchors.locator().into_iter().map(BlockHash::from).collect();
        let mut received = 0usize;

        loop {
            let batch = self.network.request_headers(locator.clone()).await?;
            let Some(last) = batch.last() else {
                tracing::info!("End of headers after {} received", received);
                break;
            };
            tracing::info!("Received batch of {} headers", batch.len());

            let last_hash = last.block_hash();
            let mut fresh = 0usize;
            for wire in &batch {
                if parents.insert(BlockHeader::from(wire)) {
                    fresh += 1;
                } else {
                    tracing::debug!("Header {} already received", wire.block_hash());
                }
            }
            received += batch.len();

            if fresh == 0 {
                // Same locator again would return the same batch.
                tracing::warn!("Batch of {} headers held nothing new, stopping", batch.len());
                break;
            }
            locator = vec![last_hash];
        }

        if parents.is_empty() {
            return Ok(SyncOutcome::default());
        }

        let base_height = parents.resolve_heights(anchors);
        let mut index = parents.into_height_index();
        let count = eliminate_orphans(&mut index)?;

        match base_height {
            Some(base) => tracing::info!("Reconciled {} headers above height {}", count, base),
            None => tracing::warn!("None of the {} received headers connect to an anchor", received),
        }

        Ok(SyncOutcome {
            index,
            count,
            base_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::test_utils::{MockNetworkManager, header_after, header_chain, test_hash};
    use bitcoin::Network;
    use std::time::Duration;

    fn anchors(height: u32, n: u8) -> Anchors {
        Anchors::new().with(height, test_hash(n).into())
    }

    #[tokio::test]
    async fn test_scenario_linear_batch() {
        let chain = header_chain(test_hash(100), 2);
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(chain.clone());

        let outcome =
            HeaderSynchronizer::new(&mut network).synchronize(&anchors(100, 100)).await.unwrap();

        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.base_height, Some(100));
        assert_eq!(outcome.index[&101], vec![BlockHeader::from(&chain[0])]);
        assert_eq!(outcome.index[&102], vec![BlockHeader::from(&chain[1])]);
        assert_eq!(
            network.locators(),
            &[vec![test_hash(100)], vec![chain[1].block_hash()]]
        );
    }

    #[tokio::test]
    async fn test_scenario_sibling_orphan() {
        let a101 = header_after(test_hash(100), 1);
        let b101 = header_after(test_hash(100), 2);
        let c102 = header_after(a101.block_hash(), 3);
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(vec![a101, b101, c102]);

        let outcome =
            HeaderSynchronizer::new(&mut network).synchronize(&anchors(100, 100)).await.unwrap();

        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.index[&101], vec![BlockHeader::from(&a101)]);
    }

    #[tokio::test]
    async fn test_multiple_batches_resume_from_last_header() {
        let chain = header_chain(test_hash(1), 7);
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(chain[..3].to_vec());
        network.add_batch(chain[3..].to_vec());

        let outcome = HeaderSynchronizer::new(&mut network).synchronize(&anchors(0, 1)).await.unwrap();

        assert_eq!(outcome.count, 7);
        assert_eq!(network.locators().len(), 3);
        assert_eq!(network.locators()[1], vec![chain[2].block_hash()]);
        assert_eq!(network.locators()[2], vec![chain[6].block_hash()]);
    }

    #[tokio::test]
    async fn test_locator_lists_lowest_anchor_first() {
        let mut network = MockNetworkManager::new(Network::Regtest);
        let anchors = anchors(300, 3).with(100, test_hash(1).into()).with(200, test_hash(2).into());

        HeaderSynchronizer::new(&mut network).synchronize(&anchors).await.unwrap();

        assert_eq!(network.locators()[0], vec![test_hash(1), test_hash(2), test_hash(3)]);
    }

    #[tokio::test]
    async fn test_count_is_headers_reachable_from_anchors() {
        let mut batch = header_chain(test_hash(1), 4);
        batch.extend(header_chain(test_hash(42), 3));
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(batch);

        let outcome = HeaderSynchronizer::new(&mut network).synchronize(&anchors(10, 1)).await.unwrap();

        assert_eq!(outcome.count, 4);
        assert_eq!(outcome.index.keys().copied().collect::<Vec<_>>(), vec![11, 12, 13, 14]);
    }

    #[tokio::test]
    async fn test_no_headers_is_empty_outcome() {
        let mut network = MockNetworkManager::new(Network::Regtest);
        let outcome = HeaderSynchronizer::new(&mut network).synchronize(&anchors(5, 1)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::default());
        assert_eq!(network.locators().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_batch_stops_download() {
        let chain = header_chain(test_hash(1), 3);
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(chain.clone());
        network.add_batch(chain.clone());
        network.add_batch(header_chain(test_hash(9), 3));

        let outcome = HeaderSynchronizer::new(&mut network).synchronize(&anchors(0, 1)).await.unwrap();

        assert_eq!(outcome.count, 3);
        assert_eq!(network.locators().len(), 2);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let mut network =
            MockNetworkManager::new(Network::Regtest).with_timeout(Duration::from_millis(50));
        network.mute_headers();

        let result = HeaderSynchronizer::new(&mut network).synchronize(&anchors(0, 1)).await;
        assert!(matches!(result, Err(SyncError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_ambiguous_chain_is_reported() {
        let mut network = MockNetworkManager::new(Network::Regtest);
        network.add_batch(vec![header_after(test_hash(1), 1), header_after(test_hash(1), 2)]);

        let result = HeaderSynchronizer::new(&mut network).synchronize(&anchors(0, 1)).await;
        assert!(matches!(
            result,
            Err(SyncError::AmbiguousChain {
                height: 1
            })
        ));
    }
}
