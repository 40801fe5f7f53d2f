//! Known (height, hash) pairs that seed synchronization.

use std::collections::BTreeMap;
use std::str::FromStr;

use blkchain::Hash256;

use crate::error::ParseError;

/// Heights mapped to the hashes already known to sit at them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchors {
    by_height: BTreeMap<u32, Vec<Hash256>>,
}

impl Anchors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash` at `height`. Repeated pairs are kept once.
    pub fn insert(&mut self, height: u32, hash: Hash256) {
        let hashes = self.by_height.entry(height).or_default();
        if !hashes.contains(&hash) {
            hashes.push(hash);
        }
    }

    pub fn with(mut self, height: u32, hash: Hash256) -> Self {
        self.insert(height, hash);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.by_height.is_empty()
    }

    /// Number of anchored hashes across all heights.
    pub fn len(&self) -> usize {
        self.by_height.values().map(Vec::len).sum()
    }

    pub fn max_height(&self) -> Option<u32> {
        self.by_height.keys().next_back().copied()
    }

    /// Anchors in ascending height order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Hash256])> + '_ {
        self.by_height.iter().map(|(height, hashes)| (*height, hashes.as_slice()))
    }

    /// The initial block locator: lowest height first.
    ///
    /// The peer resumes after the first hash it recognizes rather than the
    /// most recent one, so the oldest anchor leads.
    pub fn locator(&self) -> Vec<Hash256> {
        self.by_height.values().flatten().copied().collect()
    }
}

impl FromIterator<(u32, Hash256)> for Anchors {
    fn from_iter<I: IntoIterator<Item = (u32, Hash256)>>(iter: I) -> Self {
        let mut anchors = Anchors::new();
        for (height, hash) in iter {
            anchors.insert(height, hash);
        }
        anchors
    }
}

/// One anchor written as `HEIGHT:HASH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSpec {
    pub height: u32,
    pub hash: Hash256,
}

impl FromStr for AnchorSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ParseError::InvalidAnchor(s.to_string(), reason);

        let (height, hash) =
            s.split_once(':').ok_or_else(|| invalid("expected HEIGHT:HASH".to_string()))?;
        let height = height.trim().parse::<u32>().map_err(|e| invalid(format!("height: {}", e)))?;
        let hash = hash.trim().parse::<Hash256>().map_err(|e| invalid(format!("hash: {}", e)))?;

        Ok(AnchorSpec {
            height,
            hash,
        })
    }
}

impl Extend<AnchorSpec> for Anchors {
    fn extend<I: IntoIterator<Item = AnchorSpec>>(&mut self, iter: I) {
        for spec in iter {
            self.insert(spec.height, spec.hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

    fn hash(n: u8) -> Hash256 {
        Hash256::from_byte_array([n; 32])
    }

    #[test]
    fn test_locator_is_lowest_height_first() {
        let anchors = Anchors::new().with(300, hash(3)).with(100, hash(1)).with(200, hash(2));
        assert_eq!(anchors.locator(), vec![hash(1), hash(2), hash(3)]);
        assert_eq!(anchors.max_height(), Some(300));
    }

    #[test]
    fn test_insert_keeps_siblings_and_drops_repeats() {
        let mut anchors = Anchors::new();
        anchors.insert(5, hash(1));
        anchors.insert(5, hash(2));
        anchors.insert(5, hash(1));

        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors.iter().collect::<Vec<_>>(), vec![(5, &[hash(1), hash(2)][..])]);
    }

    #[test]
    fn test_parse_anchor_spec() {
        let spec: AnchorSpec = format!("0:{}", GENESIS).parse().unwrap();
        assert_eq!(spec.height, 0);
        assert_eq!(spec.hash.to_string(), GENESIS);

        let mut anchors = Anchors::new();
        anchors.extend([spec]);
        assert_eq!(anchors.locator(), vec![spec.hash]);
    }

    #[test]
    fn test_parse_anchor_spec_errors() {
        assert!(matches!("100".parse::<AnchorSpec>(), Err(ParseError::InvalidAnchor(..))));
        assert!(matches!(
            format!("x:{}", GENESIS).parse::<AnchorSpec>(),
            Err(ParseError::InvalidAnchor(..))
        ));
        assert!(matches!("7:abcd".parse::<AnchorSpec>(), Err(ParseError::InvalidAnchor(..))));
    }

    #[test]
    fn test_empty() {
        let anchors = Anchors::new();
        assert!(anchors.is_empty());
        assert!(anchors.locator().is_empty());
        assert_eq!(anchors.max_height(), None);
    }
}
