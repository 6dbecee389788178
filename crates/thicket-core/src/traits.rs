//! Trait interfaces for collaborators of the proof index.
//!
//! - [`ChainView`] — best-chain lookups supplied by the chain-tip manager

use crate::types::Hash256;

/// Height and hash of the current best block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BestState {
    pub height: u64,
    pub hash: Hash256,
}

/// Read-only view of the best chain.
///
/// Implemented by the chain-tip manager. Lookups are against the main chain
/// only; side-chain blocks are never returned.
pub trait ChainView: Send + Sync {
    /// Hash of the main-chain block at `height`. Returns `None` if the
    /// height is above the tip.
    fn block_hash_by_height(&self, height: u64) -> Option<Hash256>;

    /// Current chain tip.
    fn best_snapshot(&self) -> BestState;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedChain {
        hashes: Vec<Hash256>,
    }

    impl ChainView for FixedChain {
        fn block_hash_by_height(&self, height: u64) -> Option<Hash256> {
            self.hashes.get(height as usize).copied()
        }

        fn best_snapshot(&self) -> BestState {
            let height = self.hashes.len().saturating_sub(1) as u64;
            BestState {
                height,
                hash: self.hashes.last().copied().unwrap_or(Hash256::ZERO),
            }
        }
    }

    #[test]
    fn chain_view_is_object_safe() {
        let chain: Box<dyn ChainView> = Box::new(FixedChain {
            hashes: vec![Hash256([0; 32]), Hash256([1; 32])],
        });
        assert_eq!(chain.block_hash_by_height(1), Some(Hash256([1; 32])));
        assert_eq!(chain.block_hash_by_height(2), None);
        assert_eq!(
            chain.best_snapshot(),
            BestState { height: 1, hash: Hash256([1; 32]) }
        );
    }
}
