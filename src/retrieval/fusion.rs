//! Reciprocal Rank Fusion algorithm for combining ranked lists

use ahash::AHashMap;
use std::hash::Hash;
use thiserror::Error;

/// Constant the vector engine uses for its own RRF
pub const DEFAULT_RRF_K: f32 = 2.0;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid RRF constant {0}: must be positive and finite")]
    InvalidK(f32),
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    /// RRF K constant
    pub rrf_k: f32,
}

impl FusionConfig {
    pub fn new(rrf_k: f32) -> Result<Self, FusionError> {
        if !rrf_k.is_finite() || rrf_k <= 0.0 {
            return Err(FusionError::InvalidK(rrf_k));
        }
        Ok(Self { rrf_k })
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

/// Apply Reciprocal Rank Fusion to combine the dense and sparse lists
///
/// RRF formula: score(id) = sum over lists containing id of: 1 / (rank + k),
/// with 0-based ranks.
///
/// # Arguments
/// * `dense` - ids ranked by the dense search
/// * `sparse` - ids ranked by the sparse search
/// * `config` - Fusion configuration
///
/// # Returns
/// Fused results as (id, fused_score) pairs sorted by score descending. Equal
/// scores keep first-seen order, and the dense list is walked first.
pub fn reciprocal_rank_fusion<T>(dense: &[T], sparse: &[T], config: &FusionConfig) -> Vec<(T, f32)>
where
    T: Clone + Eq + Hash,
{
    let mut positions: AHashMap<&T, usize> = AHashMap::with_capacity(dense.len() + sparse.len());
    let mut fused: Vec<(T, f32)> = Vec::with_capacity(dense.len() + sparse.len());

    for list in [dense, sparse] {
        for (rank, id) in list.iter().enumerate() {
            let contribution = 1.0 / (rank as f32 + config.rrf_k);
            match positions.get(id) {
                Some(&pos) => fused[pos].1 += contribution,
                None => {
                    positions.insert(id, fused.len());
                    fused.push((id.clone(), contribution));
                }
            }
        }
    }

    // Stable sort keeps insertion order for ties
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    fused
}
