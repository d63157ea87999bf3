// src/pool/config.rs
//! Configuration for the size-classed resource pool.

use crate::error::{PoolError, Result};
use crate::sizer::{BucketSizer, BucketSizerExt, Exponential};
use std::sync::Arc;

/// Controls whether an `acquire` widens its reservation to the full bucket
/// capacity only when capacity is already available, or always.
///
/// See the "Edge widening policy" design note: widening raises an
/// acquire's reservation from the requested size to its bucket's entry
/// capacity so the resulting resource is poolable on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WideningStrategy {
    /// Only widen when `not_pooled_capacity + pooled_bytes` already covers
    /// the full bucket capacity. This is the default, matching the core
    /// acquire algorithm exactly.
    #[default]
    UseAvailableCapacity,
    /// Always widen to the bucket's full capacity, reclaiming or blocking
    /// for the difference if necessary. Every acquired resource is then
    /// poolable on release, at the cost of more eager reclamation.
    EnforcePoolableCapacity,
}

/// Constructor parameters for a [`crate::Pool`], validated when the pool is
/// built.
#[derive(Clone)]
pub struct PoolConfig {
    pub(crate) total_capacity: u64,
    pub(crate) poolable_capacity: Option<u64>,
    pub(crate) bucket_sizer: Option<Arc<dyn BucketSizer>>,
    pub(crate) widening_strategy: WideningStrategy,
}

impl PoolConfig {
    /// Starts a config with the given hard capacity ceiling. `total_capacity`
    /// must be `> 0`. `poolable_capacity` defaults to `total_capacity` and
    /// the bucket sizer defaults to the formula in [`default_bucket_sizer`]
    /// unless overridden.
    pub fn new(total_capacity: u64) -> Result<Self> {
        if total_capacity == 0 {
            return Err(PoolError::invalid_argument("total_capacity must be > 0"));
        }
        Ok(Self {
            total_capacity,
            poolable_capacity: None,
            bucket_sizer: None,
            widening_strategy: WideningStrategy::default(),
        })
    }

    /// Sets the ceiling on resident pooled bytes. Must be `<= total_capacity`.
    pub fn with_poolable_capacity(mut self, poolable_capacity: u64) -> Result<Self> {
        if poolable_capacity > self.total_capacity {
            return Err(PoolError::invalid_argument(format!(
                "poolable_capacity {poolable_capacity} exceeds total_capacity {}",
                self.total_capacity
            )));
        }
        self.poolable_capacity = Some(poolable_capacity);
        Ok(self)
    }

    /// Overrides the bucket sizer strategy (see [`crate::sizer`]).
    pub fn with_bucket_sizer(mut self, sizer: impl BucketSizer + 'static) -> Self {
        self.bucket_sizer = Some(Arc::new(sizer));
        self
    }

    /// Overrides the widening strategy (default [`WideningStrategy::UseAvailableCapacity`]).
    pub fn with_widening_strategy(mut self, strategy: WideningStrategy) -> Self {
        self.widening_strategy = strategy;
        self
    }

    pub(crate) fn resolve(
        self,
    ) -> Result<(u64, u64, Arc<dyn BucketSizer>, WideningStrategy)> {
        let poolable_capacity = self.poolable_capacity.unwrap_or(self.total_capacity);
        let bucket_sizer = match self.bucket_sizer {
            Some(sizer) => sizer,
            None => default_bucket_sizer(poolable_capacity)?,
        };
        Ok((
            self.total_capacity,
            poolable_capacity,
            bucket_sizer,
            self.widening_strategy,
        ))
    }
}

/// The pool's default bucket sizer when none is supplied:
/// `exponential(f)` with `f = max(2, ceil(ln(poolable_capacity) / ln(steps)))`,
/// `steps = 32` when `poolable_capacity <= 1 MiB` else `256`, aligned to 64
/// bytes.
pub fn default_bucket_sizer(poolable_capacity: u64) -> Result<Arc<dyn BucketSizer>> {
    const ONE_MIB: u64 = 1 << 20;
    let steps: f64 = if poolable_capacity <= ONE_MIB {
        32.0
    } else {
        256.0
    };
    let p = poolable_capacity.max(1) as f64;
    let f = (p.ln() / steps.ln()).ceil().max(2.0);
    let sizer = Exponential::new(f)?.with_alignment(64)?;
    Ok(Arc::new(sizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_total_capacity() {
        assert!(PoolConfig::new(0).is_err());
    }

    #[test]
    fn poolable_capacity_cannot_exceed_total() {
        let config = PoolConfig::new(100).unwrap();
        assert!(config.with_poolable_capacity(200).is_err());
    }

    #[test]
    fn default_sizer_resolves_without_error() {
        let config = PoolConfig::new(4096).unwrap();
        let (total, poolable, sizer, strategy) = config.resolve().unwrap();
        assert_eq!(total, 4096);
        assert_eq!(poolable, 4096);
        assert_eq!(strategy, WideningStrategy::UseAvailableCapacity);
        // bucket 0 should still satisfy the round-trip invariant.
        let idx = sizer.size_to_index(1).unwrap();
        assert!(sizer.index_to_capacity(idx).unwrap() >= 1);
    }
}
