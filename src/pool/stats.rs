// src/pool/stats.rs
//! Observability snapshot for a pool.

/// A consistent snapshot of a pool's accounting, taken under a single lock
/// acquisition (the individual getters on [`crate::Pool`] each take the
/// lock separately; this bundles them so observers don't need four).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// `not_pooled_capacity + pooled_bytes`.
    pub available_capacity: u64,
    /// Bytes neither held by a client nor sitting in a bucket.
    pub unused_capacity: u64,
    /// Bytes currently idle across all buckets.
    pub pooled_bytes: u64,
    /// Number of threads currently blocked in `acquire`.
    pub queued: usize,
    /// The pool's immutable hard capacity ceiling.
    pub total_capacity: u64,
    /// The pool's immutable poolable-bytes ceiling.
    pub poolable_capacity: u64,
}

impl PoolStats {
    /// Bytes currently held by clients: `total_capacity - available_capacity`.
    pub fn in_use_capacity(&self) -> u64 {
        self.total_capacity - self.available_capacity
    }
}
