// src/handler.rs
//! The pluggable resource lifecycle a pool consumes.
//!
//! `ResourceHandler` is the pool's sole extension point: everything the pool
//! core knows about a concrete resource type (an off-heap buffer, a pooled
//! socket, whatever) goes through this trait. The pool owns exactly one
//! handler for its lifetime and never re-enters itself from within a
//! handler callback.

use crate::error::Result;

/// Lifecycle operations a pool needs from its pooled resource type.
///
/// Implementations must be `Send + Sync`: `create` runs on the calling
/// thread outside the pool's lock, while `destroy`/`cleanup` run under the
/// lock during `release`, `clear`, and `close`.
pub trait ResourceHandler: Send + Sync {
    /// The pooled resource type.
    type Resource: Send;

    /// Produces a resource whose reported capacity is exactly `capacity`.
    ///
    /// May fail; on failure the pool has already reverted any accounting it
    /// reserved for this allocation (see [`crate::Pool::acquire`]).
    fn create(&self, capacity: u64) -> Result<Self::Resource>;

    /// Releases a resource's underlying storage. Irreversible.
    fn destroy(&self, resource: Self::Resource);

    /// Returns a resource's capacity. Must be pure and stable for a given
    /// resource.
    fn capacity_of(&self, resource: &Self::Resource) -> u64;

    /// Prepares `resource` for a client requesting `size` bytes. Called
    /// exactly once per `acquire`. `after_create` is `true` when the
    /// resource was just produced by [`create`](Self::create) rather than
    /// taken from a bucket's free-list.
    fn setup(&self, resource: &mut Self::Resource, size: u64, after_create: bool);

    /// Called exactly once per `release`. `before_destroy` is `true` when
    /// the pool will call [`destroy`](Self::destroy) immediately afterwards.
    fn cleanup(&self, resource: &mut Self::Resource, before_destroy: bool);

    /// Hook: widen or clamp a requested size before bucket routing.
    ///
    /// The default is the identity function. Overrides must return a value
    /// `>= requested`; violating this is reported as
    /// [`crate::PoolError::InvalidArgument`] by the pool.
    fn adjust_allocation_size(&self, requested: u64) -> u64 {
        requested
    }

    /// Hook: should `resource` (of the given `capacity`) remain resident in
    /// its bucket given the pool-wide `pooled_bytes` (summed across every
    /// bucket) and the pool's `poolable_capacity` ceiling?
    ///
    /// The default respects the poolable ceiling:
    /// `pooled_bytes + capacity <= poolable_capacity`.
    fn may_pool(
        &self,
        resource: &Self::Resource,
        capacity: u64,
        pooled_bytes: u64,
        poolable_capacity: u64,
    ) -> bool {
        let _ = resource;
        pooled_bytes + capacity <= poolable_capacity
    }
}
