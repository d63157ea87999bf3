// src/bucket.rs
//! A single size class: a free-list of idle resources that all share one
//! canonical capacity.

use crate::error::{PoolError, Result};
use crate::handler::ResourceHandler;

/// Free-list of idle resources sharing one canonical `entry_capacity`.
///
/// All mutation happens under the pool's lock (see [`crate::Pool`]); this
/// type has no internal synchronization of its own.
pub(crate) struct Bucket<R> {
    pub(crate) entry_capacity: u64,
    free_list: Vec<R>,
}

impl<R> Bucket<R> {
    pub(crate) fn new(entry_capacity: u64) -> Self {
        Self {
            entry_capacity,
            free_list: Vec::new(),
        }
    }

    /// Bytes this bucket currently contributes to the pool's `pooled_bytes`.
    pub(crate) fn pooled_bytes(&self) -> u64 {
        self.free_list.len() as u64 * self.entry_capacity
    }

    pub(crate) fn idle_len(&self) -> usize {
        self.free_list.len()
    }

    /// Acquires a resource for a client requesting `requested_size` bytes.
    ///
    /// Pops the most recently released resource (LIFO, for cache warmth).
    /// If the free-list is empty and `may_create`, asks `handler` to
    /// allocate a fresh one at `entry_capacity`. Returns `Ok(None)` when the
    /// free-list is empty and `may_create` is `false`.
    pub(crate) fn acquire<H>(
        &mut self,
        requested_size: u64,
        may_create: bool,
        handler: &H,
    ) -> Result<Option<R>>
    where
        H: ResourceHandler<Resource = R>,
    {
        if requested_size > self.entry_capacity {
            return Err(PoolError::invalid_argument(format!(
                "requested size {requested_size} exceeds bucket capacity {}",
                self.entry_capacity
            )));
        }

        if let Some(mut resource) = self.free_list.pop() {
            handler.setup(&mut resource, requested_size, false);
            return Ok(Some(resource));
        }

        if !may_create {
            return Ok(None);
        }

        let mut resource = handler.create(self.entry_capacity)?;
        handler.setup(&mut resource, requested_size, true);
        Ok(Some(resource))
    }

    /// Releases `resource` back to this bucket. If `may_pool` is `false`
    /// the resource is cleaned up and destroyed instead. Returns whether
    /// the resource ended up pooled.
    pub(crate) fn release<H>(&mut self, mut resource: R, may_pool: bool, handler: &H) -> bool
    where
        H: ResourceHandler<Resource = R>,
    {
        if !may_pool {
            handler.cleanup(&mut resource, true);
            handler.destroy(resource);
            return false;
        }

        handler.cleanup(&mut resource, false);
        self.free_list.push(resource);
        true
    }

    /// Destroys idle entries until at least `min_bytes_to_release` bytes
    /// have been released (or the free-list is exhausted). Returns the
    /// bytes actually released.
    ///
    /// Bytes are removed from the free-list (and thus from the caller's
    /// view of `pooled_bytes`, which is derived from `free_list.len()`)
    /// before `handler.destroy` runs, so a panic inside `destroy` cannot
    /// leave the accounting in a state that double-counts the entry.
    pub(crate) fn clear<H>(&mut self, min_bytes_to_release: u64, handler: &H) -> u64
    where
        H: ResourceHandler<Resource = R>,
    {
        let mut released = 0u64;
        while released < min_bytes_to_release {
            let Some(mut resource) = self.free_list.pop() else {
                break;
            };
            released += self.entry_capacity;
            handler.cleanup(&mut resource, true);
            handler.destroy(resource);
        }
        released
    }
}
