// src/pool/core.rs
//! The pool core: capacity accounting, size-class routing, the blocking
//! acquire protocol, release, reclaim, and close.

use super::config::{PoolConfig, WideningStrategy};
use super::stats::PoolStats;
use crate::bucket::Bucket;
use crate::error::{PoolError, Result};
use crate::handler::ResourceHandler;
use crate::sizer::BucketSizer;
use crate::wait::{Bounded, Unlimited, WaitPolicy};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

struct PoolState<R> {
    buckets: Vec<Option<Bucket<R>>>,
    not_pooled_capacity: u64,
    waiters: VecDeque<u64>,
    next_ticket: u64,
    closed: bool,
}

impl<R> PoolState<R> {
    fn pooled_bytes(&self) -> u64 {
        self.buckets
            .iter()
            .flatten()
            .map(Bucket::pooled_bytes)
            .sum()
    }

    fn ensure_bucket(&mut self, index: u64, sizer: &dyn BucketSizer) -> Result<()> {
        let index = usize::try_from(index)
            .map_err(|_| PoolError::invalid_argument("bucket index too large"))?;
        if self.buckets.len() <= index {
            self.buckets.resize_with(index + 1, || None);
        }
        if self.buckets[index].is_none() {
            let capacity = sizer.index_to_capacity(index as u64)?;
            self.buckets[index] = Some(Bucket::new(capacity));
        }
        Ok(())
    }

    /// Reclaims pooled bytes into `not_pooled_capacity`, largest-capacity
    /// bucket first, stopping once `not_pooled_capacity` has grown by at
    /// least `bytes`. Bucket indices are iterated highest-first, which is
    /// equivalent to largest-capacity-first because `index_to_capacity` is
    /// monotone non-decreasing in the index.
    fn reclaim<H>(&mut self, bytes: u64, handler: &H)
    where
        H: ResourceHandler<Resource = R>,
    {
        let target = self.not_pooled_capacity + bytes;
        for bucket in self.buckets.iter_mut().rev().flatten() {
            if self.not_pooled_capacity >= target {
                break;
            }
            let shortfall = target - self.not_pooled_capacity;
            let released = bucket.clear(shortfall, handler);
            self.not_pooled_capacity += released;
        }
    }
}

struct PoolShared<H: ResourceHandler> {
    handler: H,
    total_capacity: u64,
    poolable_capacity: u64,
    bucket_sizer: Arc<dyn BucketSizer>,
    widening_strategy: WideningStrategy,
    state: Mutex<PoolState<H::Resource>>,
    condvar: Condvar,
}

/// A bounded, size-classed object pool for fixed-capacity resources.
///
/// Cheap to clone: internally reference-counted, so a single `Pool` handle
/// can be shared across threads directly (no need to wrap it in `Arc`
/// yourself).
///
/// # Examples
///
/// ```
/// use poolcore::prelude::*;
///
/// struct VecHandler;
///
/// impl ResourceHandler for VecHandler {
///     type Resource = Vec<u8>;
///     fn create(&self, capacity: u64) -> Result<Vec<u8>> {
///         Ok(vec![0u8; capacity as usize])
///     }
///     fn destroy(&self, _resource: Vec<u8>) {}
///     fn capacity_of(&self, resource: &Vec<u8>) -> u64 {
///         resource.len() as u64
///     }
///     fn setup(&self, _resource: &mut Vec<u8>, _size: u64, _after_create: bool) {}
///     fn cleanup(&self, _resource: &mut Vec<u8>, _before_destroy: bool) {}
/// }
///
/// let pool = Pool::new(VecHandler, PoolConfig::new(1024).unwrap()).unwrap();
/// let buf = pool.acquire(64).unwrap();
/// assert!(buf.len() >= 64);
/// ```
pub struct Pool<H: ResourceHandler> {
    shared: Arc<PoolShared<H>>,
}

impl<H: ResourceHandler> Clone for Pool<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: ResourceHandler + 'static> Pool<H> {
    /// Builds a pool from a handler and a validated [`PoolConfig`].
    pub fn new(handler: H, config: PoolConfig) -> Result<Self> {
        let (total_capacity, poolable_capacity, bucket_sizer, widening_strategy) =
            config.resolve()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                handler,
                total_capacity,
                poolable_capacity,
                bucket_sizer,
                widening_strategy,
                state: Mutex::new(PoolState {
                    buckets: Vec::new(),
                    not_pooled_capacity: total_capacity,
                    waiters: VecDeque::new(),
                    next_ticket: 0,
                    closed: false,
                }),
                condvar: Condvar::new(),
            }),
        })
    }

    /// Acquires a resource of at least `requested` bytes, waiting forever
    /// if none is immediately available.
    pub fn acquire(&self, requested: u64) -> Result<PooledResource<H>> {
        self.acquire_with(requested, &mut Unlimited::new(), None)
    }

    /// Acquires a resource of at least `requested` bytes, failing with
    /// [`PoolError::Timeout`] if `timeout` elapses first.
    pub fn acquire_timeout(&self, requested: u64, timeout: Duration) -> Result<PooledResource<H>> {
        self.acquire_with(requested, &mut Bounded::new(timeout), None)
    }

    /// Issues a [`CancelToken`] that, once cancelled, causes any acquire
    /// that was passed it to fail with [`PoolError::Interrupted`] at its
    /// next wake-up. This is the cooperative analogue of external thread
    /// interruption described in the concurrency model.
    pub fn cancel_token(&self) -> CancelToken<H> {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            shared: Arc::clone(&self.shared),
        }
    }

    /// General entry point: acquires a resource of at least `requested`
    /// bytes under a caller-supplied [`WaitPolicy`], optionally observing a
    /// [`CancelToken`].
    pub fn acquire_with<W: WaitPolicy>(
        &self,
        requested: u64,
        policy: &mut W,
        cancel: Option<&CancelToken<H>>,
    ) -> Result<PooledResource<H>> {
        if requested > self.shared.total_capacity {
            return Err(PoolError::invalid_argument(format!(
                "requested size {requested} exceeds total capacity {}",
                self.shared.total_capacity
            )));
        }

        let size = self.shared.handler.adjust_allocation_size(requested);
        if size < requested {
            return Err(PoolError::invalid_argument(
                "adjust_allocation_size returned a value smaller than its input",
            ));
        }
        if size > self.shared.total_capacity {
            return Err(PoolError::invalid_argument(format!(
                "adjusted size {size} exceeds total capacity {}",
                self.shared.total_capacity
            )));
        }

        let mut state = self.shared.state.lock().unwrap();
        if state.closed {
            return Err(PoolError::illegal_state("pool is closed"));
        }

        let index = self.shared.bucket_sizer.size_to_index(size)?;
        state.ensure_bucket(index, self.shared.bucket_sizer.as_ref())?;
        let cap = state.buckets[index as usize].as_ref().unwrap().entry_capacity;
        if size > cap {
            return Err(PoolError::invalid_argument(
                "bucket capacity exceeded by routed size",
            ));
        }

        // Fast path: a free-list hit needs no accounting change at all.
        if let Some(resource) = state.buckets[index as usize]
            .as_mut()
            .unwrap()
            .acquire(requested, false, &self.shared.handler)?
        {
            self.signal_if_capacity_remains(&state);
            return Ok(PooledResource::new(self.clone(), resource));
        }

        let available = state.not_pooled_capacity + state.pooled_bytes();
        let reserve_size = match self.shared.widening_strategy {
            WideningStrategy::UseAvailableCapacity if available >= cap => cap,
            WideningStrategy::EnforcePoolableCapacity => cap,
            _ => size,
        };

        if available >= reserve_size {
            state.reclaim(reserve_size.saturating_sub(state.not_pooled_capacity), &self.shared.handler);
            state.not_pooled_capacity -= reserve_size;
            self.signal_if_capacity_remains(&state);
            drop(state);
            return self.create_outside_lock(reserve_size, requested, reserve_size);
        }

        self.acquire_blocking(index, reserve_size, requested, state, policy, cancel)
    }

    /// Runs the blocking loop described in the core acquire algorithm once
    /// an immediate reservation was not possible.
    fn acquire_blocking<W: WaitPolicy>(
        &self,
        index: u64,
        target: u64,
        original: u64,
        mut state: MutexGuard<'_, PoolState<H::Resource>>,
        policy: &mut W,
        cancel: Option<&CancelToken<H>>,
    ) -> Result<PooledResource<H>> {
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);

        let mut accumulated = 0u64;
        let mut obtained: Option<H::Resource> = None;

        let outcome = 'wait: loop {
            state = policy.await_next(&self.shared.condvar, state);

            if state.closed {
                break 'wait Err(PoolError::illegal_state(
                    "pool was closed while a waiter was blocked",
                ));
            }
            if let Some(cancel) = cancel {
                if cancel.is_cancelled() {
                    break 'wait Err(PoolError::Interrupted);
                }
            }
            if let Err(e) = policy.check_time_elapsed() {
                break 'wait Err(e);
            }

            // Only the head of the ticket queue may take capacity; other
            // waiters that were woken by the same `notify_all` go back to
            // sleep. This is what makes the ticket queue FIFO rather than
            // a bare thundering-herd retry loop.
            if state.waiters.front() != Some(&ticket) {
                continue;
            }

            if accumulated == 0 {
                match state.buckets[index as usize]
                    .as_mut()
                    .unwrap()
                    .acquire(original, false, &self.shared.handler)
                {
                    Ok(Some(resource)) => {
                        accumulated = target;
                        obtained = Some(resource);
                        break 'wait Ok(());
                    }
                    Ok(None) => {}
                    Err(e) => break 'wait Err(e),
                }
            }

            let need = target - accumulated;
            state.reclaim(need, &self.shared.handler);
            let take = need.min(state.not_pooled_capacity);
            state.not_pooled_capacity -= take;
            accumulated += take;

            if accumulated >= target {
                break 'wait Ok(());
            }
        };

        state.waiters.retain(|&t| t != ticket);

        match outcome {
            Ok(()) => {
                self.signal_if_capacity_remains(&state);
                drop(state);
                if let Some(resource) = obtained {
                    // Already set up by `Bucket::acquire` when it was taken
                    // from the free-list; setup runs exactly once per acquire.
                    Ok(PooledResource::new(self.clone(), resource))
                } else {
                    self.create_outside_lock(target, original, target)
                }
            }
            Err(e) => {
                // No leak on cancel: give back whatever capacity this
                // waiter had reserved before failing.
                state.not_pooled_capacity += accumulated;
                Err(e)
            }
        }
    }

    /// Calls `handler.create` outside the pool's lock, reverting the
    /// `reserved` bytes and force-signalling the head waiter on failure.
    fn create_outside_lock(
        &self,
        capacity: u64,
        original: u64,
        reserved: u64,
    ) -> Result<PooledResource<H>> {
        match self.shared.handler.create(capacity) {
            Ok(mut resource) => {
                self.shared.handler.setup(&mut resource, original, true);
                Ok(PooledResource::new(self.clone(), resource))
            }
            Err(e) => {
                let mut state = self.shared.state.lock().unwrap();
                state.not_pooled_capacity += reserved;
                self.force_signal(&state);
                Err(PoolError::handler_failure(e))
            }
        }
    }

    fn signal_if_capacity_remains(&self, state: &MutexGuard<'_, PoolState<H::Resource>>) {
        if state.not_pooled_capacity > 0 || state.pooled_bytes() > 0 {
            self.shared.condvar.notify_all();
        }
    }

    fn force_signal(&self, _state: &MutexGuard<'_, PoolState<H::Resource>>) {
        self.shared.condvar.notify_all();
    }

    fn release(&self, mut resource: H::Resource) -> Result<()> {
        let capacity = self.shared.handler.capacity_of(&resource);
        let mut state = self.shared.state.lock().unwrap();
        let index = self.shared.bucket_sizer.size_to_index(capacity)?;
        state.ensure_bucket(index, self.shared.bucket_sizer.as_ref())?;
        let pool_wide_pooled_bytes = state.pooled_bytes();
        let bucket = state.buckets[index as usize].as_mut().unwrap();

        let poolable = bucket.entry_capacity == capacity
            && self.shared.handler.may_pool(
                &resource,
                capacity,
                pool_wide_pooled_bytes,
                self.shared.poolable_capacity,
            );

        if poolable {
            bucket.release(resource, true, &self.shared.handler);
        } else {
            bucket.release(resource, false, &self.shared.handler);
            state.not_pooled_capacity += capacity;
        }
        self.force_signal(&state);
        Ok(())
    }

    /// Closes the pool: subsequent acquires fail with
    /// [`PoolError::IllegalState`], every blocked waiter is woken (and
    /// fails the same way), and every pooled entry is destroyed and
    /// returned to the OS via the handler. Resources already held by
    /// clients remain valid; releasing them afterwards still returns their
    /// storage through the handler (they are simply never re-pooled).
    pub fn close(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        for bucket in state.buckets.iter_mut().flatten() {
            bucket.clear(self.shared.total_capacity, &self.shared.handler);
        }
        state.buckets.clear();
        self.shared.condvar.notify_all();
    }

    /// `not_pooled_capacity + pooled_bytes`.
    pub fn available_capacity(&self) -> u64 {
        let state = self.shared.state.lock().unwrap();
        state.not_pooled_capacity + state.pooled_bytes()
    }

    /// Bytes neither held by a client nor sitting in a bucket.
    pub fn unused_capacity(&self) -> u64 {
        self.shared.state.lock().unwrap().not_pooled_capacity
    }

    /// Number of threads currently blocked in `acquire`.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().unwrap().waiters.len()
    }

    /// The pool's immutable hard capacity ceiling.
    pub fn total_capacity(&self) -> u64 {
        self.shared.total_capacity
    }

    /// The pool's immutable poolable-bytes ceiling.
    pub fn poolable_capacity(&self) -> u64 {
        self.shared.poolable_capacity
    }

    /// A consistent snapshot of all observability getters, taken under one
    /// lock acquisition.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock().unwrap();
        let pooled_bytes = state.pooled_bytes();
        PoolStats {
            available_capacity: state.not_pooled_capacity + pooled_bytes,
            unused_capacity: state.not_pooled_capacity,
            pooled_bytes,
            queued: state.waiters.len(),
            total_capacity: self.shared.total_capacity,
            poolable_capacity: self.shared.poolable_capacity,
        }
    }
}

/// A cooperative cancellation handle for a blocked `acquire`.
///
/// Cancelling also wakes the pool's condition variable, so a blocked
/// acquire observes the cancellation at its next wake-up rather than
/// waiting indefinitely for unrelated activity.
pub struct CancelToken<H: ResourceHandler> {
    flag: Arc<AtomicBool>,
    shared: Arc<PoolShared<H>>,
}

impl<H: ResourceHandler> Clone for CancelToken<H> {
    fn clone(&self) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: ResourceHandler> CancelToken<H> {
    /// Requests cancellation of whichever acquire holds this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.shared.condvar.notify_all();
    }

    /// Returns whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A resource borrowed from a [`Pool`].
///
/// Returned to the pool (or destroyed, if no longer poolable) when dropped.
pub struct PooledResource<H: ResourceHandler> {
    resource: Option<H::Resource>,
    pool: Pool<H>,
}

impl<H: ResourceHandler + 'static> PooledResource<H> {
    fn new(pool: Pool<H>, resource: H::Resource) -> Self {
        Self {
            resource: Some(resource),
            pool,
        }
    }

    /// Extracts the resource without returning it to the pool. The caller
    /// takes over its lifecycle entirely.
    pub fn leak(mut self) -> H::Resource {
        self.resource.take().unwrap()
    }
}

impl<H: ResourceHandler> Deref for PooledResource<H> {
    type Target = H::Resource;
    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().unwrap()
    }
}

impl<H: ResourceHandler> DerefMut for PooledResource<H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().unwrap()
    }
}

impl<H: ResourceHandler + 'static> Drop for PooledResource<H> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            // Accounting errors are bugs, not recoverable client-visible
            // conditions: the only way `release` can fail here is a
            // `ResourceHandler` whose `capacity_of` maps to a bucket index
            // the sizer itself rejects, which indicates the sizer/handler
            // pairing is broken.
            if let Err(err) = self.pool.release(resource) {
                panic!("pool accounting error on release: {err}");
            }
        }
    }
}
