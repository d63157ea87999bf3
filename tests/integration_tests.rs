//! End-to-end scenarios against a simple in-memory resource handler.

use poolcore::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

/// A resource handler backed by plain `Vec<u8>` buffers, counting creates
/// and destroys so tests can assert on allocation traffic.
struct VecHandler {
    creates: AtomicU64,
    destroys: AtomicU64,
}

impl VecHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            creates: AtomicU64::new(0),
            destroys: AtomicU64::new(0),
        })
    }
}

impl ResourceHandler for Arc<VecHandler> {
    type Resource = Vec<u8>;

    fn create(&self, capacity: u64) -> Result<Vec<u8>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0u8; capacity as usize])
    }

    fn destroy(&self, _resource: Vec<u8>) {
        self.destroys.fetch_add(1, Ordering::SeqCst);
    }

    fn capacity_of(&self, resource: &Vec<u8>) -> u64 {
        resource.len() as u64
    }

    fn setup(&self, _resource: &mut Vec<u8>, _size: u64, _after_create: bool) {}
    fn cleanup(&self, _resource: &mut Vec<u8>, _before_destroy: bool) {}
}

#[test]
fn pool_reuses_released_resource_by_identity() {
    let handler = VecHandler::new();
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(4096)
            .unwrap()
            .with_bucket_sizer(linear(1024).unwrap()),
    )
    .unwrap();

    let buf = pool.acquire(1000).unwrap();
    let ptr = buf.as_ptr();
    drop(buf);

    let buf2 = pool.acquire(1000).unwrap();
    assert_eq!(buf2.as_ptr(), ptr);
    assert_eq!(handler.creates.load(Ordering::SeqCst), 1);
}

#[test]
fn exponential_sizer_routes_consistently() {
    let sizer = exponential(2.0)
        .unwrap()
        .with_alignment(64)
        .unwrap()
        .with_min_capacity(512)
        .unwrap();

    assert_eq!(
        sizer
            .index_to_capacity(sizer.size_to_index(17).unwrap())
            .unwrap(),
        512
    );
    let idx_1024 = sizer.size_to_index(1024).unwrap();
    assert_eq!(sizer.index_to_capacity(idx_1024).unwrap(), 1024);
    assert_eq!(sizer.size_to_index(513).unwrap(), idx_1024);
}

#[test]
fn pool_never_exceeds_total_capacity() {
    let handler = VecHandler::new();
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(4096)
            .unwrap()
            .with_bucket_sizer(linear(1024).unwrap()),
    )
    .unwrap();

    let mut held = Vec::new();
    for _ in 0..4 {
        held.push(pool.acquire(1024).unwrap());
    }

    assert_eq!(pool.available_capacity(), 0);
    let err = pool
        .acquire_timeout(1024, Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, PoolError::Timeout));
}

#[test]
fn timed_acquire_fails_cleanly_and_restores_accounting() {
    let handler = VecHandler::new();
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(1024)
            .unwrap()
            .with_bucket_sizer(linear(1024).unwrap()),
    )
    .unwrap();

    let held = pool.acquire(1024).unwrap();
    let before = pool.available_capacity();
    let err = pool
        .acquire_timeout(1024, Duration::from_millis(25))
        .unwrap_err();
    assert!(matches!(err, PoolError::Timeout));
    assert_eq!(pool.available_capacity(), before);
    drop(held);
    assert_eq!(pool.available_capacity(), pool.total_capacity());
}

#[test]
fn blocked_acquire_is_released_fifo_across_threads() {
    let handler = VecHandler::new();
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(1024)
            .unwrap()
            .with_bucket_sizer(linear(1024).unwrap()),
    )
    .unwrap();

    let held = pool.acquire(1024).unwrap();
    let order: Arc<std::sync::Mutex<Vec<u32>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(3));

    let pool_a = pool.clone();
    let order_a = Arc::clone(&order);
    let barrier_a = Arc::clone(&barrier);
    let a = thread::spawn(move || {
        barrier_a.wait();
        let _r = pool_a.acquire(1024).unwrap();
        order_a.lock().unwrap().push(1);
    });

    thread::sleep(Duration::from_millis(25));

    let pool_b = pool.clone();
    let order_b = Arc::clone(&order);
    let barrier_b = Arc::clone(&barrier);
    let b = thread::spawn(move || {
        barrier_b.wait();
        let _r = pool_b.acquire(1024).unwrap();
        order_b.lock().unwrap().push(2);
    });

    barrier.wait();
    thread::sleep(Duration::from_millis(15));
    drop(held);

    a.join().unwrap();
    b.join().unwrap();
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
}

#[test]
fn cancel_token_frees_a_blocked_acquire_without_leaking_capacity() {
    let handler = VecHandler::new();
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(1024)
            .unwrap()
            .with_bucket_sizer(linear(1024).unwrap()),
    )
    .unwrap();

    let held = pool.acquire(1024).unwrap();
    let token = pool.cancel_token();
    let token_for_waiter = token.clone();
    let pool_for_waiter = pool.clone();

    let waiter = thread::spawn(move || {
        let mut policy = Unlimited::new();
        pool_for_waiter.acquire_with(1024, &mut policy, Some(&token_for_waiter))
    });

    thread::sleep(Duration::from_millis(25));
    token.cancel();
    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(PoolError::Interrupted)));

    drop(held);
    assert_eq!(pool.available_capacity(), pool.total_capacity());
}

#[test]
fn closing_a_pool_destroys_idle_resources_and_rejects_new_work() {
    let handler = VecHandler::new();
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(2048)
            .unwrap()
            .with_bucket_sizer(linear(1024).unwrap()),
    )
    .unwrap();

    let buf = pool.acquire(1024).unwrap();
    drop(buf);
    assert_eq!(handler.destroys.load(Ordering::SeqCst), 0);

    pool.close();
    assert_eq!(handler.destroys.load(Ordering::SeqCst), 1);

    let err = pool.acquire(512).unwrap_err();
    assert!(matches!(err, PoolError::IllegalState(_)));
}

/// Records the capacity of every resource it is asked to destroy, in order,
/// so tests can observe which bucket a reclaim picked.
struct RecordingHandler {
    destroyed: Mutex<Vec<u64>>,
}

impl ResourceHandler for Arc<RecordingHandler> {
    type Resource = Vec<u8>;

    fn create(&self, capacity: u64) -> Result<Vec<u8>> {
        Ok(vec![0u8; capacity as usize])
    }

    fn destroy(&self, resource: Vec<u8>) {
        self.destroyed.lock().unwrap().push(resource.len() as u64);
    }

    fn capacity_of(&self, resource: &Vec<u8>) -> u64 {
        resource.len() as u64
    }

    fn setup(&self, _resource: &mut Vec<u8>, _size: u64, _after_create: bool) {}
    fn cleanup(&self, _resource: &mut Vec<u8>, _before_destroy: bool) {}
}

#[test]
fn reclaim_evicts_the_largest_capacity_bucket_first() {
    let handler = Arc::new(RecordingHandler {
        destroyed: Mutex::new(Vec::new()),
    });
    let pool = Pool::new(
        Arc::clone(&handler),
        PoolConfig::new(2048)
            .unwrap()
            .with_bucket_sizer(linear(512).unwrap()),
    )
    .unwrap();

    // Populate two idle buckets: 512 bytes and 1536 bytes.
    drop(pool.acquire(512).unwrap());
    drop(pool.acquire(1536).unwrap());
    assert_eq!(pool.available_capacity(), 2048);
    assert!(handler.destroyed.lock().unwrap().is_empty());

    // A fresh 2048-byte request has no matching free-list entry and no
    // spare not-pooled capacity, forcing a reclaim across both buckets.
    let resource = pool.acquire(2048).unwrap();
    assert_eq!(resource.len(), 2048);

    assert_eq!(*handler.destroyed.lock().unwrap(), vec![1536, 512]);
}
