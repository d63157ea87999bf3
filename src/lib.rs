// src/lib.rs
//! # A bounded, size-classed resource pool
//!
//! A generic object pool for fixed-capacity resources (byte buffers, off-heap
//! allocations, anything a [`ResourceHandler`] knows how to create and
//! destroy) that enforces a hard ceiling on total outstanding capacity and
//! buckets idle resources by size class so differently sized requests don't
//! thrash each other's free-lists.
//!
//! Features:
//! - A pluggable [`ResourceHandler`] trait as the pool's sole extension point
//! - Composable [`BucketSizer`] strategies (`linear`, `exponential`, with
//!   minimum-capacity and alignment decorators)
//! - FIFO-fair blocking `acquire` with optional timeouts and cooperative
//!   cancellation via [`CancelToken`]
//! - A bounded `poolable_capacity` ceiling independent of `total_capacity`,
//!   with least-recently-freed reclamation when the pool needs to shrink

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod error;
pub mod handler;
pub mod pool;
pub mod sizer;
pub mod wait;

pub use error::{PoolError, Result};
pub use handler::ResourceHandler;
pub use pool::{CancelToken, Pool, PoolConfig, PoolStats, PooledResource, WideningStrategy};
pub use sizer::{exponential, linear, BucketSizer, BucketSizerExt, Exponential, Linear};

/// Commonly used imports.
pub mod prelude {
    pub use crate::error::{PoolError, Result};
    pub use crate::handler::ResourceHandler;
    pub use crate::pool::{
        CancelToken, Pool, PoolConfig, PoolStats, PooledResource, WideningStrategy,
    };
    pub use crate::sizer::{exponential, linear, BucketSizer, BucketSizerExt};
    pub use crate::wait::{Bounded, Unlimited, WaitPolicy};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    struct VecHandler;

    impl ResourceHandler for VecHandler {
        type Resource = Vec<u8>;

        fn create(&self, capacity: u64) -> Result<Vec<u8>> {
            Ok(vec![0u8; capacity as usize])
        }

        fn destroy(&self, _resource: Vec<u8>) {}

        fn capacity_of(&self, resource: &Vec<u8>) -> u64 {
            resource.len() as u64
        }

        fn setup(&self, _resource: &mut Vec<u8>, _size: u64, _after_create: bool) {}
        fn cleanup(&self, _resource: &mut Vec<u8>, _before_destroy: bool) {}
    }

    #[test]
    fn basic_acquire_release_roundtrip() {
        let pool = Pool::new(VecHandler, PoolConfig::new(4096).unwrap()).unwrap();
        let mut buf = pool.acquire(128).unwrap();
        buf[0] = 0xFF;
        assert!(buf.len() >= 128);
        drop(buf);
        assert_eq!(pool.available_capacity(), pool.total_capacity());
    }

    #[test]
    fn acquire_timeout_on_exhausted_pool() {
        let pool = Pool::new(
            VecHandler,
            PoolConfig::new(1024).unwrap().with_bucket_sizer(linear(1024).unwrap()),
        )
        .unwrap();
        let _held = pool.acquire(1024).unwrap();
        let err = pool
            .acquire_timeout(1024, std::time::Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout));
    }

    #[test]
    fn stats_reflect_outstanding_allocation() {
        let pool = Pool::new(VecHandler, PoolConfig::new(4096).unwrap()).unwrap();
        let buf = pool.acquire(512).unwrap();
        let stats = pool.stats();
        assert!(stats.in_use_capacity() > 0);
        drop(buf);
        let stats = pool.stats();
        assert_eq!(stats.in_use_capacity(), 0);
    }
}
