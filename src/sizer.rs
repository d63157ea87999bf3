// src/sizer.rs
//! Bucket sizers: pure, stateless mappings between requested sizes and the
//! canonical capacities of the size classes ("buckets") a pool routes
//! resources into.
//!
//! Two primitive strategies ([`Linear`], [`Exponential`]) and two decorators
//! ([`WithMinCapacity`], [`WithAlignment`]) that compose over any
//! [`BucketSizer`].

use crate::error::{PoolError, Result};

/// Maps a requested size to a bucket index and an index back to the
/// canonical capacity of that bucket.
///
/// Implementations must be pure and referentially transparent, and must
/// satisfy, for all `s`:
///
/// - `index_to_capacity(size_to_index(s)) >= s`
/// - monotonicity: `s1 <= s2 => size_to_index(s1) <= size_to_index(s2)`, and
///   `i1 <= i2 => index_to_capacity(i1) <= index_to_capacity(i2)`.
pub trait BucketSizer: Send + Sync {
    /// Maps a requested size to the index of the bucket that should serve it.
    fn size_to_index(&self, size: u64) -> Result<u64>;

    /// Maps a bucket index to its canonical capacity.
    fn index_to_capacity(&self, index: u64) -> Result<u64>;
}

/// Linear bucket sizer: bucket capacities are multiples of `m`.
///
/// `size_to_index(s) = ceil(s / m)`, `index_to_capacity(i) = i * m`.
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    multiple: u64,
}

impl Linear {
    /// Creates a linear sizer with the given multiple. `multiple` must be `> 0`.
    pub fn new(multiple: u64) -> Result<Self> {
        if multiple == 0 {
            return Err(PoolError::invalid_argument(
                "linear bucket sizer multiple must be > 0",
            ));
        }
        Ok(Self { multiple })
    }
}

impl BucketSizer for Linear {
    fn size_to_index(&self, size: u64) -> Result<u64> {
        Ok(size.div_ceil(self.multiple))
    }

    fn index_to_capacity(&self, index: u64) -> Result<u64> {
        index
            .checked_mul(self.multiple)
            .ok_or_else(|| PoolError::invalid_argument("bucket capacity overflow"))
    }
}

/// Exponential bucket sizer: bucket capacities grow as powers of `factor`.
///
/// `size_to_index(s) = ceil(log_factor(max(s, 1)))`,
/// `index_to_capacity(i) = floor(factor ^ i)`. Bucket 0 therefore has
/// capacity 1; compose with [`BucketSizerExt::with_min_capacity`] to raise it.
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    factor: f64,
    ln_factor: f64,
}

impl Exponential {
    /// Creates an exponential sizer with the given growth factor. `factor`
    /// must be a real number `> 1.0`.
    pub fn new(factor: f64) -> Result<Self> {
        if !(factor > 1.0) {
            return Err(PoolError::invalid_argument(
                "exponential bucket sizer factor must be > 1.0",
            ));
        }
        Ok(Self {
            factor,
            ln_factor: factor.ln(),
        })
    }
}

impl BucketSizer for Exponential {
    fn size_to_index(&self, size: u64) -> Result<u64> {
        let s = size.max(1) as f64;
        let index = (s.ln() / self.ln_factor).ceil();
        Ok(index.max(0.0) as u64)
    }

    fn index_to_capacity(&self, index: u64) -> Result<u64> {
        let capacity = self.factor.powi(
            i32::try_from(index)
                .map_err(|_| PoolError::invalid_argument("bucket index too large"))?,
        );
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(PoolError::invalid_argument("bucket capacity overflowed"));
        }
        Ok(capacity.floor() as u64)
    }
}

/// Decorator: shifts a base sizer's index origin so that bucket 0 has
/// capacity `>= min_capacity`.
#[derive(Clone)]
pub struct WithMinCapacity<S> {
    base: S,
    min_capacity: u64,
    origin: u64,
}

impl<S: BucketSizer> WithMinCapacity<S> {
    /// Wraps `base` so that bucket 0 has capacity `>= min_capacity`.
    /// `min_capacity` must be `> 0`.
    pub fn new(base: S, min_capacity: u64) -> Result<Self> {
        if min_capacity == 0 {
            return Err(PoolError::invalid_argument(
                "with_min_capacity requires min_capacity > 0",
            ));
        }
        let origin = base.size_to_index(min_capacity)?;
        Ok(Self {
            base,
            min_capacity,
            origin,
        })
    }
}

impl<S: BucketSizer> BucketSizer for WithMinCapacity<S> {
    fn size_to_index(&self, size: u64) -> Result<u64> {
        let floored = size.max(self.min_capacity);
        Ok(self.base.size_to_index(floored)? - self.origin)
    }

    fn index_to_capacity(&self, index: u64) -> Result<u64> {
        self.base.index_to_capacity(index + self.origin)
    }
}

/// Decorator: rounds a base sizer's `index_to_capacity` up to the next
/// multiple of `alignment`. Identity on indexing.
#[derive(Clone)]
pub struct WithAlignment<S> {
    base: S,
    alignment: u64,
}

impl<S: BucketSizer> WithAlignment<S> {
    /// Wraps `base` so every bucket capacity is a multiple of `alignment`.
    /// `alignment` must be `> 0`.
    pub fn new(base: S, alignment: u64) -> Result<Self> {
        if alignment == 0 {
            return Err(PoolError::invalid_argument(
                "with_alignment requires alignment > 0",
            ));
        }
        Ok(Self { base, alignment })
    }
}

impl<S: BucketSizer> BucketSizer for WithAlignment<S> {
    fn size_to_index(&self, size: u64) -> Result<u64> {
        self.base.size_to_index(size)
    }

    fn index_to_capacity(&self, index: u64) -> Result<u64> {
        let raw = self.base.index_to_capacity(index)?;
        Ok(raw.div_ceil(self.alignment) * self.alignment)
    }
}

/// Extension methods for composing decorators onto any [`BucketSizer`].
pub trait BucketSizerExt: BucketSizer + Sized {
    /// See [`WithMinCapacity`].
    fn with_min_capacity(self, min_capacity: u64) -> Result<WithMinCapacity<Self>> {
        WithMinCapacity::new(self, min_capacity)
    }

    /// See [`WithAlignment`].
    fn with_alignment(self, alignment: u64) -> Result<WithAlignment<Self>> {
        WithAlignment::new(self, alignment)
    }
}

impl<T: BucketSizer + Sized> BucketSizerExt for T {}

/// Shorthand constructor for [`Linear::new`].
pub fn linear(multiple: u64) -> Result<Linear> {
    Linear::new(multiple)
}

/// Shorthand constructor for [`Exponential::new`].
pub fn exponential(factor: f64) -> Result<Exponential> {
    Exponential::new(factor)
}
