//! Memoization primitives with explicit invalidation.
//!
//! Nothing here propagates invalidation on its own: the owner of a cache
//! invalidates it when an input it was computed from changes. All types are
//! single-threaded (`!Sync`).

pub mod cached;
pub mod keyed;

pub use cached::{Cached, CachedVector};
pub use keyed::{KeyedCache, LruCache};
