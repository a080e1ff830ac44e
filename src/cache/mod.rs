//! Local cache of remote datasets for offline display.
//!
//! This module provides:
//! - `CacheStore`: a passive key → snapshot map persisted in local storage
//! - `CacheLayer`: a network-first read-through helper that falls back to the
//!   last good snapshot when offline or when the fetch fails

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::CacheStore;
pub use traits::{CacheResult, CacheSource, Cacheable};
