//! Read-through cache for the index service accessors.

mod cache_traits;
mod memory_cache;

pub use cache_traits::{CacheKey, IndexCacheTrait};
pub use memory_cache::{MemoryCache, NoopCache};
