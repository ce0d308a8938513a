pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheKey, Cacheable, EntityKind};
pub use store::{Cacher, DiskCache, MemoryCache};
