//! # 缓存模块
//!
//! 会话读路径的加速层：内存（moka）、Redis 或空实现

pub mod abstract_cache;
pub mod client;
pub mod keys;

pub use abstract_cache::{CacheProvider, CacheProviderExt, MemoryCache, NoopCache, build_provider};
pub use client::RedisCache;
pub use keys::CacheKey;
