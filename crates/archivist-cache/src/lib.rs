//! Short-lived keyed cache plus durable job queue: the
//! Cache/Broker component. `RedisCacheBroker` is the production backend;
//! `InMemoryCacheBroker` doubles as the test double and the Session
//! Core's fallback mode.

pub mod broker;
pub mod error;
pub mod mem_broker;
pub mod redis_broker;

pub use broker::{keys, CacheBroker, CacheHealth, ReservedJob};
pub use error::{CacheError, Result};
pub use mem_broker::InMemoryCacheBroker;
pub use redis_broker::RedisCacheBroker;
