//! The Session & Authentication Core: an encrypted,
//! TTL-managed session store that degrades to an in-memory per-process
//! fallback when the Cache/Broker is unreachable, swapping atomically on
//! health-check transition.

pub mod backend;
pub mod core;
pub mod crypto;
pub mod error;

pub use backend::{InMemorySessionBackend, RedisSessionBackend, SessionBackend};
pub use core::{SessionCore, SessionHealth};
pub use crypto::{generate_session_id, SessionCipher};
pub use error::{Result, SessionError};
