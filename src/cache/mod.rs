//! Request caching: language-aware keys plus the shared cache client.

pub mod client;
pub mod keys;
mod lock;

pub use client::{CacheClient, CachePolicy, FetchError, global};
pub use keys::{CacheKey, DEFAULT_LANGUAGE, KeySegment, compose_key, language_aware_key};
