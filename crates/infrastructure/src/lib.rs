//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_override_store;
mod in_memory_override_store;

pub use http_override_store::{HttpOverrideStore, HttpOverrideStoreConfig};
pub use in_memory_override_store::InMemoryOverrideStore;
