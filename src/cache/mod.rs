//! Offline resource delivery.
//!
//! This module intercepts resource requests and answers them from two
//! versioned cache partitions or the network:
//! - A static partition filled from a fixed precache manifest at install
//! - A dynamic partition filled opportunistically at runtime
//! - Per-route strategies (shell-first navigations, immutable build assets,
//!   revalidated same-origin resources, soft-failing fonts and images)
//! - Pruning of caches left behind by earlier versions on activation

mod controller;
mod http;
mod naming;
mod network;
mod policy;
mod storage;
mod traits;

#[cfg(test)]
mod testing;

pub use controller::{
  ControlMessage, ControllerOptions, Outcome, ResourceCache, DEFAULT_PRECACHE, DEFAULT_SHELL,
};
pub use http::{Destination, Request};
pub use naming::Ownership;
pub use network::HttpFetcher;
pub use policy::{DEFAULT_BUILD_PREFIX, DEFAULT_CACHEABLE_EXTENSIONS, DEFAULT_FONT_HOSTS};
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::Fetcher;
