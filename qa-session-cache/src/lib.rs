//! ABOUTME: Process-local Session Cache crate
//! ABOUTME: Bounded by idle-TTL and entry count, replaceable behind a thin interface

mod cache;

pub use cache::SessionCache;
