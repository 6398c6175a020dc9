//! Reactive site-build substrate.
//!
//! - [`graph`]: dependency graph with debounced, coalesced change delivery
//! - [`route`]: URL → producer registry with level precedence
//! - [`cache`]: memoized outputs with idle and memory-pressure eviction
//! - [`producer`]: assets, pages and their virtual counterparts
//! - [`build`]: phased, bounded-parallel full builds
//! - [`watch`]: filesystem events into the graph
//! - [`site`]: one site's registries wired together

pub mod logger;

pub mod build;
pub mod cache;
pub mod config;
pub mod core;
pub mod graph;
pub mod hooks;
pub mod producer;
pub mod render;
pub mod route;
pub mod site;
pub mod utils;
pub mod watch;
