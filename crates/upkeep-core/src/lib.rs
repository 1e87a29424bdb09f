//! Core types and trait definitions for the Upkeep maintenance tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod error;
pub mod log;
pub mod machine;
pub mod remote;
pub mod schedule;
pub mod store;
pub mod task;

pub use error::{Error, Result};
pub use store::RecordStore;
