//! Client code for citecache.
//!
//! This crate provides the HTTP-backed remote tier and the wiring that turns
//! an `AppConfig` into a ready tier chain, shared by the CLI and embedders.

pub mod remote;
pub mod stack;

pub use remote::{RemoteConfig, RemoteFailureState, RemoteStaticTier, RetryPolicy};
pub use stack::CacheStack;
