//! actorlens actor state aggregator.
//!
//! Subscribes to the actor channel, folds partial actor updates into an
//! in-memory view, and serves snapshot queries over HTTP. The crate ships the
//! `actor-aggregator` binary; the library surface exists for integration
//! testing and reuse.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod state;
pub mod subscriber;
pub mod view;
