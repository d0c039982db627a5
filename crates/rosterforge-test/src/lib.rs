//! Shared test fixtures for RosterForge crates.
//!
//! This crate provides tree builders, canned definitions and a recording
//! observer for integration tests.
//!
//! - [`builder`] - roster/force scaffolding around a `StateTree`
//! - [`fixtures`] - canned node and constraint definitions
//! - [`observer`] - an observer that records every callback
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! rosterforge-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use rosterforge_test::{TreeBuilder, RecordingObserver};
//! use rosterforge_test::fixtures::captain;
//! ```

pub mod builder;
pub mod fixtures;
pub mod observer;

// Re-export commonly used types at crate root for convenience
pub use builder::TreeBuilder;
pub use observer::{Observed, RecordingObserver};
