//! `vendorsync` - import vendor source drops into a version-controlled workspace.
//!
//! A drop is described by raw diff lines between the previous and the new
//! source snapshot. They are [classified](classify) into typed changes,
//! reconciled against the destination workspace into [jobs](job), validated
//! and executed batch by batch through a [`vcs::VersionControl`] client.

pub mod classify;
pub mod cli;
pub mod config;
pub mod diff;
pub mod engine;
pub mod estimate;
pub mod events;
pub mod exit_codes;
pub mod fsops;
pub mod job;
pub mod logging;
pub mod model;
pub mod path;
pub mod policy;
pub mod progress;
pub mod reporter;
pub mod resolve;
pub mod tree;
pub mod validate;
pub mod vcs;
