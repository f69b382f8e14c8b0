//! Provisioning steps.
//!
//! One module per stage of a run. Each step takes the pieces of
//! configuration it needs plus a [`CommandRunner`](crate::command_runner::CommandRunner)
//! and reports what it did, so re-runs can skip work that is already done.

pub mod assets;
pub mod build;
pub mod packages;
pub mod service;
pub mod source;
pub mod toolchain;
