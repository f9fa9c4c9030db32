//! Phase tracking and checkpoint recovery for long-running, multi-phase work
//! items.
//!
//! Each item moves through a fixed sequence of phases (research, tests,
//! execution, report) carried out by external processes that may die at any
//! point. The crate decides, from durable evidence alone, how far an item has
//! got and whether an interrupted run can resume. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (phase order, evidence priority,
//!   the checkpoint record and its serialization contract). No I/O.
//! - **[`io`]**: Side-effecting operations (evidence gathering, sidecar
//!   persistence, config).
//!
//! [`manager`] coordinates core logic with I/O and is what callers and the
//! `waypoint` CLI use.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod manager;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
