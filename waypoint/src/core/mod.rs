//! Deterministic, pure logic for phase tracking.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod checkpoint;
pub mod invariants;
pub mod outcome;
pub mod phase;
