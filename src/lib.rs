//! Iterative, self-correcting code-synthesis loop.
//!
//! Given a natural-language task, the loop repeatedly asks a generation
//! oracle for candidate code, runs it in an isolated child process,
//! classifies failures, accumulates cross-run memory, and consults a
//! decision oracle before keeping a result. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, decision
//!   parsing, shared types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (sandboxed execution, memory
//!   persistence, oracle exchanges). Isolated to enable scripted doubles
//!   in tests.
//!
//! [`review`] coordinates core logic with I/O to drive the attempt loop;
//! [`memory`] holds the persisted data model shared by both layers.

pub mod core;
pub mod io;
pub mod logging;
pub mod memory;
pub mod review;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
