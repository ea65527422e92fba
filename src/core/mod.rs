//! Pure, deterministic loop logic. No I/O.

pub mod classify;
pub mod decision;
pub mod types;
