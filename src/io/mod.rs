//! Side-effecting operations: process execution, persistence, oracle
//! exchanges. Kept behind traits where tests need scripted doubles.

pub mod config;
pub mod memory_store;
pub mod oracle;
pub mod process;
pub mod prompt;
pub mod sandbox;
pub mod stable;
