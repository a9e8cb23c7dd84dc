//! Tracing setup for binaries and tests.

pub mod setup;

pub use setup::init_tracing;
