//! pktcount daemon library.
//!
//! Exposes the binary's modules for integration testing.
//! In production, `pktcount` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod runtime;
