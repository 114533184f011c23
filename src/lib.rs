//! Burrow - a caching DNS resolver stack.
//!
//! This crate provides a composable resolver abstraction, an RFC-conformant
//! response cache, a packet-level adapter, and UDP/TCP server drivers,
//! exposed as a library for embedding and testing. The `burrow` binary wires
//! them into a small forwarding DNS proxy.

pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
