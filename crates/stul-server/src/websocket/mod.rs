//! Connection handles, registries, broadcast fan-out and the per-connection
//! session loop.

pub mod broadcast;
pub mod connection;
pub mod reader;
pub mod registry;
pub mod session;
