//! # stul-core
//!
//! Shared vocabulary for the stul relay crates:
//!
//! - **Wire types**: [`Envelope`] (the tagged message every registered
//!   connection receives), [`AuthRequest`] and [`HostStatus`]
//! - **Identity**: [`ConnectionId`] and [`Role`] (host or client)
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod messages;

pub use ids::{ConnectionId, Role};
pub use messages::{AUTH_FAILED_NOTICE, AuthRequest, Envelope, HostStatus};
