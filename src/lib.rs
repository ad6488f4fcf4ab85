//! Marina: an IRC client built around a sans-IO protocol engine.
//!
//! The [`app`] layer owns all client state and turns events into actions;
//! [`irc`] holds the wire format and the tokio transport that carries those
//! actions out.

pub mod app;
pub mod config;
pub mod irc;
pub mod logging;
