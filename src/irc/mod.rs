//! IRC protocol layer: parsing, framing, transport, and command parsing.

pub mod casemap;
pub mod commands;
pub mod framer;
pub mod manager;
pub mod message;
pub mod transport;
