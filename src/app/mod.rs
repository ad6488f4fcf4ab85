//! Core application logic: session state, protocol routing, lifecycle
//! handling, and the actions handed back to the event loop.

pub mod action;
pub mod event;
pub mod handler;
pub mod intent;
pub mod router;
pub mod state;
