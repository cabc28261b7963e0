//! Infrastructure Services
//!
//! - **config**: endpoints, storage keys and helper location
//! - **errors**: the workflow error taxonomy
//! - **host**: confirmation prompts and page reloads
//! - **session**: credential and identity from browser storage
//! - **streaming**: incremental UTF-8 decoding and event-stream framing
//! - **transport**: network seams and their reqwest implementation
//!
//! Everything here is WASM-first: async traits without Send/Sync bounds.

pub mod config;
pub mod errors;
pub mod host;
pub mod session;
pub mod streaming;
pub mod transport;
