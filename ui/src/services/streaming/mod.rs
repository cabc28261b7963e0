//! Streaming primitives shared by the push subscription and the migration body
//!
//! - **decoder**: stateful UTF-8 decoding across chunk boundaries
//! - **frames**: carry-over buffer, blank-line framing and `data:` extraction

pub mod decoder;
pub mod frames;

pub use decoder::*;
pub use frames::*;
