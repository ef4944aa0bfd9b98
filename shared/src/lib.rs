//! Shared types and utilities for calltap
//!
//! This crate contains the event model, the wire protocol spoken between a
//! traced process and its observer, and the line-oriented trace file format
//! consumed by downstream tooling.

pub mod protocol;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use protocol::wire::{decode, encode, DecodeError, EncodeError, Message, MessageKind};
pub use types::{calltree::*, events::*, trace::*};
