//! Trace data types

pub mod calltree;
pub mod events;
pub mod trace;
