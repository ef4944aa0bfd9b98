//! Wire protocol definitions
//!
//! This module defines the framing-independent message encoding used between
//! the publisher embedded in a traced process and its observer process.

pub mod wire;
