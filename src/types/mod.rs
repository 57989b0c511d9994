//! Core types for Parley.

pub mod context;
pub mod message;
pub mod usage;

pub use context::*;
pub use message::*;
pub use usage::*;
