//! # IRCK Common Library
//!
//! Shared code for the irck crates including:
//! - Pulse, code, and library data model
//! - Event types (IrEvent enum) and the EventBus
//! - Common error types
//! - Timestamp utilities

pub mod code;
pub mod error;
pub mod events;
pub mod time;

pub use code::{Code, Library, Pulse, PulseKind};
pub use error::{Error, Result};
