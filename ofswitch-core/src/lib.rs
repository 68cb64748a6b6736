//! ofswitch core library
//!
//! This crate provides the error taxonomy and the small value types shared by
//! the packet codec crate (`ofswitch-packet`) and the forwarding information
//! base crate (`ofswitch-fib`).

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
