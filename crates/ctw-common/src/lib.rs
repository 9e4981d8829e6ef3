//! Context-tree weighting common types and errors.
//!
//! This crate provides foundational types shared across the ctw crates:
//! - The `Bit` alphabet and bit-string parsing/formatting
//! - Byte <-> bit conversion (MSB first)
//! - Common error types with stable codes

pub mod bits;
pub mod error;

pub use bits::{format_bits, parse_bits, to_bits, to_bytes, Bit};
pub use error::{Error, ErrorCategory, Result};
