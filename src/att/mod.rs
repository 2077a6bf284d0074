//! Implementation of the Attribute Protocol (ATT).
//!
//! ATT is a simple request/response (and, for commands, fire-and-forget) protocol carried over a
//! dedicated L2CAP channel. This module defines the wire format (`pdus`) and the attribute
//! handle/range types (`handle`) used throughout the rest of the crate.

pub mod handle;
pub mod pdus;

pub use handle::{Handle, HandleRange, RawHandleRange};
pub use pdus::{AttError, AttPdu, ByGroupAttData, ByTypeAttData, ErrorCode, Opcode};
