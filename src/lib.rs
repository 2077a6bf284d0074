//! A server-side implementation of the Bluetooth Attribute Protocol (ATT) and the Generic
//! Attribute Profile (GATT) built on top of it.
//!
//! This crate implements the attribute database, the four ATT lookup requests, the write path,
//! MTU negotiation and the permission/security gate a GATT server needs; it does not implement a
//! link layer, L2CAP fragmentation or a radio driver. [`crate::socket::Socket`] is the seam
//! between this crate and whatever carries ATT PDUs over the air.
//!
//! The pieces, bottom-up:
//!
//! - [`bytes`] — zero-copy `ToBytes`/`FromBytes` codec traits.
//! - [`uuid`] — 16- and 128-bit Bluetooth UUIDs.
//! - [`att`] — the ATT wire format: opcodes, PDUs, handles, error codes.
//! - [`gatt`] — the GATT data model (services, characteristics, descriptors) and the
//!   [`gatt::database::Database`] that flattens it into a handle-addressed attribute list.
//! - [`security`] — the permission/security-level gate.
//! - [`socket`] — the transport seam and an in-memory [`socket::LoopbackSocket`] for tests.
//! - [`connection`] — [`connection::AttConnection`], owning the socket, negotiated MTU and
//!   outbound queue, and the [`connection::Handler`] trait request/command handlers implement.
//! - [`server`] — [`server::GattServer`], the `Handler` that binds the database to the four ATT
//!   lookups and the write path.

#[macro_use]
mod log;
#[macro_use]
mod utils;

pub mod att;
pub mod bytes;
pub mod connection;
mod error;
pub mod gatt;
pub mod security;
pub mod server;
pub mod socket;
pub mod uuid;

pub use error::{ConnectionError, Error};
