//! The L2CAP transport collaborator: a byte-framed datagram socket carrying one ATT PDU per
//! read/write, plus the security level negotiated below ATT.
//!
//! Real platforms implement [`Socket`] over a Bluetooth L2CAP fixed channel (e.g. `BT_SECURITY_*`
//! via `setsockopt` as BlueZ's `l2cap` socket does); [`LoopbackSocket`] is an in-memory stand-in
//! used by this crate's own tests.

use crate::security::SecurityLevel;
use std::collections::VecDeque;
use std::io;

/// A connected ATT bearer transport: reads and writes whole PDUs, and reports the link's
/// security level.
pub trait Socket {
    /// Reads the next inbound PDU into `buf`, returning the number of bytes written.
    ///
    /// Returns `Ok(None)` if no datagram is currently available (non-blocking); returns `Err` on
    /// a fatal transport failure.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Writes one complete outbound PDU.
    fn send(&mut self, pdu: &[u8]) -> io::Result<()>;

    /// The security level currently in effect for this link.
    fn security_level(&self) -> SecurityLevel;
}

/// An in-memory [`Socket`], useful for testing a [`crate::connection::AttConnection`] without a
/// real Bluetooth controller.
///
/// `new()` creates one socket with its own inbound and outbound queues: `push_inbound` queues a
/// PDU for the next `recv`, and `pop_outbound` drains what was written via `send`. There is no
/// paired two-ends variant; a test drives the connection's peer side directly through these
/// queues instead.
#[derive(Debug, Default)]
pub struct LoopbackSocket {
    inbound: VecDeque<Vec<u8>>,
    outbound: VecDeque<Vec<u8>>,
    security_level: SecurityLevel,
}

impl LoopbackSocket {
    /// Creates an unpaired loopback socket at the given security level, useful when a test only
    /// needs to feed inbound PDUs without a peer on the other end.
    pub fn new(security_level: SecurityLevel) -> Self {
        Self {
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            security_level,
        }
    }

    /// Queues `pdu` to be returned by the next `recv` call.
    pub fn push_inbound(&mut self, pdu: Vec<u8>) {
        self.inbound.push_back(pdu);
    }

    /// Pops the oldest PDU written via `send`, if any.
    pub fn pop_outbound(&mut self) -> Option<Vec<u8>> {
        self.outbound.pop_front()
    }

    pub fn security_level_mut(&mut self) -> &mut SecurityLevel {
        &mut self.security_level
    }
}

impl Socket for LoopbackSocket {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.inbound.pop_front() {
            Some(pdu) => {
                if pdu.len() > buf.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "buffer too small for queued PDU",
                    ));
                }
                buf[..pdu.len()].copy_from_slice(&pdu);
                Ok(Some(pdu.len()))
            }
            None => Ok(None),
        }
    }

    fn send(&mut self, pdu: &[u8]) -> io::Result<()> {
        self.outbound.push_back(pdu.to_vec());
        Ok(())
    }

    fn security_level(&self) -> SecurityLevel {
        self.security_level
    }
}
