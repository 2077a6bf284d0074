//! The ATT connection: owns the socket, the negotiated MTU and the outbound PDU queue, and
//! drives the two explicit I/O entry points (`poll_read`, `poll_write`) the embedder calls each
//! tick.
//!
//! ATT framing lives here; GATT opcode semantics live in [`crate::server::GattServer`], which is
//! handed decoded PDUs through the [`Handler`] trait instead of this module matching on them
//! directly. A handler reports internal invariant violations by returning `Err`, which tears the
//! bearer down per the error-handling design in `poll_read`'s documentation below.

use crate::att::{AttPdu, ErrorCode, Handle, Opcode};
use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::error::{ConnectionError, Error};
use crate::security::SecurityLevel;
use crate::socket::Socket;
use std::collections::VecDeque;

/// BLE's default (and minimum) ATT_MTU, in effect until Exchange-MTU negotiates a larger value.
pub const ATT_DEFAULT_MTU: u16 = 23;

/// Receives ATT requests and commands the connection has decided are worth dispatching.
///
/// Implemented by [`crate::server::GattServer`]; `handle` is only ever called with one of the
/// opcodes this crate supports (Exchange-MTU, Find-Information, Find-By-Type-Value,
/// Read-By-Type, Read-By-Group-Type, Write-Request, Write-Command) — everything else is
/// rejected by [`AttConnection::poll_read`] before reaching a handler.
///
/// Returns `Err` only for an internal invariant violation that makes the bearer unsafe to keep
/// driving (e.g. a response that can't be represented in its wire format); `poll_read` propagates
/// this to the embedder and the bearer is considered dead. Ordinary protocol failures (bad
/// handle, permission denied, unsupported request) are reported to the peer as an Error-Response
/// and return `Ok(())`.
pub trait Handler {
    fn handle(&mut self, pdu: AttPdu<'_>, responder: &mut Responder<'_>) -> Result<(), ConnectionError>;
}

/// A handle to the outbound queue and negotiated MTU, passed to [`Handler::handle`] so it can
/// emit exactly the response (or error) a request requires.
pub struct Responder<'a> {
    queue: &'a mut VecDeque<Vec<u8>>,
    mtu: u16,
    request_opcode: Opcode,
    security_level: SecurityLevel,
    requested_mtu: Option<u16>,
}

impl<'a> Responder<'a> {
    /// The negotiated MTU in effect for this response.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// The opcode of the request being responded to.
    pub fn request_opcode(&self) -> Opcode {
        self.request_opcode
    }

    /// The security level of the underlying link, for the permission gate.
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Requests that the connection's negotiated MTU be updated once this request finishes
    /// processing, as Exchange-MTU handling requires. The connection applies the clamp.
    pub fn request_mtu_change(&mut self, mtu: u16) {
        self.requested_mtu = Some(mtu);
    }

    /// Encodes and enqueues `pdu`.
    pub fn send(&mut self, pdu: &AttPdu<'_>) -> Result<(), Error> {
        let mut buf = vec![0u8; usize::from(self.mtu)];
        let remaining = {
            let mut writer = ByteWriter::new(&mut buf);
            pdu.to_bytes(&mut writer)?;
            writer.into_rest().len()
        };
        let written = buf.len() - remaining;
        buf.truncate(written);
        self.queue.push_back(buf);
        Ok(())
    }

    /// Enqueues a response that was assembled by hand (the record-list responses: Read-By-Type,
    /// Read-By-Group-Type, Find-Information, Find-By-Type-Value), since their record length
    /// depends on the database contents and isn't known to the `AttPdu` codec.
    pub fn send_bytes(&mut self, bytes: Vec<u8>) {
        self.queue.push_back(bytes);
    }

    /// Enqueues an Error-Response citing `request_opcode()` as the failing request.
    pub fn send_error(&mut self, error_code: ErrorCode, handle: Handle) -> Result<(), Error> {
        let mut buf = [0u8; 5];
        {
            let mut writer = ByteWriter::new(&mut buf);
            writer.write_u8(Opcode::ErrorRsp.raw())?;
            writer.write_u8(self.request_opcode.raw())?;
            writer.write_u16_le(handle.as_u16())?;
            writer.write_u8(error_code.into())?;
        }
        self.queue.push_back(buf.to_vec());
        Ok(())
    }
}

/// Owns an ATT bearer: the transport socket, the negotiated MTU, and the outbound send queue.
pub struct AttConnection<S: Socket> {
    socket: S,
    mtu: u16,
    max_mtu: u16,
    send_queue: VecDeque<Vec<u8>>,
}

impl<S: Socket> AttConnection<S> {
    /// Creates a connection over `socket`, starting at the BLE default MTU and allowing
    /// negotiation up to `max_mtu`.
    pub fn new(socket: S, max_mtu: u16) -> Self {
        Self {
            socket,
            mtu: ATT_DEFAULT_MTU,
            max_mtu: max_mtu.max(ATT_DEFAULT_MTU),
            send_queue: VecDeque::new(),
        }
    }

    /// The currently negotiated MTU.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Sets the negotiated MTU, clamped into `[ATT_DEFAULT_MTU, max_mtu]`.
    pub fn set_mtu(&mut self, n: u16) {
        self.mtu = n.clamp(ATT_DEFAULT_MTU, self.max_mtu);
    }

    /// The security level of the underlying link.
    pub fn security_level(&self) -> SecurityLevel {
        self.socket.security_level()
    }

    /// Enqueues an Error-Response PDU citing `request_opcode` and `handle`. Does not block.
    pub fn send_error(
        &mut self,
        request_opcode: Opcode,
        error_code: ErrorCode,
        handle: Handle,
    ) -> Result<(), Error> {
        let mut buf = [0u8; 5];
        {
            let mut writer = ByteWriter::new(&mut buf);
            writer.write_u8(Opcode::ErrorRsp.raw())?;
            writer.write_u8(request_opcode.raw())?;
            writer.write_u16_le(handle.as_u16())?;
            writer.write_u8(error_code.into())?;
        }
        self.send_queue.push_back(buf.to_vec());
        Ok(())
    }

    /// Reads one available datagram, decodes it and dispatches it to `handler` if it's a
    /// supported request or command.
    ///
    /// Returns `Ok(())` if no datagram was available, if the datagram was handled (successfully
    /// or by emitting an error response), or if an unsupported/malformed PDU was rejected.
    /// Returns `Err` on a fatal transport failure, or when `handler` reports an internal
    /// invariant violation it can't recover from — either way, the bearer should be torn down.
    pub fn poll_read<H: Handler>(&mut self, handler: &mut H) -> Result<(), ConnectionError> {
        let mut buf = vec![0u8; usize::from(self.mtu)];
        let n = match self.socket.recv(&mut buf)? {
            Some(n) => n,
            None => return Ok(()),
        };
        if n == 0 {
            return Err(ConnectionError::Invariant {
                detail: "received a zero-length ATT PDU",
            });
        }

        let opcode = Opcode::from(buf[0]);
        let mut reader = ByteReader::new(&buf[..n]);
        let pdu = match AttPdu::from_bytes(&mut reader) {
            Ok(pdu) => pdu,
            Err(e) => {
                debug!("ATT<- decode error on opcode {:?}: {}", opcode, e);
                if !opcode.is_command() {
                    self.send_error(opcode, ErrorCode::InvalidPdu, Handle::NULL)?;
                }
                return Ok(());
            }
        };
        debug!("ATT<- {:?}", pdu);

        let mut responder = Responder {
            queue: &mut self.send_queue,
            mtu: self.mtu,
            request_opcode: opcode,
            security_level: self.socket.security_level(),
            requested_mtu: None,
        };

        match pdu {
            AttPdu::ExchangeMtuReq { .. }
            | AttPdu::FindInformationReq { .. }
            | AttPdu::FindByTypeValueReq { .. }
            | AttPdu::ReadByTypeReq { .. }
            | AttPdu::ReadByGroupTypeReq { .. }
            | AttPdu::WriteReq { .. }
            | AttPdu::WriteCommand { .. } => handler.handle(pdu, &mut responder)?,
            AttPdu::ErrorRsp { .. } | AttPdu::ExchangeMtuRsp { .. } | AttPdu::WriteRsp => {
                warn!("ATT<- unexpected response-shaped PDU for opcode {:?}", opcode);
                responder.send_error(ErrorCode::InvalidPdu, Handle::NULL)?;
            }
            AttPdu::Unknown { opcode, .. } => {
                if opcode.is_command() {
                    debug!("ATT<- ignoring unsupported command {:?}", opcode);
                } else {
                    responder.send_error(ErrorCode::RequestNotSupported, Handle::NULL)?;
                }
            }
        }

        if let Some(new_mtu) = responder.requested_mtu {
            self.set_mtu(new_mtu);
        }

        Ok(())
    }

    /// Flushes the send queue to the socket, in enqueue order.
    pub fn poll_write(&mut self) -> Result<(), ConnectionError> {
        while let Some(pdu) = self.send_queue.pop_front() {
            self.socket.send(&pdu)?;
        }
        Ok(())
    }

    /// Direct access to the underlying socket. Chiefly useful in tests driving a
    /// [`crate::socket::LoopbackSocket`] from outside this bearer.
    pub fn socket_for_test(&mut self) -> &mut S {
        &mut self.socket
    }
}
