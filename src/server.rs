//! The GATT server: binds the four ATT lookup requests and the write path to the attribute
//! [`Database`], validating each request, truncating responses to the negotiated MTU, and
//! emitting errors with the right opcode and handle.

use crate::att::{
    AttPdu, ByGroupAttData, ByTypeAttData, ErrorCode, Handle, HandleRange, Opcode, RawHandleRange,
};
use crate::bytes::ByteWriter;
use crate::connection::{Handler, Responder};
use crate::error::ConnectionError;
use crate::gatt::database::Database;
use crate::gatt::{Permission, PRIMARY_SERVICE_UUID, SECONDARY_SERVICE_UUID};
use crate::security::{self, Access};
use crate::uuid::{Uuid, Uuid16};

/// A GATT server bound to an attribute [`Database`].
///
/// One `GattServer` handles every supported ATT opcode for a single bearer; install it on an
/// [`crate::connection::AttConnection`] and drive both with `poll_read`/`poll_write` each tick.
pub struct GattServer {
    database: Database,
    server_mtu: u16,
    mtu_negotiated: bool,
}

impl GattServer {
    /// Creates a server over `database`, advertising `server_mtu` as its own Exchange-MTU value.
    pub fn new(database: Database, server_mtu: u16) -> Self {
        Self {
            database,
            server_mtu,
            mtu_negotiated: false,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    fn exchange_mtu(
        &mut self,
        client_mtu: u16,
        responder: &mut Responder<'_>,
    ) -> Result<(), ConnectionError> {
        if self.mtu_negotiated {
            warn!("duplicate Exchange-MTU request, rejecting");
            responder.send_error(ErrorCode::RequestNotSupported, Handle::NULL)?;
            return Ok(());
        }
        self.mtu_negotiated = true;

        let final_mtu = crate::connection::ATT_DEFAULT_MTU.max(client_mtu.min(self.server_mtu));
        debug!("MTU negotiated: client={} server={} -> {}", client_mtu, self.server_mtu, final_mtu);

        if responder
            .send(&AttPdu::ExchangeMtuRsp {
                server_mtu: self.server_mtu,
            })
            .is_ok()
        {
            responder.request_mtu_change(final_mtu);
        }
        Ok(())
    }

    fn read_by_group_type(
        &self,
        handle_range: RawHandleRange,
        group_type: Uuid,
        responder: &mut Responder<'_>,
    ) -> Result<(), ConnectionError> {
        // Read-By-Group-Type cites handle 0 for a zero bound, unlike the other handlers (which
        // cite the start handle even when it's the invalid bound).
        if handle_range.start.as_u16() == 0 || handle_range.end.as_u16() == 0 {
            responder.send_error(ErrorCode::InvalidHandle, Handle::NULL)?;
            return Ok(());
        }
        let range = match checked_range(handle_range, responder)? {
            Some(r) => r,
            None => return Ok(()),
        };

        let primary = if group_type == PRIMARY_SERVICE_UUID {
            true
        } else if group_type == SECONDARY_SERVICE_UUID {
            false
        } else {
            responder.send_error(ErrorCode::UnsupportedGroupType, range.start())?;
            return Ok(());
        };

        let results = self.database.read_by_group_type(&range, primary);
        if results.is_empty() {
            responder.send_error(ErrorCode::AttributeNotFound, range.start())?;
            return Ok(());
        }

        let mtu = usize::from(responder.mtu());
        let mut body = Vec::new();
        let mut record_len = None;
        let mut count = 0usize;
        for (start, end, uuid) in &results {
            let uuid_bytes = uuid.to_minimal_bytes();
            let data = ByGroupAttData::new(responder.mtu(), *start, *end, &uuid_bytes);
            let len = data.encoded_size();
            match record_len {
                None => {
                    if len > 255 {
                        responder.send_error(ErrorCode::UnlikelyError, range.start())?;
                        return Err(ConnectionError::Invariant {
                            detail: "read-by-group-type record length exceeds the 1-byte wire field",
                        });
                    }
                    record_len = Some(len);
                }
                Some(l) if l != len => break,
                _ => {}
            }
            if 2 + (count + 1) * len > mtu {
                break;
            }
            let mut tmp = vec![0u8; len];
            data.to_bytes(&mut ByteWriter::new(&mut tmp)).expect("record fits its own length");
            body.extend_from_slice(&tmp);
            count += 1;
        }

        let mut buf = Vec::with_capacity(2 + body.len());
        buf.push(Opcode::ReadByGroupTypeRsp.raw());
        buf.push(record_len.unwrap_or(0) as u8);
        buf.extend_from_slice(&body);
        responder.send_bytes(buf);
        Ok(())
    }

    fn read_by_type(
        &self,
        handle_range: RawHandleRange,
        attribute_type: Uuid,
        responder: &mut Responder<'_>,
    ) -> Result<(), ConnectionError> {
        let range = match checked_range(handle_range, responder)? {
            Some(r) => r,
            None => return Ok(()),
        };

        let attrs = self.database.read_by_type(&range, attribute_type);
        if attrs.is_empty() {
            responder.send_error(ErrorCode::AttributeNotFound, range.start())?;
            return Ok(());
        }

        let mtu = usize::from(responder.mtu());
        let mut body = Vec::new();
        let mut record_len = None;
        let mut count = 0usize;
        for attr in &attrs {
            let data = ByTypeAttData::new(responder.mtu(), attr.handle, &attr.value);
            let len = data.encoded_size();
            match record_len {
                None => {
                    if len > 255 {
                        responder.send_error(ErrorCode::UnlikelyError, range.start())?;
                        return Err(ConnectionError::Invariant {
                            detail: "read-by-type record length exceeds the 1-byte wire field",
                        });
                    }
                    record_len = Some(len);
                }
                Some(l) if l != len => break,
                _ => {}
            }
            if 2 + (count + 1) * len > mtu {
                break;
            }
            let mut tmp = vec![0u8; len];
            data.to_bytes(&mut ByteWriter::new(&mut tmp)).expect("record fits its own length");
            body.extend_from_slice(&tmp);
            count += 1;
        }

        let mut buf = Vec::with_capacity(2 + body.len());
        buf.push(Opcode::ReadByTypeRsp.raw());
        buf.push(record_len.unwrap_or(0) as u8);
        buf.extend_from_slice(&body);
        responder.send_bytes(buf);
        Ok(())
    }

    fn find_information(
        &self,
        handle_range: RawHandleRange,
        responder: &mut Responder<'_>,
    ) -> Result<(), ConnectionError> {
        let range = match checked_range(handle_range, responder)? {
            Some(r) => r,
            None => return Ok(()),
        };

        let attrs = self.database.find_information(&range);
        if attrs.is_empty() {
            responder.send_error(ErrorCode::AttributeNotFound, range.start())?;
            return Ok(());
        }

        let format_short = attrs[0].att_type.is_short();
        let record_len = if format_short { 4 } else { 18 };
        let mtu = usize::from(responder.mtu());

        let mut body = Vec::new();
        let mut count = 0usize;
        for attr in attrs {
            if attr.att_type.is_short() != format_short {
                continue;
            }
            if 2 + (count + 1) * record_len > mtu {
                break;
            }
            body.extend_from_slice(&attr.handle.as_u16().to_le_bytes());
            body.extend_from_slice(&attr.att_type.to_minimal_bytes());
            count += 1;
        }

        if count == 0 {
            responder.send_error(ErrorCode::AttributeNotFound, range.start())?;
            return Ok(());
        }

        let mut buf = Vec::with_capacity(2 + body.len());
        buf.push(Opcode::FindInformationRsp.raw());
        buf.push(if format_short { 0x01 } else { 0x02 });
        buf.extend_from_slice(&body);
        responder.send_bytes(buf);
        Ok(())
    }

    fn find_by_type_value(
        &self,
        handle_range: RawHandleRange,
        attribute_type: u16,
        attribute_value: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<(), ConnectionError> {
        let range = match checked_range(handle_range, responder)? {
            Some(r) => r,
            None => return Ok(()),
        };

        let results = self
            .database
            .find_by_type_value(&range, Uuid16(attribute_type), attribute_value);
        if results.is_empty() {
            responder.send_error(ErrorCode::AttributeNotFound, range.start())?;
            return Ok(());
        }

        let mtu = usize::from(responder.mtu());
        let mut body = Vec::new();
        let mut count = 0usize;
        for (found, group_end) in results {
            if 1 + (count + 1) * 4 > mtu {
                break;
            }
            body.extend_from_slice(&found.as_u16().to_le_bytes());
            body.extend_from_slice(&group_end.as_u16().to_le_bytes());
            count += 1;
        }

        let mut buf = Vec::with_capacity(1 + body.len());
        buf.push(Opcode::FindByTypeValueRsp.raw());
        buf.extend_from_slice(&body);
        responder.send_bytes(buf);
        Ok(())
    }

    fn write(
        &mut self,
        handle: Handle,
        value: &[u8],
        respond: bool,
        responder: &mut Responder<'_>,
    ) -> Result<(), ConnectionError> {
        let count = self.database.attribute_count();
        if count == 0 || handle.as_u16() == 0 || usize::from(handle.as_u16()) > count {
            if respond {
                responder.send_error(ErrorCode::InvalidHandle, handle)?;
            }
            return Ok(());
        }

        let permissions = self
            .database
            .attribute(handle)
            .map(|a| a.permissions)
            .unwrap_or(Permission::empty());

        if let Err(code) = security::check(Access::Write, permissions, responder.security_level()) {
            if respond {
                responder.send_error(code, handle)?;
            }
            return Ok(());
        }

        self.database
            .write(handle, value)
            .expect("handle was already validated against attribute_count");

        if respond {
            responder.send(&AttPdu::WriteRsp)?;
        }
        Ok(())
    }
}

/// Validates a raw handle range, emitting the prologue's `InvalidHandle` error on failure.
fn checked_range(
    handle_range: RawHandleRange,
    responder: &mut Responder<'_>,
) -> Result<Option<HandleRange>, ConnectionError> {
    match handle_range.check() {
        Ok(range) => Ok(Some(range)),
        Err(e) => {
            responder.send_error(e.error_code(), e.handle())?;
            Ok(None)
        }
    }
}

impl Handler for GattServer {
    fn handle(&mut self, pdu: AttPdu<'_>, responder: &mut Responder<'_>) -> Result<(), ConnectionError> {
        match pdu {
            AttPdu::ExchangeMtuReq { client_mtu } => self.exchange_mtu(client_mtu, responder),
            AttPdu::ReadByGroupTypeReq {
                handle_range,
                group_type,
            } => self.read_by_group_type(handle_range, group_type, responder),
            AttPdu::ReadByTypeReq {
                handle_range,
                attribute_type,
            } => self.read_by_type(handle_range, attribute_type, responder),
            AttPdu::FindInformationReq { handle_range } => {
                self.find_information(handle_range, responder)
            }
            AttPdu::FindByTypeValueReq {
                handle_range,
                attribute_type,
                attribute_value,
            } => self.find_by_type_value(
                handle_range,
                attribute_type,
                attribute_value.as_ref(),
                responder,
            ),
            AttPdu::WriteReq { handle, value } => {
                self.write(handle, value.as_ref(), true, responder)
            }
            AttPdu::WriteCommand { handle, value } => {
                self.write(handle, value.as_ref(), false, responder)
            }
            // The connection only ever dispatches the opcodes matched above.
            _ => unreachable!("AttConnection only dispatches supported opcodes to the handler"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::{Characteristic, CharacteristicProperty, Descriptor, Service};
    use crate::socket::LoopbackSocket;
    use crate::security::SecurityLevel;
    use crate::connection::AttConnection;

    fn demo_database() -> Database {
        let mut db = Database::new();
        db.append_service(
            Service::primary(Uuid16(0x180F)).with_characteristic(Characteristic::new(
                Uuid16(0x2A19),
                CharacteristicProperty::READ,
                vec![80],
                Permission::READ_ONLY,
            )),
        );
        db.append_service(
            Service::primary(Uuid16(0x1800)).with_characteristic(
                Characteristic::new(
                    Uuid16(0x2A00),
                    CharacteristicProperty::READ | CharacteristicProperty::WRITE,
                    b"demo".to_vec(),
                    Permission::READ_WRITE,
                )
                .with_descriptor(Descriptor::cccd(0)),
            ),
        );
        db
    }

    fn pdu_bytes(opcode: u8, rest: &[u8]) -> Vec<u8> {
        let mut v = vec![opcode];
        v.extend_from_slice(rest);
        v
    }

    #[test]
    fn exchange_mtu_negotiates_minimum_and_rejects_repeat() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(demo_database(), 65);

        conn.socket_for_test().push_inbound(pdu_bytes(0x02, &200u16.to_le_bytes()));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();
        assert_eq!(conn.mtu(), 65);

        conn.socket_for_test().push_inbound(pdu_bytes(0x02, &200u16.to_le_bytes()));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();
        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent[0], Opcode::ErrorRsp.raw());
        let code: u8 = ErrorCode::RequestNotSupported.into();
        assert_eq!(sent[4], code);
    }

    #[test]
    fn read_by_group_type_finds_primary_services() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(demo_database(), 100);

        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0xFFFFu16.to_le_bytes());
        body.extend_from_slice(&PRIMARY_SERVICE_UUID.0.to_le_bytes());
        conn.socket_for_test().push_inbound(pdu_bytes(0x10, &body));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();

        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent[0], Opcode::ReadByGroupTypeRsp.raw());
        let record_len = sent[1] as usize;
        assert_eq!(record_len, 6); // handle(2) + end(2) + 16-bit uuid(2)
        assert_eq!((sent.len() - 2) % record_len, 0);
        let record_count = (sent.len() - 2) / record_len;
        assert_eq!(record_count, 2);
    }

    #[test]
    fn read_by_type_returns_attribute_not_found_for_empty_range() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(demo_database(), 100);

        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0xDEADu16.to_le_bytes());
        conn.socket_for_test().push_inbound(pdu_bytes(0x08, &body));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();

        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent[0], Opcode::ErrorRsp.raw());
        let code: u8 = ErrorCode::AttributeNotFound.into();
        assert_eq!(sent[4], code);
    }

    #[test]
    fn write_request_updates_database_and_responds() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(demo_database(), 100);

        // Handle 5 is the "Device Name" characteristic value in the second service.
        let handle = 5u16;
        let mut body = Vec::new();
        body.extend_from_slice(&handle.to_le_bytes());
        body.extend_from_slice(b"bye!");
        conn.socket_for_test().push_inbound(pdu_bytes(0x12, &body));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();

        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent, vec![Opcode::WriteRsp.raw()]);
        assert_eq!(
            server.database().attribute(Handle::from_raw(handle)).unwrap().value,
            b"bye!".to_vec()
        );
    }

    #[test]
    fn write_command_is_silent_even_on_invalid_handle() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(demo_database(), 100);

        let mut body = Vec::new();
        body.extend_from_slice(&9999u16.to_le_bytes());
        body.extend_from_slice(b"x");
        conn.socket_for_test().push_inbound(pdu_bytes(0x52, &body));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();
        assert!(conn.socket_for_test().pop_outbound().is_none());
    }

    #[test]
    fn write_denied_without_security_level_reports_insufficient_authentication() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(Database::new(), 100);
        server.database_mut().append_service(
            Service::primary(Uuid16(0x1234)).with_characteristic(Characteristic::new(
                Uuid16(0x5678),
                CharacteristicProperty::WRITE,
                vec![0],
                Permission::WRITE | Permission::WRITE_AUTHENTICATION,
            )),
        );

        let handle = 2u16; // characteristic value attribute
        let mut body = Vec::new();
        body.extend_from_slice(&handle.to_le_bytes());
        body.extend_from_slice(&[1]);
        conn.socket_for_test().push_inbound(pdu_bytes(0x12, &body));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();

        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent[0], Opcode::ErrorRsp.raw());
        let code: u8 = ErrorCode::InsufficientAuthentication.into();
        assert_eq!(sent[4], code);
    }

    #[test]
    fn read_by_group_type_with_zero_start_handle_cites_null_handle() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = GattServer::new(demo_database(), 100);

        let mut body = Vec::new();
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0xFFFFu16.to_le_bytes());
        body.extend_from_slice(&PRIMARY_SERVICE_UUID.0.to_le_bytes());
        conn.socket_for_test().push_inbound(pdu_bytes(0x10, &body));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();

        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent[0], Opcode::ErrorRsp.raw());
        let code: u8 = ErrorCode::InvalidHandle.into();
        assert_eq!(&sent[2..5], &[0, 0, code]);
    }

    #[test]
    fn read_by_type_rejects_unrepresentable_record_length_as_invariant_failure() {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 600);
        let mut server = GattServer::new(Database::new(), 600);
        // A value long enough that, once the 4-byte record header is added under a large
        // negotiated MTU, the record length no longer fits the response's 1-byte field.
        server.database_mut().append_service(
            Service::primary(Uuid16(0x1234)).with_characteristic(Characteristic::new(
                Uuid16(0x5678),
                CharacteristicProperty::READ,
                vec![0xAB; 300],
                Permission::READ_ONLY,
            )),
        );

        conn.socket_for_test().push_inbound(pdu_bytes(0x02, &600u16.to_le_bytes()));
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();
        assert_eq!(conn.mtu(), 600);

        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0xFFFFu16.to_le_bytes());
        body.extend_from_slice(&0x5678u16.to_le_bytes());
        conn.socket_for_test().push_inbound(pdu_bytes(0x08, &body));
        let err = conn.poll_read(&mut server).unwrap_err();
        assert!(matches!(err, ConnectionError::Invariant { .. }));
        conn.poll_write().unwrap();

        let sent = conn.socket_for_test().pop_outbound().unwrap();
        assert_eq!(sent[0], Opcode::ErrorRsp.raw());
        let code: u8 = ErrorCode::UnlikelyError.into();
        assert_eq!(sent[4], code);
    }
}
