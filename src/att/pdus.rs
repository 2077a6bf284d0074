//! Packets and types used in the ATT protocol.

use crate::att::handle::{Handle, RawHandleRange};
use crate::bytes::*;
use crate::uuid::Uuid;
use crate::utils::HexSlice;
use crate::Error;

enum_with_unknown! {
    /// Error codes that can be sent from the ATT server to the client in response to a request.
    ///
    /// Used as the payload of `ErrorRsp` PDUs.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub enum ErrorCode(u8) {
        /// Attempted to use a `Handle` that isn't valid on this server.
        InvalidHandle = 0x01,
        /// Attribute isn't readable.
        ReadNotPermitted = 0x02,
        /// Attribute isn't writable.
        WriteNotPermitted = 0x03,
        /// Attribute PDU is invalid.
        InvalidPdu = 0x04,
        /// Authentication needed before attribute can be read/written.
        InsufficientAuthentication = 0x05,
        /// Server doesn't support this operation.
        RequestNotSupported = 0x06,
        /// Offset was past the end of the attribute.
        InvalidOffset = 0x07,
        /// Authorization needed before attribute can be read/written.
        InsufficientAuthorization = 0x08,
        /// Too many "prepare write" requests have been queued.
        PrepareQueueFull = 0x09,
        /// No attribute found within the specified attribute handle range.
        AttributeNotFound = 0x0A,
        /// Attribute can't be read/written using *Read Key Blob* request.
        AttributeNotLong = 0x0B,
        /// The encryption key in use is too weak to access an attribute.
        InsufficientEncryptionKeySize = 0x0C,
        /// Attribute value has an incorrect length for the operation.
        InvalidAttributeValueLength = 0x0D,
        /// Request has encountered an "unlikely" error and could not be completed.
        UnlikelyError = 0x0E,
        /// Attribute cannot be read/written without an encrypted connection.
        InsufficientEncryption = 0x0F,
        /// Attribute type is an invalid grouping attribute according to a higher-layer spec.
        UnsupportedGroupType = 0x10,
        /// Server didn't have enough resources to complete a request.
        InsufficientResources = 0x11,
    }
}

/// An error on the ATT protocol layer. Sent back to the peer as an Error-Response.
#[derive(Debug, Clone, Copy)]
pub struct AttError {
    code: ErrorCode,
    handle: Handle,
}

impl AttError {
    pub fn new(code: ErrorCode, handle: Handle) -> Self {
        Self { code, handle }
    }

    pub fn attribute_not_found(handle: Handle) -> Self {
        Self::new(ErrorCode::AttributeNotFound, handle)
    }

    /// The error code describing this error.
    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    /// The handle of the attribute causing the error, or `Handle::NULL` if none applies.
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

enum_with_unknown! {
    /// Specifies an ATT operation to perform.
    ///
    /// The byte values assigned to opcodes are chosen so that the most significant 2 bits indicate
    /// additional information that can be useful in some cases:
    ///
    /// ```notrust
    /// MSb                            LSb
    /// +-----------+---------+----------+
    /// | Signature | Command |  Method  |
    /// |   1 bit   |  1 bit  |  6 bits  |
    /// +-----------+---------+----------+
    /// ```
    ///
    /// * **`Command`** is set to 1 when the PDU is a command: unlike requests, commands never get
    ///   a server response, and unknown commands are silently ignored rather than rejected.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Opcode(u8) {
        ErrorRsp = 0x01,
        ExchangeMtuReq = 0x02,
        ExchangeMtuRsp = 0x03,
        FindInformationReq = 0x04,
        FindInformationRsp = 0x05,
        FindByTypeValueReq = 0x06,
        FindByTypeValueRsp = 0x07,
        ReadByTypeReq = 0x08,
        ReadByTypeRsp = 0x09,
        ReadByGroupTypeReq = 0x10,
        ReadByGroupTypeRsp = 0x11,
        WriteReq = 0x12,
        WriteRsp = 0x13,
        WriteCommand = 0x52,
    }
}

impl Opcode {
    /// Returns the raw byte corresponding to the opcode `self`.
    pub fn raw(&self) -> u8 {
        u8::from(*self)
    }

    /// Returns whether the `Signature` bit in this opcode is set (authenticated write).
    pub fn is_authenticated(&self) -> bool {
        self.raw() & 0x80 != 0
    }

    /// Returns whether the `Command` bit in this opcode is set.
    ///
    /// Commands are never followed by a server response; unimplemented commands are ignored.
    pub fn is_command(&self) -> bool {
        self.raw() & 0x40 != 0
    }
}

/// Structured representation of an inbound ATT message (request or command).
///
/// Outbound responses carrying variable-length record lists (Read-By-Type, Read-By-Group-Type,
/// Find-Information, Find-By-Type-Value) are not represented here; they're assembled directly by
/// the record builders in [`crate::server`] since their record length must be computed from the
/// database contents and the negotiated MTU.
#[derive(Debug)]
pub enum AttPdu<'a> {
    ErrorRsp {
        opcode: Opcode,
        handle: Handle,
        error_code: ErrorCode,
    },
    ExchangeMtuReq {
        client_mtu: u16,
    },
    ExchangeMtuRsp {
        server_mtu: u16,
    },
    FindInformationReq {
        handle_range: RawHandleRange,
    },
    FindByTypeValueReq {
        handle_range: RawHandleRange,
        attribute_type: u16,
        attribute_value: HexSlice<&'a [u8]>,
    },
    ReadByTypeReq {
        handle_range: RawHandleRange,
        attribute_type: Uuid,
    },
    ReadByGroupTypeReq {
        handle_range: RawHandleRange,
        group_type: Uuid,
    },
    WriteReq {
        handle: Handle,
        value: HexSlice<&'a [u8]>,
    },
    WriteRsp,
    WriteCommand {
        handle: Handle,
        value: HexSlice<&'a [u8]>,
    },
    /// Any opcode this server doesn't implement a handler for.
    Unknown {
        opcode: Opcode,
        params: HexSlice<&'a [u8]>,
    },
}

impl<'a> FromBytes<'a> for AttPdu<'a> {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        let opcode = Opcode::from(bytes.read_u8()?);
        Ok(match opcode {
            Opcode::ErrorRsp => AttPdu::ErrorRsp {
                opcode: Opcode::from(bytes.read_u8()?),
                handle: Handle::from_bytes(bytes)?,
                error_code: ErrorCode::from(bytes.read_u8()?),
            },
            Opcode::ExchangeMtuReq => AttPdu::ExchangeMtuReq {
                client_mtu: bytes.read_u16_le()?,
            },
            Opcode::ExchangeMtuRsp => AttPdu::ExchangeMtuRsp {
                server_mtu: bytes.read_u16_le()?,
            },
            Opcode::FindInformationReq => AttPdu::FindInformationReq {
                handle_range: RawHandleRange::from_bytes(bytes)?,
            },
            Opcode::FindByTypeValueReq => AttPdu::FindByTypeValueReq {
                handle_range: RawHandleRange::from_bytes(bytes)?,
                attribute_type: bytes.read_u16_le()?,
                attribute_value: HexSlice(bytes.read_slice(bytes.bytes_left())?),
            },
            Opcode::ReadByTypeReq => AttPdu::ReadByTypeReq {
                handle_range: RawHandleRange::from_bytes(bytes)?,
                attribute_type: Uuid::from_bytes(bytes)?,
            },
            Opcode::ReadByGroupTypeReq => AttPdu::ReadByGroupTypeReq {
                handle_range: RawHandleRange::from_bytes(bytes)?,
                group_type: Uuid::from_bytes(bytes)?,
            },
            Opcode::WriteReq => AttPdu::WriteReq {
                handle: Handle::from_bytes(bytes)?,
                value: HexSlice(bytes.read_slice(bytes.bytes_left())?),
            },
            Opcode::WriteRsp => AttPdu::WriteRsp,
            Opcode::WriteCommand => AttPdu::WriteCommand {
                handle: Handle::from_bytes(bytes)?,
                value: HexSlice(bytes.read_slice(bytes.bytes_left())?),
            },
            Opcode::FindInformationRsp
            | Opcode::FindByTypeValueRsp
            | Opcode::ReadByTypeRsp
            | Opcode::ReadByGroupTypeRsp
            | Opcode::Unknown(_) => AttPdu::Unknown {
                opcode,
                params: HexSlice(bytes.read_slice(bytes.bytes_left())?),
            },
        })
    }
}

impl<'a> ToBytes for AttPdu<'a> {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u8(self.opcode().into())?;

        match *self {
            AttPdu::ErrorRsp {
                opcode,
                handle,
                error_code,
            } => {
                writer.write_u8(opcode.into())?;
                writer.write_u16_le(handle.as_u16())?;
                writer.write_u8(error_code.into())?;
            }
            AttPdu::ExchangeMtuReq { client_mtu } => {
                writer.write_u16_le(client_mtu)?;
            }
            AttPdu::ExchangeMtuRsp { server_mtu } => {
                writer.write_u16_le(server_mtu)?;
            }
            AttPdu::FindInformationReq { handle_range } => {
                handle_range.to_bytes(writer)?;
            }
            AttPdu::FindByTypeValueReq {
                handle_range,
                attribute_type,
                attribute_value,
            } => {
                handle_range.to_bytes(writer)?;
                writer.write_u16_le(attribute_type)?;
                writer.write_slice(attribute_value.as_ref())?;
            }
            AttPdu::ReadByTypeReq {
                handle_range,
                attribute_type,
            } => {
                handle_range.to_bytes(writer)?;
                attribute_type.to_bytes(writer)?;
            }
            AttPdu::ReadByGroupTypeReq {
                handle_range,
                group_type,
            } => {
                handle_range.to_bytes(writer)?;
                group_type.to_bytes(writer)?;
            }
            AttPdu::WriteReq { handle, value } => {
                handle.to_bytes(writer)?;
                writer.write_slice(value.as_ref())?;
            }
            AttPdu::WriteRsp => {}
            AttPdu::WriteCommand { handle, value } => {
                handle.to_bytes(writer)?;
                writer.write_slice(value.as_ref())?;
            }
            AttPdu::Unknown { opcode: _, params } => {
                writer.write_slice(params.as_ref())?;
            }
        }

        Ok(())
    }
}

impl AttPdu<'_> {
    pub fn opcode(&self) -> Opcode {
        match self {
            AttPdu::ErrorRsp { .. } => Opcode::ErrorRsp,
            AttPdu::ExchangeMtuReq { .. } => Opcode::ExchangeMtuReq,
            AttPdu::ExchangeMtuRsp { .. } => Opcode::ExchangeMtuRsp,
            AttPdu::FindInformationReq { .. } => Opcode::FindInformationReq,
            AttPdu::FindByTypeValueReq { .. } => Opcode::FindByTypeValueReq,
            AttPdu::ReadByTypeReq { .. } => Opcode::ReadByTypeReq,
            AttPdu::ReadByGroupTypeReq { .. } => Opcode::ReadByGroupTypeReq,
            AttPdu::WriteReq { .. } => Opcode::WriteReq,
            AttPdu::WriteRsp => Opcode::WriteRsp,
            AttPdu::WriteCommand { .. } => Opcode::WriteCommand,
            AttPdu::Unknown { opcode, .. } => *opcode,
        }
    }
}

/// One record of a *Read By Type* response: `handle || value`.
///
/// The constructor truncates `value` to fit the negotiated MTU, mirroring the wire rule that
/// every record in one response must share the same length.
#[derive(Debug)]
pub struct ByTypeAttData<'a> {
    handle: Handle,
    value: HexSlice<&'a [u8]>,
}

impl<'a> ByTypeAttData<'a> {
    pub fn new(mtu: u16, handle: Handle, value: &'a [u8]) -> Self {
        let max_val_len = usize::from(mtu).saturating_sub(4);
        let value = if value.len() > max_val_len {
            &value[..max_val_len]
        } else {
            value
        };
        Self {
            handle,
            value: HexSlice(value),
        }
    }

    pub fn encoded_size(&self) -> usize {
        2 + self.value.as_ref().len()
    }

    pub fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u16_le(self.handle.as_u16())?;
        writer.write_slice(self.value.as_ref())
    }
}

/// One record of a *Read By Group Type* response: `handle || group_end_handle || value`.
#[derive(Debug)]
pub struct ByGroupAttData<'a> {
    handle: Handle,
    group_end_handle: Handle,
    value: HexSlice<&'a [u8]>,
}

impl<'a> ByGroupAttData<'a> {
    pub fn new(mtu: u16, handle: Handle, group_end_handle: Handle, value: &'a [u8]) -> Self {
        let max_val_len = usize::from(mtu).saturating_sub(6);
        let value = if value.len() > max_val_len {
            &value[..max_val_len]
        } else {
            value
        };
        Self {
            handle,
            group_end_handle,
            value: HexSlice(value),
        }
    }

    pub fn encoded_size(&self) -> usize {
        4 + self.value.as_ref().len()
    }

    pub fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u16_le(self.handle.as_u16())?;
        writer.write_u16_le(self.group_end_handle.as_u16())?;
        writer.write_slice(self.value.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bits() {
        assert!(Opcode::WriteCommand.is_command());
        assert!(!Opcode::WriteReq.is_command());
    }

    #[test]
    fn read_by_group_type_rsp_opcode_is_not_read_blob() {
        // Read-By-Group-Type responses must use `Opcode::ReadByGroupTypeRsp`, not `ReadBlobRsp`.
        assert_eq!(Opcode::ReadByGroupTypeRsp.raw(), 0x11);
    }

    #[test]
    fn by_type_att_data_truncates_to_mtu() {
        let data = ByTypeAttData::new(6, Handle::from_raw(1), &[1, 2, 3, 4, 5]);
        assert_eq!(data.encoded_size(), 4);
    }
}
