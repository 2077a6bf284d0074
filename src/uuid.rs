//! Bluetooth UUIDs (16- or 128-bit).
//!
//! Bluetooth assigns UUIDs to identify services, characteristics and descriptors. In order to
//! save space over the air, common UUIDs can be represented and transmitted as 16-bit aliases
//! instead of the full 128 bits.
//!
//! A 16-bit UUID alias is converted to its full 128-bit counterpart by splicing it into the
//! Bluetooth Base UUID, which is defined as `00000000-0000-1000-8000-00805F9B34FB`: `0xABCD`
//! becomes `0000ABCD-0000-1000-8000-00805F9B34FB`.

use crate::bytes::*;
use crate::Error;
use std::fmt;

const BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, /*-*/ 0x00, 0x00, /*-*/ 0x10, 0x00, /*-*/ 0x80, 0x00,
    /*-*/ 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB,
];

/// A 16-bit UUID alias.
#[derive(PartialEq, Eq, Copy, Clone)]
pub struct Uuid16(pub u16);

/// A full 128-bit UUID.
#[derive(PartialEq, Eq, Copy, Clone)]
pub struct Uuid128(pub [u8; 16]);

impl Uuid128 {
    /// Creates a 128-bit UUID from 16 raw bytes (little-endian, as transmitted over ATT).
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<Uuid16> for Uuid128 {
    fn from(uuid: Uuid16) -> Self {
        let mut buf = BASE_UUID;
        buf[2..4].copy_from_slice(&uuid.0.to_be_bytes());
        Uuid128(buf)
    }
}

impl ToBytes for Uuid16 {
    fn to_bytes(&self, buffer: &mut ByteWriter<'_>) -> Result<(), Error> {
        buffer.write_slice(&self.0.to_le_bytes())
    }
}

impl ToBytes for Uuid128 {
    fn to_bytes(&self, buffer: &mut ByteWriter<'_>) -> Result<(), Error> {
        // Internally stored in conventional (big-endian/textual) byte order; the wire format
        // for 128-bit UUIDs is little-endian, so reverse on the way out.
        let mut wire = self.0;
        wire.reverse();
        buffer.write_slice(&wire)
    }
}

impl FromBytes<'_> for Uuid16 {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let array = bytes.read_array()?;
        Ok(Uuid16(u16::from_le_bytes(array)))
    }
}

impl FromBytes<'_> for Uuid128 {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let mut array: [u8; 16] = bytes.read_array()?;
        array.reverse();
        Ok(Uuid128(array))
    }
}

impl fmt::Debug for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid16({:04x})", self.0)
    }
}

impl fmt::Debug for Uuid128 {
    #[allow(clippy::many_single_char_names)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [b0, b1, b2, b3, b4, b5, b6, b7, b8, b9, b10, b11, b12, b13, b14, b15] = self.0;
        let a = u32::from_be_bytes([b0, b1, b2, b3]);
        let b = u16::from_be_bytes([b4, b5]);
        let c = u16::from_be_bytes([b6, b7]);
        let d = u16::from_be_bytes([b8, b9]);
        let e = u64::from_be_bytes([0, 0, b10, b11, b12, b13, b14, b15]);
        write!(f, "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}", a, b, c, d, e)
    }
}

/// A Bluetooth UUID, either in 16-bit or 128-bit form.
///
/// Equality always compares in canonical long (128-bit) form, so a 16-bit UUID and its
/// equivalent 128-bit expansion are equal.
#[derive(Copy, Clone, Eq)]
pub enum Uuid {
    Uuid16(Uuid16),
    Uuid128(Uuid128),
}

impl Uuid {
    /// Returns this UUID expanded to its canonical 128-bit form.
    pub fn to_uuid128(self) -> Uuid128 {
        match self {
            Uuid::Uuid16(u) => u.into(),
            Uuid::Uuid128(u) => u,
        }
    }

    /// Encodes this UUID in its shortest wire form: 2 bytes for `Uuid16`, 16 for `Uuid128`.
    ///
    /// This is the form attribute declarations store their type/value UUIDs in, as opposed to
    /// always expanding to 128 bits.
    pub fn to_minimal_bytes(self) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let len = match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid128(_) => 16,
        };
        let mut writer = ByteWriter::new(&mut buf[..len]);
        self.to_bytes(&mut writer)
            .expect("UUID always fits its own minimal encoding");
        buf[..len].to_vec()
    }

    /// Whether this UUID is in 16-bit short form.
    pub fn is_short(self) -> bool {
        matches!(self, Uuid::Uuid16(_))
    }
}

impl From<Uuid16> for Uuid {
    fn from(u: Uuid16) -> Self {
        Uuid::Uuid16(u)
    }
}

impl From<Uuid128> for Uuid {
    fn from(u: Uuid128) -> Self {
        Uuid::Uuid128(u)
    }
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // 16-bit UUIDs can be compared directly without expanding either side.
            (Uuid::Uuid16(a), Uuid::Uuid16(b)) => a == b,
            _ => self.to_uuid128() == other.to_uuid128(),
        }
    }
}

impl PartialEq<Uuid16> for Uuid {
    fn eq(&self, other: &Uuid16) -> bool {
        *self == Uuid::Uuid16(*other)
    }
}

impl FromBytes<'_> for Uuid {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(match bytes.bytes_left() {
            2 => Uuid::Uuid16(Uuid16::from_bytes(bytes)?),
            16 => Uuid::Uuid128(Uuid128::from_bytes(bytes)?),
            _ => return Err(Error::InvalidLength),
        })
    }
}

impl ToBytes for Uuid {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        match self {
            Uuid::Uuid16(u) => u.to_bytes(writer),
            Uuid::Uuid128(u) => u.to_bytes(writer),
        }
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(u) => u.fmt(f),
            Uuid::Uuid128(u) => u.fmt(f),
        }
    }
}
