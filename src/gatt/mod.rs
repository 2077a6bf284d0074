//! Implementation of the Generic Attribute Profile (GATT).
//!
//! GATT describes a service framework that uses the Attribute Protocol for discovery and
//! interaction. This module defines the data model (`Attribute`, `Characteristic`, `Descriptor`,
//! `Service`) that the [`database`] module lowers into a flat, handle-addressed attribute list.

pub mod database;

use crate::uuid::{Uuid, Uuid16};
use bitflags::bitflags;

bitflags! {
    /// Access permissions an attribute grants, independent of its `Properties` advertisement.
    ///
    /// The permission gate in [`crate::security`] checks these against the connection's
    /// negotiated security level before allowing a read or write to proceed.
    pub struct Permission: u8 {
        const READ                    = 0x01;
        const WRITE                   = 0x02;
        const READ_ENCRYPT            = 0x04;
        const WRITE_ENCRYPT           = 0x08;
        const READ_AUTHENTICATION     = 0x10;
        const WRITE_AUTHENTICATION    = 0x20;
    }
}

impl Permission {
    /// Plain readable and writable, no security requirements.
    pub const READ_WRITE: Self = Self::from_bits_truncate(Self::READ.bits | Self::WRITE.bits);

    /// Readable by anyone, not writable.
    pub const READ_ONLY: Self = Self::READ;
}

bitflags! {
    /// Advertised capabilities of a characteristic, carried in its declaration attribute.
    pub struct CharacteristicProperty: u8 {
        const BROADCAST                  = 0x01;
        const READ                       = 0x02;
        const WRITE_WITHOUT_RESPONSE     = 0x04;
        const WRITE                      = 0x08;
        const NOTIFY                     = 0x10;
        const INDICATE                   = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES        = 0x80;
    }
}

/// UUID assigned to the *Primary Service* declaration.
pub const PRIMARY_SERVICE_UUID: Uuid16 = Uuid16(0x2800);
/// UUID assigned to the *Secondary Service* declaration.
pub const SECONDARY_SERVICE_UUID: Uuid16 = Uuid16(0x2801);
/// UUID assigned to the *Characteristic* declaration.
pub const CHARACTERISTIC_UUID: Uuid16 = Uuid16(0x2803);
/// UUID assigned to the *Client Characteristic Configuration Descriptor* (CCCD).
pub const CCCD_UUID: Uuid16 = Uuid16(0x2902);

/// A single ATT attribute as stored in the database: a handle, a type, a value and the
/// permissions guarding access to it.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub handle: crate::att::Handle,
    pub att_type: Uuid,
    pub value: Vec<u8>,
    pub permissions: Permission,
}

/// A GATT descriptor: an attribute attached to a characteristic that qualifies it further.
///
/// Descriptors never act as grouping attributes; they simply contribute one attribute each,
/// following the characteristic value attribute that owns them.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub value: Vec<u8>,
    pub permissions: Permission,
}

impl Descriptor {
    pub fn new(uuid: impl Into<Uuid>, value: Vec<u8>, permissions: Permission) -> Self {
        Self {
            uuid: uuid.into(),
            value,
            permissions,
        }
    }

    /// A Client Characteristic Configuration Descriptor with the given initial value.
    ///
    /// Notifications/indications themselves aren't implemented by this crate, but the CCCD is
    /// common enough to appear in almost every non-trivial service, and is valid to read and
    /// write like any other attribute.
    pub fn cccd(initial_value: u16) -> Self {
        Self::new(
            CCCD_UUID,
            initial_value.to_le_bytes().to_vec(),
            Permission::READ_WRITE,
        )
    }
}

/// A GATT characteristic: a typed value exposed by a service, with optional descriptors.
#[derive(Debug, Clone)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperty,
    pub value: Vec<u8>,
    pub permissions: Permission,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    pub fn new(
        uuid: impl Into<Uuid>,
        properties: CharacteristicProperty,
        value: Vec<u8>,
        permissions: Permission,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            properties,
            value,
            permissions,
            descriptors: Vec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Number of attributes this characteristic contributes: declaration + value + descriptors.
    pub fn attribute_count(&self) -> usize {
        2 + self.descriptors.len()
    }
}

/// A GATT service: a UUID plus an ordered list of characteristics.
///
/// A service contributes, in order: one service-declaration attribute, then, per characteristic,
/// a characteristic-declaration attribute followed by the characteristic-value attribute and any
/// descriptors.
#[derive(Debug, Clone)]
pub struct Service {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn primary(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            primary: true,
            characteristics: Vec::new(),
        }
    }

    pub fn secondary(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            primary: false,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    /// Number of attributes this service contributes in total.
    pub fn attribute_count(&self) -> usize {
        1 + self
            .characteristics
            .iter()
            .map(Characteristic::attribute_count)
            .sum::<usize>()
    }
}
