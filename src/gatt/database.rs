//! The attribute database: a flat, handle-addressed list of attributes with service grouping
//! derived from the order services were appended in.

use crate::att::{Handle, HandleRange};
use crate::gatt::{
    Attribute, Permission, Service, CHARACTERISTIC_UUID, PRIMARY_SERVICE_UUID,
    SECONDARY_SERVICE_UUID,
};
use crate::uuid::{Uuid, Uuid16};

/// The service's handle range plus whether it's primary, as tracked for `read_by_group_type`.
#[derive(Debug, Clone, Copy)]
struct ServiceRange {
    start: Handle,
    end: Handle,
    primary: bool,
}

/// The attribute database backing a [`crate::server::GattServer`].
///
/// Attributes are assigned dense, sequential handles starting at 1, in the order their owning
/// services were appended. Handles never change once assigned; a service's value may be
/// rewritten in place via [`Database::write`].
#[derive(Debug, Clone, Default)]
pub struct Database {
    attributes: Vec<Attribute>,
    services: Vec<ServiceRange>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a service's attributes to the database, assigning it the next free handles.
    ///
    /// Returns the handle range the service now occupies.
    pub fn append_service(&mut self, service: Service) -> HandleRange {
        let start_handle = Handle::from_raw(self.attributes.len() as u16 + 1);

        let decl_type = if service.primary {
            PRIMARY_SERVICE_UUID
        } else {
            SECONDARY_SERVICE_UUID
        };
        self.attributes.push(Attribute {
            handle: start_handle,
            att_type: decl_type.into(),
            value: encode_uuid(service.uuid),
            permissions: Permission::READ_ONLY,
        });

        for characteristic in service.characteristics {
            let decl_handle = Handle::from_raw(self.attributes.len() as u16 + 1);
            let value_handle = Handle::from_raw(decl_handle.as_u16() + 1);

            let mut decl_value = Vec::with_capacity(3 + 16);
            decl_value.push(characteristic.properties.bits());
            decl_value.extend_from_slice(&value_handle.as_u16().to_le_bytes());
            decl_value.extend_from_slice(&encode_uuid(characteristic.uuid));

            self.attributes.push(Attribute {
                handle: decl_handle,
                att_type: CHARACTERISTIC_UUID.into(),
                value: decl_value,
                permissions: Permission::READ_ONLY,
            });

            self.attributes.push(Attribute {
                handle: value_handle,
                att_type: characteristic.uuid,
                value: characteristic.value,
                permissions: characteristic.permissions,
            });

            for descriptor in characteristic.descriptors {
                let handle = Handle::from_raw(self.attributes.len() as u16 + 1);
                self.attributes.push(Attribute {
                    handle,
                    att_type: descriptor.uuid,
                    value: descriptor.value,
                    permissions: descriptor.permissions,
                });
            }
        }

        let end_handle = Handle::from_raw(self.attributes.len() as u16);
        self.services.push(ServiceRange {
            start: start_handle,
            end: end_handle,
            primary: service.primary,
        });

        HandleRange::new(start_handle, end_handle)
    }

    /// Number of attributes currently in the database.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Looks up a single attribute by handle.
    pub fn attribute(&self, handle: Handle) -> Option<&Attribute> {
        self.index_of(handle).map(|i| &self.attributes[i])
    }

    fn index_of(&self, handle: Handle) -> Option<usize> {
        let raw = handle.as_u16();
        if raw == 0 || usize::from(raw) > self.attributes.len() {
            None
        } else {
            Some(usize::from(raw) - 1)
        }
    }

    /// *Read By Group Type*: services fully contained in `range` whose grouping matches
    /// `primary`, in ascending handle order.
    pub fn read_by_group_type(
        &self,
        range: &HandleRange,
        primary: bool,
    ) -> Vec<(Handle, Handle, Uuid)> {
        self.services
            .iter()
            .filter(|s| s.primary == primary)
            .filter(|s| range.contains(s.start) && s.end.as_u16() <= range.end().as_u16())
            .map(|s| {
                let uuid = self.attributes[usize::from(s.start.as_u16()) - 1].att_type;
                (s.start, s.end, uuid)
            })
            .collect()
    }

    /// *Read By Type*: attributes in `range` whose type equals `att_type`, in handle order.
    pub fn read_by_type(&self, range: &HandleRange, att_type: Uuid) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| range.contains(a.handle) && a.att_type == att_type)
            .collect()
    }

    /// *Find Information*: every attribute in `range`, in handle order.
    pub fn find_information(&self, range: &HandleRange) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| range.contains(a.handle))
            .collect()
    }

    /// *Find By Type Value*: handles of attributes in `range` whose type is the 16-bit UUID
    /// `att_type` and whose value equals `value` exactly, each paired with the end handle of the
    /// service grouping it belongs to.
    pub fn find_by_type_value(
        &self,
        range: &HandleRange,
        att_type: Uuid16,
        value: &[u8],
    ) -> Vec<(Handle, Handle)> {
        self.attributes
            .iter()
            .filter(|a| range.contains(a.handle) && a.att_type == att_type && a.value == value)
            .map(|a| (a.handle, self.group_end(a.handle).unwrap_or(a.handle)))
            .collect()
    }

    /// Overwrites the value at `handle`. Does not check permissions; callers go through the
    /// security gate first.
    pub fn write(&mut self, handle: Handle, value: &[u8]) -> Result<(), ()> {
        match self.index_of(handle) {
            Some(i) => {
                self.attributes[i].value = value.to_vec();
                Ok(())
            }
            None => Err(()),
        }
    }

    fn group_end(&self, handle: Handle) -> Option<Handle> {
        self.services
            .iter()
            .find(|s| s.start.as_u16() <= handle.as_u16() && handle.as_u16() <= s.end.as_u16())
            .map(|s| s.end)
    }
}

fn encode_uuid(uuid: Uuid) -> Vec<u8> {
    uuid.to_minimal_bytes()
}
