//! Attribute handles.

use crate::att::{AttError, ErrorCode};
use crate::bytes::*;
use crate::Error;
use std::fmt;
use std::ops::RangeInclusive;

/// A 16-bit handle uniquely identifying an attribute on an ATT server.
///
/// The `0x0000` handle (`NULL`) is invalid and must not be used.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u16);

impl Handle {
    /// The `0x0000` handle is not used for actual attributes, but as a special placeholder when no
    /// attribute handle is valid (eg. in error responses).
    pub const NULL: Self = Handle(0x0000);

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Creates a handle from a raw `u16`.
    pub fn from_raw(raw: u16) -> Self {
        Handle(raw)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl ToBytes for Handle {
    fn to_bytes(&self, writer: &mut ByteWriter) -> Result<(), Error> {
        writer.write_u16_le(self.0)
    }
}

impl FromBytes<'_> for Handle {
    fn from_bytes(bytes: &mut ByteReader) -> Result<Self, Error> {
        Ok(Handle(bytes.read_u16_le()?))
    }
}

/// A (de)serializable handle range that hasn't been checked for validity yet.
#[derive(Debug, Copy, Clone)]
pub struct RawHandleRange {
    pub start: Handle,
    pub end: Handle,
}

impl RawHandleRange {
    /// Checks that this handle range is valid per the prologue rule common to every GATT
    /// handler: the start handle must not be the null handle, and must not exceed the end
    /// handle.
    ///
    /// Returns an `AttError` citing `start` that should be sent as an Error-Response if the
    /// range is invalid.
    pub fn check(&self) -> Result<HandleRange, AttError> {
        if self.start.0 == 0 || self.end.0 == 0 || self.start.0 > self.end.0 {
            Err(AttError::new(ErrorCode::InvalidHandle, self.start))
        } else {
            Ok(HandleRange(self.start..=self.end))
        }
    }
}

impl FromBytes<'_> for RawHandleRange {
    fn from_bytes(bytes: &mut ByteReader) -> Result<Self, Error> {
        Ok(Self {
            start: Handle::from_bytes(bytes)?,
            end: Handle::from_bytes(bytes)?,
        })
    }
}

impl ToBytes for RawHandleRange {
    fn to_bytes(&self, writer: &mut ByteWriter) -> Result<(), Error> {
        writer.write_u16_le(self.start.as_u16())?;
        writer.write_u16_le(self.end.as_u16())?;
        Ok(())
    }
}

/// A handle range that has been checked for validity via [`RawHandleRange::check`].
#[derive(Debug, Clone)]
pub struct HandleRange(RangeInclusive<Handle>);

impl HandleRange {
    /// Creates a validated range directly, e.g. for use by the database's own iteration logic.
    pub fn new(start: Handle, end: Handle) -> Self {
        HandleRange(start..=end)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.0.start().0 <= handle.0 && handle.0 <= self.0.end().0
    }

    pub fn start(&self) -> Handle {
        *self.0.start()
    }

    pub fn end(&self) -> Handle {
        *self.0.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_start_handle() {
        let raw = RawHandleRange {
            start: Handle::from_raw(0),
            end: Handle::from_raw(1),
        };
        let err = raw.check().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidHandle);
        assert_eq!(err.handle(), Handle::from_raw(0));
    }

    #[test]
    fn rejects_inverted_range() {
        let raw = RawHandleRange {
            start: Handle::from_raw(5),
            end: Handle::from_raw(2),
        };
        assert!(raw.check().is_err());
    }

    #[test]
    fn accepts_well_formed_range() {
        let raw = RawHandleRange {
            start: Handle::from_raw(1),
            end: Handle::from_raw(1),
        };
        let range = raw.check().unwrap();
        assert!(range.contains(Handle::from_raw(1)));
        assert!(!range.contains(Handle::from_raw(2)));
    }
}
