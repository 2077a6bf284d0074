//! The permission / security gate sitting between the GATT server and the attribute database.
//!
//! ATT itself leaves authentication and encryption to the link layer; this module only consults
//! the bearer's already-negotiated [`SecurityLevel`] and an attribute's [`Permission`] set to
//! decide whether a read or write may proceed.

use crate::att::ErrorCode;
use crate::gatt::Permission;

/// The security level of the underlying link, as negotiated below ATT.
///
/// Named and ordered after the `BT_SECURITY_*` levels BlueZ exposes via its L2CAP socket option
/// (`None < Low < Medium < High`); this crate never negotiates these itself, it only reads them
/// off the [`crate::socket::Socket`] the connection is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SecurityLevel {
    /// No security: unauthenticated, unencrypted.
    #[default]
    None,
    /// Unauthenticated pairing, no encryption.
    Low,
    /// Unauthenticated pairing with encryption.
    Medium,
    /// Authenticated pairing with encryption (MITM protection).
    High,
}

/// The kind of access being attempted, used to pick which half of a `Permission` set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Checks whether `access` against an attribute with permissions `granted`, over a link at
/// `security_level`, is allowed.
///
/// Checks run in a fixed order — Read, Write, Authentication, Encryption — and return the first
/// failure, per the permission gate's specified precedence.
pub fn check(access: Access, granted: Permission, security_level: SecurityLevel) -> Result<(), ErrorCode> {
    match access {
        Access::Read => {
            if !granted.contains(Permission::READ) {
                return Err(ErrorCode::ReadNotPermitted);
            }
        }
        Access::Write => {
            if !granted.contains(Permission::WRITE) {
                return Err(ErrorCode::WriteNotPermitted);
            }
        }
    }

    let requires_auth = match access {
        Access::Read => granted.contains(Permission::READ_AUTHENTICATION),
        Access::Write => granted.contains(Permission::WRITE_AUTHENTICATION),
    };
    if requires_auth && security_level < SecurityLevel::High {
        return Err(ErrorCode::InsufficientAuthentication);
    }

    let requires_encryption = match access {
        Access::Read => granted.contains(Permission::READ_ENCRYPT),
        Access::Write => granted.contains(Permission::WRITE_ENCRYPT),
    };
    if requires_encryption && security_level < SecurityLevel::Medium {
        return Err(ErrorCode::InsufficientEncryption);
    }

    Ok(())
}
