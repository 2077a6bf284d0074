use std::fmt;

/// Errors returned by the byte codec layer.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Packet specified an invalid length value or was too short.
    ///
    /// This indicates a protocol violation, so the connection should be
    /// considered lost (if one is currently established).
    InvalidLength,

    /// Invalid value supplied for field.
    InvalidValue,

    /// Unexpectedly reached EOF while reading or writing data.
    ///
    /// This is returned when the application tries to fit too much data into a
    /// PDU or other fixed-size buffer, and also when reaching EOF prematurely
    /// while reading data from a buffer.
    Eof,

    /// Parsing didn't consume the entire buffer.
    IncompleteParse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidLength => "invalid length value specified",
            Error::InvalidValue => "invalid value for field",
            Error::Eof => "end of buffer",
            Error::IncompleteParse => "excess data in buffer",
        })
    }
}

impl std::error::Error for Error {}

/// Errors surfaced to the embedder of an [`AttConnection`](crate::connection::AttConnection).
///
/// These are distinct from [`Error`], which is about codec failures on individual PDUs.
/// `ConnectionError` is about the health of the bearer as a whole: either the transport
/// failed outright, or the server detected an internal invariant violation while building a
/// response and had to give up on the bearer.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConnectionError {
    /// The underlying socket returned an I/O error.
    Io(std::io::Error),

    /// An internal invariant was violated while handling a request.
    ///
    /// The bearer is torn down after this is returned; the peer only ever sees an
    /// `UnlikelyError` response (if a response was sent at all) before the connection drops.
    Invariant { detail: &'static str },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Io(e) => write!(f, "transport error: {}", e),
            ConnectionError::Invariant { detail } => {
                write!(f, "internal invariant violated: {}", detail)
            }
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Io(e) => Some(e),
            ConnectionError::Invariant { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

impl From<Error> for ConnectionError {
    /// A codec failure surfacing all the way to the connection means the server tried to encode
    /// a response into a buffer it had already sized for the negotiated MTU — an internal bug,
    /// not a transport problem.
    fn from(e: Error) -> Self {
        ConnectionError::Invariant {
            detail: match e {
                Error::InvalidLength => "invalid length value specified",
                Error::InvalidValue => "invalid value for field",
                Error::Eof => "end of buffer",
                Error::IncompleteParse => "excess data in buffer",
            },
        }
    }
}
