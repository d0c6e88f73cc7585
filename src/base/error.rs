use std::error;
use std::fmt;
use std::io;

/// Represents errors that can occur while talking to an LMS400.
#[derive(Debug)]
pub enum Error {
    /// The operation needs an open session but the device is disconnected.
    NotConnected,

    /// `connect` was called on a device that already has an open session.
    AlreadyConnected,

    /// The execution of operation failed. Contains a description of the failure.
    OperationFail { description: String },

    /// No complete telegram arrived before the read deadline.
    OperationTimeout,

    /// The device answered with a SOPAS fault telegram (`sFA FF`).
    ProtocolFault { telegram: String },

    /// The device answered, but not with the telegram the handshake required.
    UnexpectedAnswer { expected: String, received: String },

    /// The decoding data is invalid according to current protocol. Contains a description of the protocol error.
    ProtocolError { description: String },

    /// The checksum byte trailing a frame does not match its payload.
    ChecksumMismatch { received: u8, calculated: u8 },

    /// A reset was requested while measurements were being captured.
    Cancelled,

    /// There is no data to process or save.
    EmptyResult,

    /// The buffer provided is too small for frame encoding.
    BufferTooSmall,

    /// An I/O error occurred while communicating with the underlying stream (e.g., TCP socket).
    IoError(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConnected => write!(f, "device is not connected"),
            Error::AlreadyConnected => write!(f, "device is already connected"),
            Error::OperationFail { description } => write!(f, "operation failed: {}", description),
            Error::OperationTimeout => write!(f, "operation timeout"),
            Error::ProtocolFault { telegram } => write!(f, "device fault: {}", telegram),
            Error::UnexpectedAnswer { expected, received } => write!(
                f,
                "unexpected answer: expected '{}', got '{}'",
                expected, received
            ),
            Error::ProtocolError { description } => write!(f, "protocol error: {}", description),
            Error::ChecksumMismatch {
                received,
                calculated,
            } => write!(
                f,
                "checksum mismatch: received {:02X}, calculated {:02X}",
                received, calculated
            ),
            Error::Cancelled => write!(f, "cancelled by reset request"),
            Error::EmptyResult => write!(f, "no data available"),
            Error::BufferTooSmall => write!(f, "buffer is too small for frame encoding"),
            Error::IoError(err) => write!(f, "io error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl Error {
    /// Returns `true` for failures of the link itself (socket errors and read deadlines),
    /// as opposed to answers the device sent.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::IoError(_) | Error::OperationTimeout)
    }
}

/// A specialized `Result` type for LMS400 operations.
pub type Result<T> = std::result::Result<T, Error>;
