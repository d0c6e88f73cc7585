use crate::base::error::Result;
use crate::base::telegram::Telegram;
use std::io;
use std::net::{Shutdown, TcpStream};

/// Defines the behavior for decoding byte streams into `Telegram` objects.
pub trait ProtocolDecoder {
    /// Attempts to decode a `Telegram` from the provided buffer.
    ///
    /// Returns a `Result` containing a tuple:
    /// * The number of bytes consumed from the buffer.
    /// * An `Option<Telegram>` which is `Some` if a complete frame was decoded, or `None` otherwise.
    ///
    /// # Arguments
    ///
    /// * `buf` - The byte slice containing the data to decode.
    fn decode(&mut self, buf: &[u8]) -> Result<(usize, Option<Telegram>)>;

    /// Bytes of the last `decode` input taken up by a frame that failed its integrity check.
    ///
    /// Only meaningful right after `decode` failed with `Error::ChecksumMismatch`; the frame
    /// was read in full, so whatever follows it can still be decoded.
    fn rejected_bytes(&self) -> usize;

    /// Resets the internal state of the decoder.
    /// This is typically called after a communication error or when starting a new session.
    fn reset_decoder(&mut self);
}

/// Defines the behavior for encoding `Telegram` objects into byte streams.
pub trait ProtocolEncoder {
    /// Encodes a `Telegram` into the provided byte buffer.
    ///
    /// Returns the number of bytes written to the buffer upon successful encoding.
    fn encode(&mut self, telegram: &Telegram, bytes: &mut [u8]) -> Result<usize>;

    /// Estimates the maximum size in bytes required to encode the given `Telegram`.
    /// The actual encoded size must be less than or equal to this estimate.
    fn estimate_encoded_size(&mut self, telegram: &Telegram) -> Result<usize>;

    /// Encodes a `Telegram` and writes it directly to a `Write` target (e.g., a TCP socket).
    ///
    /// Returns the number of bytes successfully written to the destination.
    fn write_to(&mut self, telegram: &Telegram, dest: &mut impl io::Write) -> Result<usize>;

    /// Resets the internal state of the encoder.
    fn reset_encoder(&mut self);
}

/// A byte link to the sensor that can be closed explicitly.
pub trait Transport: io::Read + io::Write {
    /// Releases the link. The default does nothing.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}
