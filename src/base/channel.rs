use crate::base::error::{Error, Result};
use crate::base::ring_byte_buffer::RingByteBuffer;
use crate::base::telegram::Telegram;
use crate::base::traits::{ProtocolDecoder, ProtocolEncoder, Transport};
use log::{error, trace, warn};
use std::io;
use std::time::{Duration, Instant};

const DEFAULT_CHANNEL_READ_BUFFER_SIZE: usize = 4096;

/// Channel encodes and decodes telegrams with a protocol, and sends and receives bytes via a stream.
///
/// Only one decode may be in flight on a channel at a time; the `&mut self` receivers enforce it.
///
/// # Examples
/// ```ignore
/// let mut channel = Channel::new(ColaProtocol::new(), Box::new(tcp_stream));
/// channel.write(&Telegram::from_command("sMN mLRstopdata"))?;
/// let ack = channel.read_until(Duration::from_secs(2))?;
/// ```
#[derive(Debug)]
pub struct Channel<P, T: ?Sized> {
    protocol: P,
    stream: Box<T>,
    read_buffer: RingByteBuffer,
}

impl<P, T: ?Sized> Channel<P, T>
where
    P: ProtocolDecoder + ProtocolEncoder,
    T: Transport,
{
    /// Create a new `Channel` to read and write telegrams.
    pub fn new(protocol: P, stream: Box<T>) -> Channel<P, T> {
        trace!(
            "Creating new Channel with default buffer size {}",
            DEFAULT_CHANNEL_READ_BUFFER_SIZE
        );
        Channel::with_read_buffer_size(protocol, stream, DEFAULT_CHANNEL_READ_BUFFER_SIZE)
    }

    /// Create a new `Channel` with non-default ring buffer capacity.
    pub fn with_read_buffer_size(
        protocol: P,
        stream: Box<T>,
        read_buffer_size: usize,
    ) -> Channel<P, T> {
        trace!("Creating new Channel with buffer size {}", read_buffer_size);
        let mut chn = Channel {
            protocol,
            stream,
            read_buffer: RingByteBuffer::with_capacity(read_buffer_size),
        };

        chn.reset();
        chn
    }

    /// Reset the channel status.
    ///
    /// Resets the protocol encoder and decoder and drops any buffered bytes. Used when a
    /// session starts and after a communication error left a frame half-read.
    pub fn reset(&mut self) {
        trace!("Resetting Channel protocol encoder and decoder");
        self.protocol.reset_encoder();
        self.protocol.reset_decoder();
        self.read_buffer.clear();
    }

    /// Read one telegram, waiting at most `timeout` for it to complete.
    ///
    /// Fails with `OperationTimeout` when the deadline passes and with an `IoError` of kind
    /// `UnexpectedEof` when the peer closes the stream before the frame is complete. A frame
    /// failing its checksum is reported as `ChecksumMismatch`; the frames buffered behind it are
    /// kept for the next call. Other decode errors drop the buffered bytes.
    pub fn read_until(&mut self, timeout: Duration) -> Result<Telegram> {
        trace!("Channel read_until called with timeout {:?}", timeout);
        let start = Instant::now();

        loop {
            // 1. Decode whatever is buffered first
            while !self.read_buffer.is_empty() {
                let buffer_slice = self.read_buffer.current_read_slice();
                trace!(
                    "Attempting to decode buffered data ({} bytes)",
                    buffer_slice.len()
                );
                let (decoded_bytes, telegram) = match self.protocol.decode(buffer_slice) {
                    Ok(decoded) => decoded,
                    Err(e @ Error::ChecksumMismatch { .. }) => {
                        // the bad frame was read in full, frames behind it stay buffered
                        let rejected = self.protocol.rejected_bytes();
                        warn!("Dropping {} bytes of a corrupted frame: {}", rejected, e);
                        self.read_buffer.skip_bytes(rejected);
                        return Err(e);
                    }
                    Err(e) => {
                        // frame boundaries are lost, resync from the next STX run
                        error!("Protocol decode error: {}", e);
                        self.protocol.reset_decoder();
                        self.read_buffer.clear();
                        return Err(e);
                    }
                };

                self.read_buffer.skip_bytes(decoded_bytes);
                if let Some(telegram) = telegram {
                    trace!(
                        "Decoded telegram of {} bytes ({} bytes left in buffer)",
                        telegram.len(),
                        self.read_buffer.len()
                    );
                    return Ok(telegram);
                }

                if decoded_bytes == 0 {
                    warn!(
                        "Protocol decode consumed 0 bytes with {} bytes buffered",
                        self.read_buffer.len()
                    );
                    if self.read_buffer.free_space() == 0 {
                        error!("Buffer full and decode consumed 0 bytes. Resetting decoder.");
                        self.protocol.reset_decoder();
                        return Err(Error::ProtocolError {
                            description: "decoder stalled on full buffer".to_owned(),
                        });
                    }
                    break;
                }
            }

            // 2. Check timeout before the next (poll-bounded) read
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!("Timed out after {:?} waiting for a telegram", elapsed);
                return Err(Error::OperationTimeout);
            }

            // 3. Pull more bytes from the stream
            match self.read_buffer.read_from(&mut self.stream) {
                Ok(0) => trace!("Stream read returned no data (poll timeout)"),
                Ok(bytes_read) => trace!(
                    "Read {} bytes from stream (buffer len: {})",
                    bytes_read,
                    self.read_buffer.len()
                ),
                Err(e) => {
                    error!("IO error reading from stream: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Write a telegram to the channel.
    pub fn write(&mut self, telegram: &Telegram) -> Result<usize> {
        trace!("Channel write called: {:?}", telegram);
        let written = self.protocol.write_to(telegram, &mut self.stream)?;
        self.stream.flush()?;
        trace!("Stream flushed after {} bytes", written);
        Ok(written)
    }

    /// Send a request and wait for the first telegram that comes back.
    pub fn invoke(&mut self, request: &Telegram, timeout: Duration) -> Result<Telegram> {
        trace!("Channel invoke called: {:?}, timeout={:?}", request, timeout);
        if let Err(e) = self.write(request) {
            error!("Invoke: failed to write request: {}", e);
            return Err(e);
        }
        self.read_until(timeout)
    }

    /// Close the underlying stream.
    pub fn close(&mut self) -> io::Result<()> {
        trace!("Closing channel stream");
        self.read_buffer.clear();
        self.stream.close()
    }
}
