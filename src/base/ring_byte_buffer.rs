use std::cmp::min;
use std::io::{self, Read, Write};

/// A ring byte buffer sitting between the socket and the frame decoder.
///
/// Bytes are read from the stream into the free region and handed to the decoder from the
/// readable region, wrapping around the end of the backing storage.
#[derive(Debug, Clone, PartialEq)]
pub struct RingByteBuffer {
    buf: Vec<u8>,
    head: usize,
    size: usize,
}

impl RingByteBuffer {
    /// Creates a new `RingByteBuffer` with the specified capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of bytes the buffer can hold.
    pub fn with_capacity(capacity: usize) -> RingByteBuffer {
        RingByteBuffer {
            buf: vec![0; capacity],
            head: 0,
            size: 0,
        }
    }

    /// Returns the number of bytes currently stored in the buffer.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the total capacity of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the amount of free space available in the buffer in bytes.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.size
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }

    fn tail(&self) -> usize {
        (self.head + self.size) % self.buf.len()
    }

    /// Returns the contiguous readable slice starting at the oldest byte.
    ///
    /// The slice might not contain all readable data if the data wraps around the end of the
    /// internal buffer.
    pub fn current_read_slice(&self) -> &[u8] {
        let end = min(self.head + self.size, self.buf.len());
        &self.buf[self.head..end]
    }

    /// Removes up to `bytes` bytes from the beginning of the readable data.
    ///
    /// Returns the actual number of bytes skipped.
    pub fn skip_bytes(&mut self, bytes: usize) -> usize {
        let skipped = min(self.size, bytes);
        self.head = (self.head + skipped) % self.buf.len();
        self.size -= skipped;
        skipped
    }

    fn current_write_slice(&mut self) -> &mut [u8] {
        let current_end = self.tail();
        let write_buf_end = min(self.buf.len(), current_end + self.free_space());
        &mut self.buf[current_end..write_buf_end]
    }

    fn mark_bytes_as_written(&mut self, bytes: usize) {
        let written = min(self.free_space(), bytes);
        self.size += written;
    }

    /// One `read` call into the contiguous free region.
    ///
    /// A read timeout yields `Ok(0)`. A zero-length read into a non-empty region means the
    /// peer closed the stream and is reported as `UnexpectedEof`.
    fn partial_read_from(&mut self, upstream: &mut impl Read) -> io::Result<usize> {
        let region = self.current_write_slice();
        if region.is_empty() {
            return Ok(0);
        }

        match upstream.read(region) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed by peer",
            )),
            Ok(read) => {
                self.mark_bytes_as_written(read);
                Ok(read)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// Reads data from an upstream source and fills the buffer.
    ///
    /// A second read is issued only when the first one filled the region up to the end of the
    /// backing storage, so that a wrapped free region is used without blocking on a stream that
    /// has nothing more to give.
    pub fn read_from(&mut self, upstream: &mut impl Read) -> io::Result<usize> {
        let region_len = self.current_write_slice().len();
        let read = self.partial_read_from(upstream)?;

        if read == region_len && self.free_space() > 0 {
            match self.partial_read_from(upstream) {
                Ok(latter_read) => Ok(read + latter_read),
                // the close is reported by the next call, once the buffered bytes are decoded
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(read),
                Err(err) => Err(err),
            }
        } else {
            Ok(read)
        }
    }
}

impl Write for RingByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = {
            let current_write_slice = self.current_write_slice();
            let written = min(current_write_slice.len(), buf.len());
            current_write_slice[0..written].clone_from_slice(&buf[0..written]);
            written
        };
        self.mark_bytes_as_written(written);

        let latter_written = {
            let current_write_slice = self.current_write_slice();
            let latter_written = min(current_write_slice.len(), buf.len() - written);
            current_write_slice[0..latter_written]
                .clone_from_slice(&buf[written..written + latter_written]);
            latter_written
        };
        self.mark_bytes_as_written(latter_written);

        Ok(written + latter_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RingByteBuffer;
    use std::io::{self, Cursor, Write};

    #[test]
    fn write_wraps_around() {
        let mut buffer = RingByteBuffer::with_capacity(4);
        assert_eq!(buffer.write(&[1, 2, 3]).unwrap(), 3);
        assert_eq!(buffer.skip_bytes(2), 2);
        assert_eq!(buffer.write(&[4, 5, 6]).unwrap(), 3);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.free_space(), 0);
        assert_eq!(buffer.current_read_slice(), &[3, 4]);
        buffer.skip_bytes(2);
        assert_eq!(buffer.current_read_slice(), &[5, 6]);
    }

    #[test]
    fn read_from_reports_end_of_stream() {
        let mut buffer = RingByteBuffer::with_capacity(8);
        let mut upstream = Cursor::new(vec![9u8, 8, 7]);
        assert_eq!(buffer.read_from(&mut upstream).unwrap(), 3);
        let err = buffer.read_from(&mut upstream).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(buffer.current_read_slice(), &[9, 8, 7]);
    }

    #[test]
    fn read_from_fills_wrapped_region() {
        let mut buffer = RingByteBuffer::with_capacity(4);
        buffer.write_all(&[0, 0, 0]).unwrap();
        buffer.skip_bytes(3);
        let mut upstream = Cursor::new(vec![1u8, 2, 3, 4]);
        assert_eq!(buffer.read_from(&mut upstream).unwrap(), 4);
        assert_eq!(buffer.current_read_slice(), &[1]);
        buffer.skip_bytes(1);
        assert_eq!(buffer.current_read_slice(), &[2, 3, 4]);
    }

    #[test]
    fn full_buffer_reads_nothing() {
        let mut buffer = RingByteBuffer::with_capacity(2);
        buffer.write_all(&[1, 2]).unwrap();
        let mut upstream = Cursor::new(vec![3u8]);
        assert_eq!(buffer.read_from(&mut upstream).unwrap(), 0);
    }
}
