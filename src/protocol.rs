use crate::base::{Error, ProtocolDecoder, ProtocolEncoder, Result, Telegram};
use crate::checksum::Checksum;
use byteorder::{BigEndian, ByteOrder};
use log::{error, trace, warn};
use std::cmp::min;
use std::io::Write;

/// Start-of-frame marker, sent four times in front of every frame.
pub const COLA_STX: u8 = 0x02;

const COLA_STX_COUNT: usize = 4;

const COLA_LENGTH_FIELD_SIZE: usize = 4;

const COLA_CHECKSUM_SIZE: usize = 1;

/// Frame bytes that are not payload: STX run, length field and checksum.
pub const COLA_FRAME_OVERHEAD: usize = COLA_STX_COUNT + COLA_LENGTH_FIELD_SIZE + COLA_CHECKSUM_SIZE;

/// Largest payload the decoder accepts. Measurement telegrams are a few kilobytes at most.
pub const COLA_MAX_PAYLOAD_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecodeStatus {
    WaitStx(usize),
    WaitLength,
    ReceivePayload,
    WaitChecksum,
}

/// The binary CoLa-A framing used by the LMS400 on its TCP port.
///
/// A frame is `STX STX STX STX | length (u32, big-endian) | payload | checksum`, where the
/// checksum is the XOR of the payload bytes.
///
/// The decoder is incremental: it accepts any split of the incoming bytes and hands back a
/// `Telegram` once the checksum byte has been read and verified.
#[derive(Debug, Clone, PartialEq)]
pub struct ColaProtocol {
    status: DecodeStatus,
    length_field: Vec<u8>,
    payload_size: usize,
    checksum: Checksum,
    decoding: Telegram,
    rejected_bytes: usize,
}

impl ColaProtocol {
    pub fn new() -> ColaProtocol {
        trace!("Creating new ColaProtocol");
        ColaProtocol {
            status: DecodeStatus::WaitStx(0),
            length_field: Vec::with_capacity(COLA_LENGTH_FIELD_SIZE),
            payload_size: 0,
            checksum: Checksum::new(),
            decoding: Telegram::default(),
            rejected_bytes: 0,
        }
    }

    fn start_wait_stx(&mut self, stx_index: usize) {
        trace!("Decoder state -> WaitStx({})", stx_index);
        self.status = DecodeStatus::WaitStx(stx_index);
        if stx_index == 0 {
            self.length_field.clear();
            self.payload_size = 0;
        }
    }

    fn start_wait_length(&mut self) {
        trace!("Decoder state -> WaitLength");
        self.status = DecodeStatus::WaitLength;
        self.length_field.clear();
    }

    fn start_receive_payload(&mut self) {
        trace!(
            "Decoder state -> ReceivePayload (size: {})",
            self.payload_size
        );
        self.status = DecodeStatus::ReceivePayload;
        self.checksum.reset();
        self.decoding = Telegram {
            payload: Vec::with_capacity(self.payload_size),
        };
    }

    fn start_wait_checksum(&mut self) {
        trace!("Decoder state -> WaitChecksum");
        self.status = DecodeStatus::WaitChecksum;
    }

    fn decode_stx(&mut self, stx_index: usize, byte: u8) {
        if byte != COLA_STX {
            if stx_index > 0 {
                warn!(
                    "Expected STX {} but got {:02X}, resyncing",
                    stx_index, byte
                );
            } else {
                trace!("Skipping {:02X} while waiting for frame start", byte);
            }
            self.start_wait_stx(0);
        } else if stx_index == COLA_STX_COUNT - 1 {
            self.start_wait_length();
        } else {
            self.start_wait_stx(stx_index + 1);
        }
    }

    fn decode_length(&mut self, buf: &[u8]) -> Result<usize> {
        let bytes_to_read = COLA_LENGTH_FIELD_SIZE - self.length_field.len();
        let bytes_actual_read = min(bytes_to_read, buf.len());
        self.length_field
            .extend_from_slice(&buf[0..bytes_actual_read]);

        if self.length_field.len() == COLA_LENGTH_FIELD_SIZE {
            let declared = BigEndian::read_u32(&self.length_field) as usize;
            trace!("Length field decoded: {} payload bytes", declared);
            if declared > COLA_MAX_PAYLOAD_SIZE {
                error!(
                    "Declared payload length {} exceeds limit {}",
                    declared, COLA_MAX_PAYLOAD_SIZE
                );
                return Err(Error::ProtocolError {
                    description: format!("declared payload length {} is too large", declared),
                });
            }
            self.payload_size = declared;
            if declared == 0 {
                self.checksum.reset();
                self.decoding = Telegram::default();
                self.start_wait_checksum();
            } else {
                self.start_receive_payload();
            }
        }
        Ok(bytes_actual_read)
    }

    fn decode_payload(&mut self, buf: &[u8]) -> usize {
        let bytes_to_read = self.payload_size - self.decoding.payload.len();
        let bytes_actual_read = min(bytes_to_read, buf.len());
        let chunk = &buf[0..bytes_actual_read];
        self.checksum.push_slice(chunk);
        self.decoding.payload.extend_from_slice(chunk);
        trace!(
            "Payload buffer {}/{} bytes",
            self.decoding.payload.len(),
            self.payload_size
        );

        if self.decoding.payload.len() == self.payload_size {
            self.start_wait_checksum();
        }
        bytes_actual_read
    }

    fn decode_checksum(&mut self, received: u8) -> Result<Telegram> {
        let calculated = self.checksum.checksum();
        if received != calculated {
            error!(
                "Checksum mismatch: received {:02X}, calculated {:02X}",
                received, calculated
            );
            return Err(Error::ChecksumMismatch {
                received,
                calculated,
            });
        }
        trace!("Frame complete, checksum {:02X} OK", calculated);
        Ok(std::mem::take(&mut self.decoding))
    }
}

impl Default for ColaProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for ColaProtocol {
    /// Decodes bytes according to the CoLa-A framing.
    ///
    /// Returns the number of bytes consumed and the telegram completed by them, if any.
    /// Decoding stops right after a complete frame so that the caller sees frames one by one.
    fn decode(&mut self, buf: &[u8]) -> Result<(usize, Option<Telegram>)> {
        trace!(
            "decode called with {} bytes, current state: {:?}",
            buf.len(),
            self.status
        );
        self.rejected_bytes = 0;
        let mut i = 0;
        while i < buf.len() {
            match self.status {
                DecodeStatus::WaitStx(stx_index) => {
                    self.decode_stx(stx_index, buf[i]);
                    i += 1;
                }
                // the length field always starts with 0x00 below the payload limit, so any
                // further STX belongs to a longer marker run
                DecodeStatus::WaitLength
                    if self.length_field.is_empty() && buf[i] == COLA_STX =>
                {
                    trace!("Skipping extra STX before length field");
                    i += 1;
                }
                DecodeStatus::WaitLength => match self.decode_length(&buf[i..]) {
                    Ok(consumed) => i += consumed,
                    Err(e) => {
                        self.reset_decoder();
                        return Err(e);
                    }
                },
                DecodeStatus::ReceivePayload => {
                    i += self.decode_payload(&buf[i..]);
                }
                DecodeStatus::WaitChecksum => {
                    let result = self.decode_checksum(buf[i]);
                    self.reset_decoder();
                    if result.is_err() {
                        self.rejected_bytes = i + 1;
                    }
                    return result.map(|telegram| (i + 1, Some(telegram)));
                }
            }
        }
        Ok((i, None))
    }

    fn rejected_bytes(&self) -> usize {
        self.rejected_bytes
    }

    fn reset_decoder(&mut self) {
        trace!("Resetting decoder state");
        self.start_wait_stx(0);
        self.checksum.reset();
    }
}

impl ProtocolEncoder for ColaProtocol {
    /// Encodes a command telegram: STX run, big-endian length, payload verbatim, XOR checksum.
    fn encode(&mut self, telegram: &Telegram, bytes: &mut [u8]) -> Result<usize> {
        let encoded_size = self.estimate_encoded_size(telegram)?;
        if encoded_size > bytes.len() {
            error!(
                "Buffer too small: required {}, available {}",
                encoded_size,
                bytes.len()
            );
            return Err(Error::BufferTooSmall);
        }

        let payload = telegram.as_bytes();
        let payload_start = COLA_STX_COUNT + COLA_LENGTH_FIELD_SIZE;
        let payload_end = payload_start + payload.len();

        bytes[0..COLA_STX_COUNT].fill(COLA_STX);
        BigEndian::write_u32(
            &mut bytes[COLA_STX_COUNT..payload_start],
            payload.len() as u32,
        );
        bytes[payload_start..payload_end].copy_from_slice(payload);
        let checksum = Checksum::of(payload);
        bytes[payload_end] = checksum;

        trace!(
            "Encoded {:?} into {} bytes, checksum {:02X}",
            telegram,
            encoded_size,
            checksum
        );
        Ok(encoded_size)
    }

    fn estimate_encoded_size(&mut self, telegram: &Telegram) -> Result<usize> {
        if telegram.len() > u32::MAX as usize {
            return Err(Error::OperationFail {
                description: "payload does not fit the length field".to_owned(),
            });
        }
        Ok(COLA_FRAME_OVERHEAD + telegram.len())
    }

    fn write_to(&mut self, telegram: &Telegram, dest: &mut impl Write) -> Result<usize> {
        let mut buf = vec![0; self.estimate_encoded_size(telegram)?];
        let encoded_size = self.encode(telegram, &mut buf)?;
        match dest.write_all(&buf[0..encoded_size]) {
            Ok(()) => {
                trace!("Wrote {} bytes", encoded_size);
                Ok(encoded_size)
            }
            Err(err) => {
                error!("IO error during write_all: {}", err);
                Err(err.into())
            }
        }
    }

    /// The encoder keeps no state between frames.
    fn reset_encoder(&mut self) {}
}

/// Encodes a telegram into a freshly allocated frame.
pub fn encode_frame(telegram: &Telegram) -> Result<Vec<u8>> {
    let mut protocol = ColaProtocol::new();
    let mut buf = vec![0; protocol.estimate_encoded_size(telegram)?];
    let encoded_size = protocol.encode(telegram, &mut buf)?;
    buf.truncate(encoded_size);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(protocol: &mut ColaProtocol, bytes: &[u8]) -> Result<Vec<Telegram>> {
        let mut telegrams = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let (consumed, telegram) = protocol.decode(&bytes[offset..])?;
            offset += consumed;
            telegrams.extend(telegram);
        }
        Ok(telegrams)
    }

    #[test]
    fn protocol_encode() {
        let frame = encode_frame(&Telegram::from_command("sMN mLRstopdata")).unwrap();
        assert_eq!(&frame[0..8], &[0x02, 0x02, 0x02, 0x02, 0x00, 0x00, 0x00, 0x0F]);
        assert_eq!(&frame[8..23], b"sMN mLRstopdata");
        assert_eq!(frame[23], Checksum::of(b"sMN mLRstopdata"));
        assert_eq!(frame.len(), 24);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let mut protocol = ColaProtocol::new();
        let mut buf = [0u8; 8];
        assert!(matches!(
            protocol.encode(&Telegram::from_command("sMN"), &mut buf),
            Err(Error::BufferTooSmall)
        ));
    }

    #[test]
    fn decode_byte_by_byte() {
        let frame = encode_frame(&Telegram::from_command("sMA mLRreqdata")).unwrap();
        let mut protocol = ColaProtocol::new();
        for b in &frame[..frame.len() - 1] {
            assert_eq!(protocol.decode(&[*b]).unwrap(), (1, None));
        }
        let (consumed, telegram) = protocol.decode(&frame[frame.len() - 1..]).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(telegram.unwrap().text(), "sMA mLRreqdata");
    }

    #[test]
    fn decode_stops_after_each_frame() {
        let mut bytes = encode_frame(&Telegram::from_command("sMA mLRreqdata")).unwrap();
        let first_len = bytes.len();
        bytes.extend(encode_frame(&Telegram::from_command("sAN mLRreqdata 00000000")).unwrap());

        let mut protocol = ColaProtocol::new();
        let (consumed, telegram) = protocol.decode(&bytes).unwrap();
        assert_eq!(consumed, first_len);
        assert_eq!(telegram.unwrap().text(), "sMA mLRreqdata");

        let (_, telegram) = protocol.decode(&bytes[first_len..]).unwrap();
        assert_eq!(telegram.unwrap().text(), "sAN mLRreqdata 00000000");
    }

    #[test]
    fn decode_skips_leading_garbage() {
        let mut bytes = vec![0xFF, 0x02, 0x41, 0x02, 0x02];
        bytes.extend(encode_frame(&Telegram::from_command("sMA mLRstopdata")).unwrap());
        let telegrams = decode_all(&mut ColaProtocol::new(), &bytes).unwrap();
        assert_eq!(telegrams, vec![Telegram::from_command("sMA mLRstopdata")]);
    }

    #[test]
    fn decode_empty_payload() {
        let bytes = [0x02, 0x02, 0x02, 0x02, 0, 0, 0, 0, 0];
        let telegrams = decode_all(&mut ColaProtocol::new(), &bytes).unwrap();
        assert_eq!(telegrams, vec![Telegram::default()]);
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let mut frame = encode_frame(&Telegram::from_command("sAN mLRreqdata 00000000")).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x55;
        let mut bytes = vec![0xFF];
        bytes.extend_from_slice(&frame);
        bytes.extend(encode_frame(&Telegram::from_command("sMA mLRreqdata")).unwrap());

        let mut protocol = ColaProtocol::new();
        assert!(matches!(
            protocol.decode(&bytes),
            Err(Error::ChecksumMismatch { .. })
        ));
        let rejected = protocol.rejected_bytes();
        assert_eq!(rejected, frame.len() + 1);

        // the frame behind the rejected one is intact
        let (_, telegram) = protocol.decode(&bytes[rejected..]).unwrap();
        assert_eq!(telegram.unwrap().text(), "sMA mLRreqdata");
        assert_eq!(protocol.rejected_bytes(), 0);
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let bytes = [0x02, 0x02, 0x02, 0x02, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            ColaProtocol::new().decode(&bytes),
            Err(Error::ProtocolError { .. })
        ));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let telegram = Telegram::new(&payload);
            let frame = encode_frame(&telegram).unwrap();
            let telegrams = decode_all(&mut ColaProtocol::new(), &frame).unwrap();
            prop_assert_eq!(telegrams, vec![telegram]);
        }

        #[test]
        fn checksum_byte_is_payload_xor(command in "[ -~]{0,64}") {
            let frame = encode_frame(&Telegram::from_command(&command)).unwrap();
            let expected = command.bytes().fold(0u8, |acc, b| acc ^ b);
            prop_assert_eq!(frame[frame.len() - 1], expected);
            prop_assert_eq!(
                BigEndian::read_u32(&frame[4..8]) as usize,
                command.len()
            );
        }
    }
}
