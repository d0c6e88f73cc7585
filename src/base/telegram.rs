use std::borrow::Cow;
use std::fmt;

/// One complete protocol payload: a command, an acknowledge, or a measurement-data answer.
///
/// The payload is kept as raw bytes. Command and answer telegrams are ASCII, measurement
/// answers carry binary fields.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Telegram {
    /// Bytes between the length header and the checksum of a frame.
    pub payload: Vec<u8>,
}

impl Telegram {
    /// Creates a telegram from raw payload bytes.
    ///
    /// # Arguments
    ///
    /// * `payload` - A slice containing the payload data.
    #[inline]
    pub fn new(payload: &[u8]) -> Telegram {
        Telegram {
            payload: payload.to_vec(),
        }
    }

    /// Creates a telegram from an ASCII command string such as `sMN mLRstopdata`.
    #[inline]
    pub fn from_command(command: &str) -> Telegram {
        Telegram::new(command.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Lossy text view of the payload, for comparisons against ASCII answers and for logs.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Returns `true` if `marker` occurs anywhere in the payload.
    pub fn contains(&self, marker: &[u8]) -> bool {
        if marker.is_empty() {
            return true;
        }
        self.payload
            .windows(marker.len())
            .any(|window| window == marker)
    }
}

impl From<Vec<u8>> for Telegram {
    fn from(payload: Vec<u8>) -> Self {
        Telegram { payload }
    }
}

impl fmt::Debug for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "Telegram({:?})", self.text())
        } else {
            write!(f, "Telegram({} bytes)", self.payload.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Telegram;

    #[test]
    fn contains_finds_fault_marker() {
        let telegram = Telegram::from_command("sFA FF something");
        assert!(telegram.contains(b"sFA FF"));
        assert!(!telegram.contains(b"sAN"));
    }

    #[test]
    fn debug_output_depends_on_payload_kind() {
        let ascii = Telegram::from_command("sMA mLRreqdata");
        assert_eq!(format!("{:?}", ascii), "Telegram(\"sMA mLRreqdata\")");

        let binary = Telegram::new(&[0x00, 0x01, 0xFF]);
        assert_eq!(format!("{:?}", binary), "Telegram(3 bytes)");
    }
}
