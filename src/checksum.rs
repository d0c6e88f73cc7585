/// Running XOR checksum over the payload bytes of a CoLa-A frame.
///
/// The STX markers and the length field are not part of the checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    current: u8,
}

impl Checksum {
    /// Creates a new `Checksum` instance, initialized to 0.
    #[inline]
    pub fn new() -> Checksum {
        Checksum { current: 0 }
    }

    /// Checksum of a complete payload.
    #[inline]
    pub fn of(data: &[u8]) -> u8 {
        let mut checksum = Checksum::new();
        checksum.push_slice(data);
        checksum.checksum()
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.current ^= byte;
    }

    /// Includes a slice of bytes in the checksum calculation.
    #[inline]
    pub fn push_slice(&mut self, data: &[u8]) {
        for d in data {
            self.current ^= d;
        }
    }

    #[inline]
    pub fn checksum(&self) -> u8 {
        self.current
    }

    #[inline]
    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::Checksum;

    #[test]
    fn empty_payload_has_zero_checksum() {
        assert_eq!(Checksum::of(&[]), 0);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let payload = b"sMN mLRreqdata 0021";
        let mut checksum = Checksum::new();
        for b in payload.iter() {
            checksum.push(*b);
        }
        assert_eq!(checksum.checksum(), Checksum::of(payload));
        checksum.reset();
        assert_eq!(checksum.checksum(), 0);
    }
}
