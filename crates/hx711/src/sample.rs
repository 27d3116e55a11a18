use crate::{Event, RESOLUTION};

/// Sign-extend the low `bits` of `raw`, read as two's complement, to a full `i32`.
///
/// `bits` must be in `1..=32`.
pub const fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

/// Bits of one conversion, assembled MSB first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleAccumulator {
    value: u32,
    count: u32,
}

impl SampleAccumulator {
    pub const fn new() -> Self {
        Self { value: 0, count: 0 }
    }

    /// Store the next bit. Bits beyond the resolution are dropped.
    pub fn push(&mut self, bit: bool) {
        if self.is_complete() {
            return;
        }

        self.value |= (bit as u32) << (RESOLUTION - 1 - self.count);
        self.count += 1;
    }

    /// Bits captured so far.
    pub const fn count(&self) -> u32 {
        self.count
    }

    pub const fn raw(&self) -> u32 {
        self.value
    }

    pub const fn is_complete(&self) -> bool {
        self.count == RESOLUTION
    }

    /// A complete accumulator becomes a reading, anything else an error with the partial bits.
    pub fn into_event(self) -> Event {
        if self.is_complete() {
            Event::DataReady(sign_extend(self.value, RESOLUTION))
        } else {
            Event::DataError(self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(raw: u32, bits: u32) -> i32 {
        let raw = i64::from(raw);
        let half = 1i64 << (bits - 1);
        (if raw >= half { raw - (1i64 << bits) } else { raw }) as i32
    }

    #[test]
    fn sign_extend_24_bit_corners() {
        assert_eq!(sign_extend(0x80_0000, 24), -8_388_608);
        assert_eq!(sign_extend(0x7F_FFFF, 24), 8_388_607);
        assert_eq!(sign_extend(0x00_0000, 24), 0);
        assert_eq!(sign_extend(0xFF_FFFF, 24), -1);
        assert_eq!(sign_extend(0x00_0001, 24), 1);
    }

    #[test]
    fn sign_extend_matches_twos_complement() {
        // Every value for the narrow widths.
        for bits in 1..=14 {
            for raw in 0..(1u32 << bits) {
                assert_eq!(sign_extend(raw, bits), reference(raw, bits), "{bits} bits, {raw:#x}");
            }
        }

        // A stride through the 24 bit range, hitting both halves.
        for raw in (0..(1u32 << 24)).step_by(4099) {
            assert_eq!(sign_extend(raw, 24), reference(raw, 24), "{raw:#x}");
        }

        assert_eq!(sign_extend(0x8000_0000, 32), i32::MIN);
        assert_eq!(sign_extend(0x7FFF_FFFF, 32), i32::MAX);
    }

    #[test]
    fn msb_first() {
        let mut acc = SampleAccumulator::new();
        acc.push(true);
        for _ in 1..RESOLUTION {
            acc.push(false);
        }

        assert!(acc.is_complete());
        assert_eq!(acc.raw(), 0x80_0000);
        assert_eq!(acc.into_event(), Event::DataReady(-8_388_608));
    }

    #[test]
    fn partial_is_error() {
        let mut acc = SampleAccumulator::new();
        for bit in [true, false, true] {
            acc.push(bit);
        }

        assert_eq!(acc.count(), 3);
        assert_eq!(acc.into_event(), Event::DataError(0xA0_0000));
    }

    #[test]
    fn extra_bits_dropped() {
        let mut acc = SampleAccumulator::new();
        for _ in 0..RESOLUTION + 3 {
            acc.push(true);
        }

        assert_eq!(acc.count(), RESOLUTION);
        assert_eq!(acc.raw(), 0xFF_FFFF);
        assert_eq!(acc.into_event(), Event::DataReady(-1));
    }
}
