use core::fmt;
use core::str::FromStr;

use crate::RESOLUTION;

/// Input channel and gain, selected by the number of clock pulses per conversion.
///
/// The discriminant is the total pulse count: 24 data bits followed by one to three extra pulses.
/// The selection applies to the conversion after the one being read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConversionMode {
    /// Channel A, gain 128.
    #[default]
    ChannelA128 = 25,
    /// Channel B, gain 32.
    ChannelB32 = 26,
    /// Channel A, gain 64.
    ChannelA64 = 27,
}

impl ConversionMode {
    /// Total SCK pulses per conversion, also the pulse counter's compare value.
    pub const fn pulses(self) -> u32 {
        self as u32
    }

    /// Pulses clocked after the data bits.
    pub const fn extra_pulses(self) -> u32 {
        self.pulses() - RESOLUTION
    }

    /// Short name used in configuration: `a128`, `b32` or `a64`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChannelA128 => "a128",
            Self::ChannelB32 => "b32",
            Self::ChannelA64 => "a64",
        }
    }

    /// Iterate over all modes.
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::ChannelA128, Self::ChannelB32, Self::ChannelA64].into_iter()
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a mode name is not one of `a128`, `b32` or `a64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMode;

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown conversion mode, expected one of a128, b32, a64")
    }
}

impl FromStr for ConversionMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(UnknownMode)
    }
}
