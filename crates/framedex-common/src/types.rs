//! Core type definitions for tracks, seek tolerance and output formats.
//!
//! Enums serialize in lowercase so they can be written directly in the
//! TOML configuration file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video track.
    Video,
    /// Audio track.
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// How much decoding damage the caller tolerates when seeking.
///
/// Tiers are ordered: a read starts at `Normal` and may escalate up to the
/// policy the caller chose, never beyond it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SeekPolicy {
    /// Abort an attempt on any decode error.
    #[default]
    Normal,
    /// Tolerate decode errors while replaying from a random-access point.
    Unsafe,
    /// Tolerate everything and return best-effort output.
    Aggressive,
}

impl SeekPolicy {
    /// The next tier up, if it does not exceed `ceiling`.
    pub fn escalate(self, ceiling: SeekPolicy) -> Option<SeekPolicy> {
        let next = match self {
            Self::Normal => Self::Unsafe,
            Self::Unsafe => Self::Aggressive,
            Self::Aggressive => return None,
        };
        (next <= ceiling).then_some(next)
    }

    /// Whether decode errors during replay are ignored.
    pub fn tolerates_replay_errors(self) -> bool {
        self != Self::Normal
    }
}

impl fmt::Display for SeekPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Unsafe => write!(f, "unsafe"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for SeekPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "0" => Ok(Self::Normal),
            "unsafe" | "1" => Ok(Self::Unsafe),
            "aggressive" | "2" => Ok(Self::Aggressive),
            other => Err(format!("unknown seek policy: {other}")),
        }
    }
}

/// An unsigned rational, used for time bases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Value as a float; zero when the denominator is zero.
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    pub fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Packed pixel layout delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    /// 16-bit Y, Cb, Cr per pixel (6 bytes).
    Yc48,
    /// Packed 8-bit RGB (3 bytes).
    Rgb24,
    /// Packed 4:2:2 YUYV (2 bytes).
    Yuy2,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Yc48 => 6,
            Self::Rgb24 => 3,
            Self::Yuy2 => 2,
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yc48 => write!(f, "yc48"),
            Self::Rgb24 => write!(f, "rgb24"),
            Self::Yuy2 => write!(f, "yuy2"),
        }
    }
}

/// Decoded picture geometry reported by `prepare_video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_layout: PixelLayout,
    pub frame_rate: Rational,
}

impl FrameFormat {
    /// Bytes in one converted picture.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_layout.bytes_per_pixel() as usize
    }
}

/// Interleaved PCM format reported by `prepare_audio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Significant bits when the container sample is wider than the data.
    pub valid_bits_per_sample: u16,
}

impl AudioFormat {
    /// Bytes per interleaved sample frame.
    pub fn block_align(&self) -> u32 {
        self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn avg_bytes_per_sec(&self) -> u32 {
        self.sample_rate * self.block_align()
    }

    /// Whether plain PCM cannot describe this format and the extensible
    /// header is required.
    pub fn is_extensible(&self) -> bool {
        !matches!(self.bits_per_sample, 8 | 16)
    }

    /// Byte value representing silence.
    pub fn silence_byte(&self) -> u8 {
        if self.bits_per_sample == 8 {
            0x80
        } else {
            0
        }
    }
}
