//! Per-sample index records.
//!
//! Timestamps are in the track's own time base. `None` means the demuxer did
//! not know the value, which later rules out the matching addressing mode.

/// One coded video sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoFrameRecord {
    /// Position in decode order (1-origin). Preserved when the index is
    /// re-sorted into presentation order.
    pub sample_number: u32,
    /// Presentation timestamp.
    pub pts: Option<i64>,
    /// Decode timestamp.
    pub dts: Option<i64>,
    /// Byte position of the unit in the container.
    pub byte_offset: Option<u64>,
    /// Whether the unit is a random-access point.
    pub keyframe: bool,
    /// Presented before the most recent keyframe, so it cannot be decoded
    /// correctly when decoding starts at that keyframe.
    pub leading: bool,
}

/// One compressed audio frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioFrameRecord {
    /// Position in decode order (1-origin).
    pub sample_number: u32,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub byte_offset: Option<u64>,
    /// Decoded PCM samples per channel produced by this frame.
    pub length: u32,
}
