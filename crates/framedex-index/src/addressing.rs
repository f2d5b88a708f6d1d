//! Addressing mode resolution.
//!
//! After the scan every track decides, by elimination, which key space a
//! seek request may use. Byte offsets are only tried on containers that seek
//! better by position; timestamps are dropped as soon as one record lacks
//! them.

use crate::record::{AudioFrameRecord, VideoFrameRecord};
use crate::store::RecordStore;

/// Container families that seek more reliably by byte position.
const BYTE_SEEK_FORMATS: &[&str] = &["mpeg", "mpegts"];

/// Properties of the container that constrain addressing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContainerTraits {
    /// Demuxer short name, possibly a comma-separated alias list.
    pub format_name: String,
    /// Byte-offset addressing should be attempted.
    pub prefers_byte_seek: bool,
    /// The demuxer refuses byte seeks.
    pub byte_seek_forbidden: bool,
}

impl ContainerTraits {
    /// Derive traits from the demuxer name.
    pub fn from_format_name(format_name: &str, byte_seek_forbidden: bool) -> Self {
        let prefers_byte_seek = format_name
            .split(',')
            .map(str::trim)
            .any(|name| BYTE_SEEK_FORMATS.contains(&name));
        Self {
            format_name: format_name.to_string(),
            prefers_byte_seek,
            byte_seek_forbidden,
        }
    }
}

/// Key spaces a track may be seeked by.
///
/// With no flag set, seeks use the decode-order sample number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressingMode {
    pub decode_ts: bool,
    pub presentation_ts: bool,
    pub byte_offset: bool,
}

impl AddressingMode {
    /// Starting candidates before any record is inspected.
    pub fn candidates(container: &ContainerTraits) -> Self {
        Self {
            decode_ts: true,
            presentation_ts: true,
            byte_offset: container.prefers_byte_seek,
        }
    }

    /// Whether seeks fall back to decode-order numbering.
    pub fn is_ordinal(&self) -> bool {
        !self.decode_ts && !self.presentation_ts && !self.byte_offset
    }

    /// Whether any timestamp addressing survived.
    pub fn has_timestamps(&self) -> bool {
        self.decode_ts || self.presentation_ts
    }

    /// Build a seek key by precedence: byte offset, presentation timestamp,
    /// decode timestamp, decode-order number. A missing value falls through
    /// to the next key space.
    pub fn seek_key(
        &self,
        byte_offset: Option<u64>,
        pts: Option<i64>,
        dts: Option<i64>,
        sample_number: u32,
    ) -> SeekKey {
        if self.byte_offset {
            if let Some(offset) = byte_offset {
                return SeekKey::ByteOffset(offset);
            }
        }
        if self.presentation_ts {
            if let Some(pts) = pts {
                return SeekKey::Presentation(pts);
            }
        }
        if self.decode_ts {
            if let Some(dts) = dts {
                return SeekKey::Decode(dts);
            }
        }
        SeekKey::DecodeOrder(sample_number)
    }
}

impl std::fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ordinal() {
            return write!(f, "ordinal");
        }
        let mut parts = Vec::new();
        if self.byte_offset {
            parts.push("byte");
        }
        if self.presentation_ts {
            parts.push("pts");
        }
        if self.decode_ts {
            parts.push("dts");
        }
        write!(f, "{}", parts.join("|"))
    }
}

/// A position handed to the demuxer's seek primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SeekKey {
    ByteOffset(u64),
    Presentation(i64),
    Decode(i64),
    DecodeOrder(u32),
}

/// Resolve the video addressing mode.
///
/// Returns the mode and whether the records were re-sorted into
/// presentation order.
pub fn resolve_video(
    records: &mut RecordStore<VideoFrameRecord>,
    container: &ContainerTraits,
) -> (AddressingMode, bool) {
    let mut mode = AddressingMode::candidates(container);

    if records.iter().any(|r| r.pts.is_none()) {
        mode.presentation_ts = false;
    }
    if records.iter().any(|r| r.dts.is_none()) {
        mode.decode_ts = false;
    }
    if mode.byte_offset
        && (container.byte_seek_forbidden || records.iter().any(|r| r.byte_offset.is_none()))
    {
        mode.byte_offset = false;
    }

    let mut reordered = false;
    if mode.presentation_ts {
        if has_reordering(records.as_slice()) {
            // Stable, so equal timestamps keep decode order.
            records.as_mut_slice().sort_by_key(|r| r.pts);
            reordered = true;
        }
    } else if mode.decode_ts {
        for record in records.as_mut_slice() {
            record.pts = record.dts;
        }
    }

    tracing::debug!(
        "Video addressing resolved to {} over {} samples (reordered: {})",
        mode,
        records.len(),
        reordered
    );
    (mode, reordered)
}

/// Resolve the audio addressing mode.
///
/// Presentation addressing is only kept when decode addressing was rejected.
/// Audio is never re-sorted.
pub fn resolve_audio(
    records: &mut RecordStore<AudioFrameRecord>,
    container: &ContainerTraits,
) -> AddressingMode {
    let mut mode = AddressingMode::candidates(container);

    if records.iter().any(|r| r.pts.is_none()) {
        mode.presentation_ts = false;
    }
    if records.iter().any(|r| r.dts.is_none()) {
        mode.decode_ts = false;
    }
    if mode.byte_offset
        && (container.byte_seek_forbidden || records.iter().all(|r| r.byte_offset.is_none()))
    {
        mode.byte_offset = false;
    }

    if mode.decode_ts {
        if !mode.presentation_ts {
            for record in records.as_mut_slice() {
                record.pts = record.dts;
            }
        }
        mode.presentation_ts = false;
    }

    tracing::debug!(
        "Audio addressing resolved to {} over {} frames",
        mode,
        records.len()
    );
    mode
}

fn has_reordering(records: &[VideoFrameRecord]) -> bool {
    records.windows(2).any(|w| w[1].pts < w[0].pts)
}
