//! The resolved stream index.
//!
//! Built once by [`IndexBuilder`](crate::IndexBuilder) and read-only for the
//! lifetime of a media handle.

use crate::addressing::AddressingMode;
use crate::record::{AudioFrameRecord, VideoFrameRecord};
use crate::store::{KeyframeMap, RecordStore};
use framedex_common::Rational;

/// Video records in presentation order plus the decode-order keyframe map.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoIndex {
    pub(crate) records: RecordStore<VideoFrameRecord>,
    pub(crate) keyframes: KeyframeMap,
    /// Slot `d - 1` holds the presentation number of decode-order sample `d`.
    pub(crate) presentation_of_decode: Vec<u32>,
    pub(crate) mode: AddressingMode,
    pub(crate) reordered: bool,
    pub(crate) time_base: Rational,
}

impl VideoIndex {
    /// Number of coded samples.
    pub fn sample_count(&self) -> u32 {
        self.records.len()
    }

    /// Record at a presentation-order sample number (1-origin).
    pub fn record(&self, presentation_number: u32) -> Option<&VideoFrameRecord> {
        self.records.get(presentation_number)
    }

    pub fn records(&self) -> &RecordStore<VideoFrameRecord> {
        &self.records
    }

    pub fn keyframes(&self) -> &KeyframeMap {
        &self.keyframes
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// Whether presentation order differs from decode order.
    pub fn is_reordered(&self) -> bool {
        self.reordered
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Keyframe flag of a presentation-order sample.
    pub fn is_keyframe(&self, presentation_number: u32) -> bool {
        self.record(presentation_number)
            .map(|r| r.keyframe)
            .unwrap_or(false)
    }

    /// Map a decode-order number to the record presenting it.
    pub fn record_by_decode_number(&self, decode_number: u32) -> Option<&VideoFrameRecord> {
        let slot = (decode_number as usize).checked_sub(1)?;
        let presentation = *self.presentation_of_decode.get(slot)?;
        self.records.get(presentation)
    }

    /// Largest gap between consecutive keyframes in seconds, by presentation
    /// timestamp.
    ///
    /// Returns `None` with fewer than two keyframes or without timestamps.
    pub fn max_keyframe_interval_secs(&self) -> Option<f64> {
        if !self.mode.has_timestamps() || !self.time_base.is_valid() {
            return None;
        }
        let keyframe_pts: Vec<i64> = self
            .records
            .iter()
            .filter(|r| r.keyframe)
            .filter_map(|r| r.pts)
            .collect();
        if keyframe_pts.len() < 2 {
            return None;
        }
        let max_interval = keyframe_pts
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]))
            .max()?;
        Some(max_interval as f64 * self.time_base.as_f64())
    }
}

/// Audio records in decode order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioIndex {
    pub(crate) records: RecordStore<AudioFrameRecord>,
    pub(crate) mode: AddressingMode,
    /// Frame length when every frame decodes to the same number of samples.
    pub(crate) constant_frame_length: Option<u32>,
    pub(crate) time_base: Rational,
    pub(crate) sample_rate: u32,
}

impl AudioIndex {
    /// Number of compressed frames.
    pub fn frame_count(&self) -> u32 {
        self.records.len()
    }

    pub fn record(&self, frame_number: u32) -> Option<&AudioFrameRecord> {
        self.records.get(frame_number)
    }

    pub fn records(&self) -> &RecordStore<AudioFrameRecord> {
        &self.records
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn constant_frame_length(&self) -> Option<u32> {
        self.constant_frame_length
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sum of all frame lengths in PCM samples.
    pub fn total_length(&self) -> u64 {
        self.records.iter().map(|r| r.length as u64).sum()
    }
}

/// Everything learned from the open-time scan.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamIndex {
    pub video: Option<VideoIndex>,
    pub audio: Option<AudioIndex>,
    /// Audio start minus video start, in audio samples.
    pub sync_offset: i64,
}

impl StreamIndex {
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}
