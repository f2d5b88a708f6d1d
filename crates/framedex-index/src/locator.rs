//! Random-access point lookup.
//!
//! Video lookups walk the decode-order keyframe map backwards from the target.
//! A target marked leading skips the first keyframe it meets, since decoding
//! from there would not reproduce it. Audio lookups map a PCM sample position
//! onto the frame containing it.

use crate::addressing::SeekKey;
use crate::index::{AudioIndex, VideoIndex};

/// Where decoding restarts for a requested sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomAccessPoint {
    /// Decode-order number of the unit decoding starts at.
    pub decode_number: u32,
    /// Key to hand to the demuxer.
    pub key: SeekKey,
}

impl VideoIndex {
    /// Find the random-access point for a presentation-order sample.
    pub fn find_random_access_point(&self, presentation_number: u32) -> Option<RandomAccessPoint> {
        let record = self.record(presentation_number)?;
        let decode_number = self.walk_back(record.sample_number, record.leading);
        Some(self.random_access_point(decode_number))
    }

    /// Find a random-access point at or before `decode_start`, used when
    /// retrying from further back than a failed attempt. `leading` is the
    /// flag of the sample being retried and skips one more keyframe.
    pub fn find_random_access_point_from(&self, decode_start: u32, leading: bool) -> RandomAccessPoint {
        let decode_number = self.walk_back(decode_start.min(self.keyframes.len()), leading);
        self.random_access_point(decode_number)
    }

    fn walk_back(&self, mut decode_number: u32, mut leading: bool) -> u32 {
        while decode_number > 0 {
            if self.keyframes.is_keyframe(decode_number) {
                if !leading {
                    break;
                }
                leading = false;
            }
            decode_number -= 1;
        }
        decode_number.max(1)
    }

    /// Seek key of a decode-order sample under this track's addressing mode.
    pub fn random_access_point(&self, decode_number: u32) -> RandomAccessPoint {
        let key = match self.record_by_decode_number(decode_number) {
            Some(r) => self
                .mode
                .seek_key(r.byte_offset, r.pts, r.dts, r.sample_number),
            None => SeekKey::DecodeOrder(decode_number),
        };
        RandomAccessPoint { decode_number, key }
    }
}

/// Position of a PCM sample within the compressed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPosition {
    /// Frame containing the sample (1-origin, decode order).
    pub frame_number: u32,
    /// Samples to discard from the start of that frame's output.
    pub samples_into_frame: u64,
}

impl AudioIndex {
    /// Locate the frame containing `sample` (0-origin PCM position).
    ///
    /// `scale` multiplies every recorded frame length, for decoders that
    /// output more samples than the container declares. Returns `None` past
    /// the end of the track.
    pub fn locate(&self, sample: u64, scale: u32) -> Option<AudioPosition> {
        let scale = scale.max(1) as u64;
        let mut frame_start = 0u64;
        for (frame_number, record) in self.records.numbered() {
            let frame_end = frame_start + record.length as u64 * scale;
            if sample < frame_end {
                return Some(AudioPosition {
                    frame_number,
                    samples_into_frame: sample - frame_start,
                });
            }
            frame_start = frame_end;
        }
        None
    }

    /// Seek target for decoding a frame.
    ///
    /// Under byte addressing, frames without a known offset are skipped
    /// backwards; when none before the frame has one, the timestamp key
    /// spaces are used instead.
    pub fn random_access_point(&self, frame_number: u32) -> RandomAccessPoint {
        if self.mode.byte_offset {
            let found = (1..=frame_number.min(self.frame_count()))
                .rev()
                .find_map(|n| {
                    let offset = self.records.get(n)?.byte_offset?;
                    Some((n, offset))
                });
            if let Some((decode_number, offset)) = found {
                return RandomAccessPoint {
                    decode_number,
                    key: SeekKey::ByteOffset(offset),
                };
            }
        }
        let mut mode = self.mode;
        mode.byte_offset = false;
        let key = match self.records.get(frame_number) {
            Some(r) => mode.seek_key(None, r.pts, r.dts, r.sample_number),
            None => SeekKey::DecodeOrder(frame_number),
        };
        RandomAccessPoint {
            decode_number: frame_number,
            key,
        }
    }
}
