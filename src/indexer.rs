//! The forward scan that builds a [`StreamIndex`].
//!
//! Every unit of the container is read exactly once, in container order.
//! Units of the selected tracks are handed to the [`IndexBuilder`]; the rest
//! are ignored.

use crate::backend::{AudioDecoder, CompressedUnit, Container, TrackInfo};
use framedex_common::Result;
use framedex_index::{IndexBuilder, StreamIndex, UnitMeta};

/// Measures the PCM length of compressed audio frames.
struct FrameLengthProbe {
    fixed: Option<u32>,
    decoder: Box<dyn AudioDecoder>,
    block_align: u32,
}

impl FrameLengthProbe {
    /// Fixed codec frame size, then the parser hint, then the container
    /// duration, then a throwaway decode.
    fn frame_length(&mut self, unit: &CompressedUnit) -> u32 {
        if let Some(fixed) = self.fixed.filter(|&n| n > 0) {
            return fixed;
        }
        if let Some(parsed) = self.decoder.parse_frame_length(unit) {
            return parsed;
        }
        if let Some(duration) = unit.duration.filter(|&d| d > 0) {
            return duration;
        }
        if self.block_align == 0 {
            return 0;
        }
        match self.decoder.decode(unit) {
            Ok(pcm) => (pcm.len() / self.block_align as usize) as u32,
            Err(e) => {
                tracing::trace!("Frame length probe failed: {}", e);
                0
            }
        }
    }
}

fn unit_meta(unit: &CompressedUnit) -> UnitMeta {
    UnitMeta {
        pts: unit.pts,
        dts: unit.dts,
        byte_offset: unit.pos,
        keyframe: unit.keyframe,
    }
}

/// Scan `container` from its current position to the end of stream.
///
/// `record_limit` caps the records per track; exceeding it, like any failed
/// reservation, aborts the scan with [`framedex_common::Error::Allocation`].
pub fn build_index(
    container: &mut dyn Container,
    video: Option<&TrackInfo>,
    audio: Option<&TrackInfo>,
    record_limit: Option<usize>,
) -> Result<StreamIndex> {
    let info = container.info();
    let mut builder = IndexBuilder::new(info.traits()).record_limit(record_limit);

    if let Some(track) = video {
        builder = builder.with_video(track.time_base);
    }
    let mut probe = None;
    if let Some(track) = audio {
        let params = track.audio()?;
        builder = builder.with_audio(track.time_base, params.sample_rate);
        probe = Some(FrameLengthProbe {
            fixed: params.frame_size,
            decoder: container.open_audio_decoder(track)?,
            block_align: params.channels as u32 * params.bits_per_sample as u32 / 8,
        });
    }

    let video_track = video.map(|t| t.index);
    let audio_track = audio.map(|t| t.index);
    let mut scanned = 0u64;
    while let Some(unit) = container.read_unit()? {
        scanned += 1;
        if Some(unit.track) == video_track {
            builder.push_video(unit_meta(&unit))?;
        } else if Some(unit.track) == audio_track && builder.accepts_audio() {
            if let Some(probe) = probe.as_mut() {
                let length = probe.frame_length(&unit);
                builder.push_audio(unit_meta(&unit), length)?;
            }
        }
    }

    let index = builder.finish()?;
    tracing::debug!(
        "Indexed {} units of {}: {} video samples, {} audio frames",
        scanned,
        info.format_name,
        index.video.as_ref().map_or(0, |v| v.sample_count()),
        index.audio.as_ref().map_or(0, |a| a.frame_count()),
    );
    Ok(index)
}
