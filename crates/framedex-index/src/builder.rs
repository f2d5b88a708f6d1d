//! Stream index builder.
//!
//! The caller performs the single forward pass over the container and feeds
//! every unit of the selected tracks here in container order. `finish` then
//! resolves addressing, re-sorts video into presentation order and measures
//! the audio/video gap.

use crate::addressing::{resolve_audio, resolve_video, ContainerTraits};
use crate::index::{AudioIndex, StreamIndex, VideoIndex};
use crate::record::{AudioFrameRecord, VideoFrameRecord};
use crate::store::{KeyframeMap, RecordStore};
use crate::timing;
use framedex_common::{Rational, Result};

/// Audio indexing stops once this many PCM samples have been recorded.
pub const AUDIO_DURATION_CEILING: u64 = i32::MAX as u64;

/// Timing and addressing metadata of one demuxed unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitMeta {
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub byte_offset: Option<u64>,
    pub keyframe: bool,
}

struct VideoTrackBuilder {
    records: RecordStore<VideoFrameRecord>,
    last_keyframe_pts: Option<i64>,
    time_base: Rational,
}

struct AudioTrackBuilder {
    records: RecordStore<AudioFrameRecord>,
    duration: u64,
    constant_frame_length: bool,
    last_length: u32,
    time_base: Rational,
    sample_rate: u32,
}

/// Builder for a [`StreamIndex`].
pub struct IndexBuilder {
    container: ContainerTraits,
    record_limit: Option<usize>,
    video: Option<VideoTrackBuilder>,
    audio: Option<AudioTrackBuilder>,
}

impl IndexBuilder {
    /// Create a builder with no tracks selected.
    pub fn new(container: ContainerTraits) -> Self {
        Self {
            container,
            record_limit: None,
            video: None,
            audio: None,
        }
    }

    /// Cap the number of records per track. Exceeding it fails like an
    /// allocation failure.
    pub fn record_limit(mut self, limit: Option<usize>) -> Self {
        self.record_limit = limit;
        self
    }

    /// Select the video track.
    pub fn with_video(mut self, time_base: Rational) -> Self {
        self.video = Some(VideoTrackBuilder {
            records: RecordStore::with_limit(self.record_limit),
            last_keyframe_pts: None,
            time_base,
        });
        self
    }

    /// Select the audio track.
    pub fn with_audio(mut self, time_base: Rational, sample_rate: u32) -> Self {
        self.audio = Some(AudioTrackBuilder {
            records: RecordStore::with_limit(self.record_limit),
            duration: 0,
            constant_frame_length: true,
            last_length: 0,
            time_base,
            sample_rate,
        });
        self
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    /// Whether further audio units will be recorded. The scan may skip
    /// frame-length probing once this turns false.
    pub fn accepts_audio(&self) -> bool {
        self.audio
            .as_ref()
            .is_some_and(|a| a.duration <= AUDIO_DURATION_CEILING)
    }

    /// Record a video unit and return its decode-order sample number.
    pub fn push_video(&mut self, meta: UnitMeta) -> Result<Option<u32>> {
        let Some(track) = self.video.as_mut() else {
            return Ok(None);
        };
        let leading = matches!(
            (meta.pts, track.last_keyframe_pts),
            (Some(pts), Some(keyframe_pts)) if pts < keyframe_pts
        );
        let sample_number = track.records.len() + 1;
        track.records.push(VideoFrameRecord {
            sample_number,
            pts: meta.pts,
            dts: meta.dts,
            byte_offset: meta.byte_offset,
            keyframe: meta.keyframe,
            leading,
        })?;
        if meta.keyframe {
            track.last_keyframe_pts = meta.pts;
        }
        Ok(Some(sample_number))
    }

    /// Record an audio frame of `frame_length` PCM samples.
    ///
    /// Returns `None` when the track is not selected or the duration ceiling
    /// has been passed.
    pub fn push_audio(&mut self, meta: UnitMeta, frame_length: u32) -> Result<Option<u32>> {
        let Some(track) = self.audio.as_mut() else {
            return Ok(None);
        };
        if track.duration > AUDIO_DURATION_CEILING {
            return Ok(None);
        }
        track.duration += frame_length as u64;
        if track.duration > AUDIO_DURATION_CEILING {
            tracing::debug!("Audio index ceiling reached; skipping remaining frames");
            return Ok(None);
        }
        let sample_number = track.records.len() + 1;
        track.records.push(AudioFrameRecord {
            sample_number,
            pts: meta.pts,
            dts: meta.dts,
            byte_offset: meta.byte_offset,
            length: frame_length,
        })?;
        if sample_number > 1 && frame_length != track.last_length {
            track.constant_frame_length = false;
        }
        track.last_length = frame_length;
        Ok(Some(sample_number))
    }

    /// Resolve addressing and produce the immutable index.
    pub fn finish(self) -> Result<StreamIndex> {
        let video = match self.video {
            Some(track) => Some(finish_video(track, &self.container)?),
            None => None,
        };
        let audio = self.audio.map(|track| finish_audio(track, &self.container));

        let sync_offset = match (&video, &audio) {
            (Some(v), Some(a)) => timing::sync_offset(v, a),
            _ => 0,
        };

        Ok(StreamIndex {
            video,
            audio,
            sync_offset,
        })
    }
}

fn finish_video(mut track: VideoTrackBuilder, container: &ContainerTraits) -> Result<VideoIndex> {
    track.records.shrink_to_fit();
    let keyframes = KeyframeMap::from_decode_order(track.records.iter().map(|r| r.keyframe))?;
    let (mode, reordered) = resolve_video(&mut track.records, container);

    let mut presentation_of_decode = Vec::new();
    presentation_of_decode.try_reserve_exact(track.records.len() as usize)?;
    presentation_of_decode.resize(track.records.len() as usize, 0);
    for (presentation, record) in track.records.numbered() {
        if let Some(slot) = (record.sample_number as usize).checked_sub(1) {
            presentation_of_decode[slot] = presentation;
        }
    }

    tracing::debug!(
        "Video index: {} samples, {} keyframes, mode {}",
        track.records.len(),
        keyframes.count(),
        mode
    );

    Ok(VideoIndex {
        records: track.records,
        keyframes,
        presentation_of_decode,
        mode,
        reordered,
        time_base: track.time_base,
    })
}

fn finish_audio(mut track: AudioTrackBuilder, container: &ContainerTraits) -> AudioIndex {
    track.records.shrink_to_fit();
    let mode = resolve_audio(&mut track.records, container);
    let constant_frame_length = (track.constant_frame_length && !track.records.is_empty())
        .then_some(track.last_length);

    tracing::debug!(
        "Audio index: {} frames, {} samples, constant length {:?}",
        track.records.len(),
        track.duration.min(AUDIO_DURATION_CEILING),
        constant_frame_length
    );

    AudioIndex {
        records: track.records,
        mode,
        constant_frame_length,
        time_base: track.time_base,
        sample_rate: track.sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framedex_common::Error;

    fn unit(pts: i64, dts: i64, keyframe: bool) -> UnitMeta {
        UnitMeta {
            pts: Some(pts),
            dts: Some(dts),
            byte_offset: None,
            keyframe,
        }
    }

    #[test]
    fn test_leading_flag_is_online() {
        // Open GOP: I(2) B(0) B(1) P(5) B(3) B(4) I(8) B(6) B(7)
        let mut builder = IndexBuilder::new(ContainerTraits::from_format_name("matroska", false))
            .with_video(Rational::new(1, 25));
        let units = [
            (2, true),
            (0, false),
            (1, false),
            (5, false),
            (3, false),
            (4, false),
            (8, true),
            (6, false),
            (7, false),
        ];
        for (dts, (pts, key)) in units.iter().enumerate() {
            builder.push_video(unit(*pts, dts as i64, *key)).unwrap();
        }
        let index = builder.finish().unwrap();
        let video = index.video.unwrap();

        assert!(video.is_reordered());
        assert_eq!(video.sample_count(), 9);
        // Presentation 1 and 2 (pts 0, 1) lead the first keyframe.
        assert!(video.record(1).unwrap().leading);
        assert!(video.record(2).unwrap().leading);
        assert!(!video.record(3).unwrap().leading);
        // pts 3 and 4 follow a P frame, not a keyframe.
        assert!(!video.record(4).unwrap().leading);
        // pts 6 and 7 lead the second keyframe.
        assert!(video.record(7).unwrap().leading);
        assert!(video.record(8).unwrap().leading);
        assert!(video.record(9).unwrap().keyframe);
    }

    #[test]
    fn test_sample_numbers_contiguous_and_pts_sorted() {
        let mut builder = IndexBuilder::new(ContainerTraits::from_format_name("mov", false))
            .with_video(Rational::new(1, 90000));
        let pts = [0, 9000, 3000, 6000, 18000, 12000, 15000];
        for (i, p) in pts.iter().enumerate() {
            builder.push_video(unit(*p, i as i64 * 3000 - 3000, i % 4 == 0)).unwrap();
        }
        let video = builder.finish().unwrap().video.unwrap();

        let mut decode: Vec<u32> = video.records().iter().map(|r| r.sample_number).collect();
        decode.sort_unstable();
        assert_eq!(decode, (1..=7).collect::<Vec<_>>());

        let sorted: Vec<i64> = video.records().iter().filter_map(|r| r.pts).collect();
        assert!(sorted.windows(2).all(|w| w[0] <= w[1]));

        for d in 1..=7 {
            assert_eq!(video.record_by_decode_number(d).unwrap().sample_number, d);
        }
    }

    #[test]
    fn test_keyframe_map_stays_in_decode_order() {
        let mut builder = IndexBuilder::new(ContainerTraits::default()).with_video(Rational::new(1, 1));
        builder.push_video(unit(0, 0, true)).unwrap();
        builder.push_video(unit(2, 1, false)).unwrap();
        builder.push_video(unit(1, 2, true)).unwrap();
        let video = builder.finish().unwrap().video.unwrap();

        assert!(video.keyframes().is_keyframe(1));
        assert!(!video.keyframes().is_keyframe(2));
        assert!(video.keyframes().is_keyframe(3));
        // Presentation order: pts 0 (d1), 1 (d3), 2 (d2).
        assert!(video.is_keyframe(2));
        assert!(!video.is_keyframe(3));
    }

    #[test]
    fn test_audio_constant_length() {
        let mut builder = IndexBuilder::new(ContainerTraits::default())
            .with_audio(Rational::new(1, 48000), 48000);
        for i in 0..4 {
            builder.push_audio(unit(i * 1024, i * 1024, true), 1024).unwrap();
        }
        let audio = builder.finish().unwrap().audio.unwrap();
        assert_eq!(audio.frame_count(), 4);
        assert_eq!(audio.constant_frame_length(), Some(1024));
        assert_eq!(audio.total_length(), 4096);
    }

    #[test]
    fn test_audio_variable_length() {
        let mut builder = IndexBuilder::new(ContainerTraits::default())
            .with_audio(Rational::new(1, 48000), 48000);
        builder.push_audio(unit(0, 0, true), 960).unwrap();
        builder.push_audio(unit(960, 960, true), 480).unwrap();
        let audio = builder.finish().unwrap().audio.unwrap();
        assert_eq!(audio.constant_frame_length(), None);
    }

    #[test]
    fn test_audio_ceiling_skips_frames() {
        let mut builder = IndexBuilder::new(ContainerTraits::default())
            .with_audio(Rational::new(1, 48000), 48000);
        let big = (AUDIO_DURATION_CEILING / 2) as u32;
        assert!(builder.push_audio(unit(0, 0, true), big).unwrap().is_some());
        assert!(builder.push_audio(unit(1, 1, true), big).unwrap().is_some());
        assert!(builder.push_audio(unit(2, 2, true), big).unwrap().is_none());
        assert!(!builder.accepts_audio());
        assert!(builder.push_audio(unit(3, 3, true), 1).unwrap().is_none());
        assert_eq!(builder.finish().unwrap().audio.unwrap().frame_count(), 2);
    }

    #[test]
    fn test_record_limit_aborts() {
        let mut builder = IndexBuilder::new(ContainerTraits::default())
            .record_limit(Some(2))
            .with_video(Rational::new(1, 25));
        builder.push_video(unit(0, 0, true)).unwrap();
        builder.push_video(unit(1, 1, false)).unwrap();
        let err = builder.push_video(unit(2, 2, false)).unwrap_err();
        assert!(matches!(err, Error::Allocation(_)));
    }

    #[test]
    fn test_unselected_tracks_ignore_units() {
        let mut builder = IndexBuilder::new(ContainerTraits::default());
        assert_eq!(builder.push_video(unit(0, 0, true)).unwrap(), None);
        assert_eq!(builder.push_audio(unit(0, 0, true), 1024).unwrap(), None);
        assert!(builder.finish().unwrap().is_empty());
    }
}
