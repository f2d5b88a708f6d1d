//! In-memory scripted backend.
//!
//! A [`ScriptedMedia`] lists the compressed units of at most one video and
//! one audio track, with their timestamps, byte positions and flags. The
//! container interleaves the two tracks, and the decoders reproduce the
//! behaviour the sequencers have to cope with: reorder delay, frame-thread
//! latency, non-reference skipping, damaged units, undecodable leading
//! pictures and audio frames that expand past their nominal length.
//!
//! Scripts are plain JSON, so the CLI can replay them from disk.

mod audio;
mod video;

pub use audio::{pcm_sample, rendered_pcm, ScriptedAudioDecoder};
pub use video::{rendered_frame, ScriptedColorConverter, ScriptedVideoDecoder};

use super::{
    AudioDecoder, AudioParams, ColorConverter, CompressedUnit, Container, ContainerInfo,
    MediaBackend, SeekFlags, TrackInfo, TrackParams, VideoDecoder, VideoParams,
};
use bytes::{BufMut, BytesMut};
use framedex_common::{Error, MediaKind, Rational, Result};
use framedex_index::SeekKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const FLAG_KEYFRAME: u8 = 1;
pub(crate) const FLAG_REFERENCE: u8 = 1 << 1;
pub(crate) const FLAG_CORRUPT: u8 = 1 << 2;

fn default_format_name() -> String {
    "matroska,webm".to_string()
}

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    8
}

fn default_height() -> u32 {
    4
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_channels() -> u16 {
    2
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_bits() -> u16 {
    16
}

fn default_upsample() -> u32 {
    1
}

/// A complete synthetic stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedMedia {
    #[serde(default = "default_format_name")]
    pub format_name: String,

    #[serde(default)]
    pub byte_seek_forbidden: bool,

    #[serde(default)]
    pub video: Option<ScriptedVideoTrack>,

    #[serde(default)]
    pub audio: Option<ScriptedAudioTrack>,
}

impl ScriptedMedia {
    pub fn new(format_name: impl Into<String>) -> Self {
        Self {
            format_name: format_name.into(),
            ..Default::default()
        }
    }

    pub fn with_video(mut self, track: ScriptedVideoTrack) -> Self {
        self.video = Some(track);
        self
    }

    pub fn with_audio(mut self, track: ScriptedAudioTrack) -> Self {
        self.audio = Some(track);
        self
    }

    pub fn forbid_byte_seek(mut self) -> Self {
        self.byte_seek_forbidden = true;
        self
    }

    /// Parse a JSON script.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::open(format!("invalid script: {e}")))
    }

    fn video_index(&self) -> Option<usize> {
        self.video.as_ref().map(|_| 0)
    }

    fn audio_index(&self) -> Option<usize> {
        self.audio.as_ref().map(|_| usize::from(self.video.is_some()))
    }

    /// Units of both tracks, alternating while both have some left.
    fn interleave(&self) -> Vec<CompressedUnit> {
        let video: Vec<CompressedUnit> = match (&self.video, self.video_index()) {
            (Some(track), Some(index)) => track.compressed_units(index),
            _ => Vec::new(),
        };
        let audio: Vec<CompressedUnit> = match (&self.audio, self.audio_index()) {
            (Some(track), Some(index)) => track.compressed_units(index),
            _ => Vec::new(),
        };
        let mut slots = Vec::with_capacity(video.len() + audio.len());
        let mut video = video.into_iter();
        let mut audio = audio.into_iter();
        loop {
            let v = video.next();
            let a = audio.next();
            if v.is_none() && a.is_none() {
                break;
            }
            slots.extend(v);
            slots.extend(a);
        }
        slots
    }
}

/// Video track of a script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedVideoTrack {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    pub time_base: Rational,

    /// Rate declared by the container.
    #[serde(default)]
    pub frame_rate: Rational,

    /// Pictures held back for reordering.
    #[serde(default)]
    pub reorder_delay: u32,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Units in decode order.
    #[serde(default)]
    pub units: Vec<ScriptedVideoUnit>,
}

impl ScriptedVideoTrack {
    pub fn new(time_base: Rational, frame_rate: Rational) -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            time_base,
            frame_rate,
            reorder_delay: 0,
            pixel_format: default_pixel_format(),
            units: Vec::new(),
        }
    }

    pub fn reorder_delay(mut self, delay: u32) -> Self {
        self.reorder_delay = delay;
        self
    }

    pub fn push(mut self, unit: ScriptedVideoUnit) -> Self {
        self.units.push(unit);
        self
    }

    fn compressed_units(&self, track: usize) -> Vec<CompressedUnit> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let mut flags = 0;
                if unit.keyframe {
                    flags |= FLAG_KEYFRAME;
                }
                if unit.reference {
                    flags |= FLAG_REFERENCE;
                }
                if unit.corrupt {
                    flags |= FLAG_CORRUPT;
                }
                let order = unit.pts.or(unit.dts).unwrap_or(i as i64);
                let mut data = BytesMut::with_capacity(9);
                data.put_u8(flags);
                data.put_i64_le(order);
                CompressedUnit {
                    track,
                    data: data.freeze(),
                    pts: unit.pts,
                    dts: unit.dts,
                    pos: unit.pos,
                    keyframe: unit.keyframe,
                    duration: None,
                }
            })
            .collect()
    }
}

/// One coded picture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedVideoUnit {
    #[serde(default)]
    pub pts: Option<i64>,

    #[serde(default)]
    pub dts: Option<i64>,

    #[serde(default)]
    pub pos: Option<u64>,

    #[serde(default)]
    pub keyframe: bool,

    /// Other pictures predict from this one.
    #[serde(default = "default_true")]
    pub reference: bool,

    /// The decoder rejects this unit.
    #[serde(default)]
    pub corrupt: bool,
}

impl ScriptedVideoUnit {
    pub fn new(pts: i64, dts: i64, keyframe: bool) -> Self {
        Self {
            pts: Some(pts),
            dts: Some(dts),
            pos: None,
            keyframe,
            reference: true,
            corrupt: false,
        }
    }

    pub fn at(mut self, pos: u64) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn non_reference(mut self) -> Self {
        self.reference = false;
        self
    }

    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }

    pub fn without_pts(mut self) -> Self {
        self.pts = None;
        self
    }
}

/// Audio track of a script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedAudioTrack {
    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_bits")]
    pub bits_per_sample: u16,

    pub time_base: Rational,

    /// Fixed frame size declared by the codec.
    #[serde(default)]
    pub frame_size: Option<u32>,

    /// A bitstream parser can report frame lengths.
    #[serde(default)]
    pub parser_hints: bool,

    /// Units carry their duration.
    #[serde(default)]
    pub container_durations: bool,

    /// Decoded samples per nominal sample.
    #[serde(default = "default_upsample")]
    pub upsample: u32,

    #[serde(default)]
    pub units: Vec<ScriptedAudioUnit>,
}

impl ScriptedAudioTrack {
    pub fn new(time_base: Rational, sample_rate: u32) -> Self {
        Self {
            channels: default_channels(),
            sample_rate,
            bits_per_sample: default_bits(),
            time_base,
            frame_size: None,
            parser_hints: false,
            container_durations: false,
            upsample: 1,
            units: Vec::new(),
        }
    }

    pub fn fixed_frame_size(mut self, samples: u32) -> Self {
        self.frame_size = Some(samples);
        self
    }

    pub fn upsample(mut self, factor: u32) -> Self {
        self.upsample = factor.max(1);
        self
    }

    pub fn push(mut self, unit: ScriptedAudioUnit) -> Self {
        self.units.push(unit);
        self
    }

    fn compressed_units(&self, track: usize) -> Vec<CompressedUnit> {
        let factor = self.upsample.max(1) as u64;
        let mut first_sample = 0u64;
        self.units
            .iter()
            .map(|unit| {
                let mut data = BytesMut::with_capacity(13);
                data.put_u8(if unit.corrupt { FLAG_CORRUPT } else { 0 });
                data.put_u64_le(first_sample);
                data.put_u32_le(unit.samples);
                first_sample += unit.samples as u64 * factor;
                CompressedUnit {
                    track,
                    data: data.freeze(),
                    pts: unit.pts,
                    dts: unit.dts,
                    pos: unit.pos,
                    keyframe: unit.keyframe,
                    duration: self.container_durations.then_some(unit.samples),
                }
            })
            .collect()
    }
}

/// One compressed audio frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedAudioUnit {
    #[serde(default)]
    pub pts: Option<i64>,

    #[serde(default)]
    pub dts: Option<i64>,

    #[serde(default)]
    pub pos: Option<u64>,

    /// Nominal PCM samples in the frame.
    pub samples: u32,

    #[serde(default = "default_true")]
    pub keyframe: bool,

    #[serde(default)]
    pub corrupt: bool,
}

impl ScriptedAudioUnit {
    pub fn new(ts: i64, samples: u32) -> Self {
        Self {
            pts: Some(ts),
            dts: Some(ts),
            pos: None,
            samples,
            keyframe: true,
            corrupt: false,
        }
    }

    pub fn at(mut self, pos: u64) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }
}

/// Counters shared by every container a backend opened.
#[derive(Debug, Default)]
pub struct ScriptStats {
    opens: AtomicUsize,
    seeks: AtomicUsize,
}

impl ScriptStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::Relaxed)
    }
}

/// Backend serving registered scripts, or JSON scripts read from disk.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    media: HashMap<PathBuf, Arc<ScriptedMedia>>,
    stats: Arc<ScriptStats>,
    open_limit: Option<usize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `media` for `path` without touching the filesystem.
    pub fn with_media(mut self, path: impl Into<PathBuf>, media: ScriptedMedia) -> Self {
        self.media.insert(path.into(), Arc::new(media));
        self
    }

    /// Fail every open after the first `limit`.
    pub fn open_limit(mut self, limit: usize) -> Self {
        self.open_limit = Some(limit);
        self
    }

    pub fn stats(&self) -> Arc<ScriptStats> {
        Arc::clone(&self.stats)
    }

    fn load(&self, path: &Path) -> Result<Arc<ScriptedMedia>> {
        if let Some(media) = self.media.get(path) {
            return Ok(Arc::clone(media));
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::open(format!("{}: {e}", path.display())))?;
        Ok(Arc::new(ScriptedMedia::from_json(&json)?))
    }
}

impl MediaBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Container>> {
        let opened = self.stats.opens.fetch_add(1, Ordering::Relaxed);
        if self.open_limit.is_some_and(|limit| opened >= limit) {
            return Err(Error::open(format!("{}: open refused", path.display())));
        }
        let media = self.load(path)?;
        if media.video.is_none() && media.audio.is_none() {
            return Err(Error::open(format!("{}: no streams", path.display())));
        }
        let slots = media.interleave();
        tracing::trace!("Opened script {} with {} units", path.display(), slots.len());
        Ok(Box::new(ScriptedContainer {
            media,
            slots,
            cursor: 0,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn color_converter(&self) -> Box<dyn ColorConverter> {
        Box::new(ScriptedColorConverter)
    }
}

/// Read context over a script's interleaved units.
pub struct ScriptedContainer {
    media: Arc<ScriptedMedia>,
    slots: Vec<CompressedUnit>,
    cursor: usize,
    stats: Arc<ScriptStats>,
}

impl ScriptedContainer {
    /// Slot positions of `track`'s units, in decode order.
    fn track_slots(&self, track: usize) -> impl Iterator<Item = (usize, &CompressedUnit)> {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, unit)| unit.track == track)
    }

    fn find_slot(&self, track: usize, key: SeekKey, flags: SeekFlags) -> Option<usize> {
        match key {
            SeekKey::ByteOffset(offset) => self
                .slots
                .iter()
                .position(|unit| unit.pos.is_some_and(|pos| pos >= offset)),
            SeekKey::Presentation(ts) => self.find_by_timestamp(track, ts, flags, |u| u.pts),
            SeekKey::Decode(ts) => self.find_by_timestamp(track, ts, flags, |u| u.dts),
            SeekKey::DecodeOrder(number) => {
                let slots: Vec<(usize, &CompressedUnit)> = self.track_slots(track).collect();
                let mut n = (number as usize).checked_sub(1)?;
                if n >= slots.len() {
                    return None;
                }
                while !flags.any && !slots[n].1.keyframe {
                    n = n.checked_sub(1)?;
                }
                Some(slots[n].0)
            }
        }
    }

    fn find_by_timestamp(
        &self,
        track: usize,
        ts: i64,
        flags: SeekFlags,
        timestamp: impl Fn(&CompressedUnit) -> Option<i64>,
    ) -> Option<usize> {
        let mut candidates = self
            .track_slots(track)
            .filter(|(_, unit)| flags.any || unit.keyframe)
            .filter_map(|(slot, unit)| timestamp(unit).map(|t| (slot, t)));
        if flags.backward {
            candidates.filter(|(_, t)| *t <= ts).last().map(|(slot, _)| slot)
        } else {
            candidates.find(|(_, t)| *t >= ts).map(|(slot, _)| slot)
        }
    }
}

impl Container for ScriptedContainer {
    fn info(&self) -> ContainerInfo {
        ContainerInfo::from_format_name(&self.media.format_name, self.media.byte_seek_forbidden)
    }

    fn track(&self, kind: MediaKind) -> Result<TrackInfo> {
        match kind {
            MediaKind::Video => {
                let (Some(track), Some(index)) = (&self.media.video, self.media.video_index()) else {
                    return Err(Error::TrackNotFound(kind));
                };
                Ok(TrackInfo {
                    index,
                    time_base: track.time_base,
                    params: TrackParams::Video(VideoParams {
                        width: track.width,
                        height: track.height,
                        frame_rate: track.frame_rate,
                        pixel_format: track.pixel_format.clone(),
                    }),
                })
            }
            MediaKind::Audio => {
                let (Some(track), Some(index)) = (&self.media.audio, self.media.audio_index()) else {
                    return Err(Error::TrackNotFound(kind));
                };
                Ok(TrackInfo {
                    index,
                    time_base: track.time_base,
                    params: TrackParams::Audio(AudioParams {
                        channels: track.channels,
                        sample_rate: track.sample_rate,
                        bits_per_sample: track.bits_per_sample,
                        bits_per_raw_sample: track.bits_per_sample,
                        frame_size: track.frame_size,
                    }),
                })
            }
        }
    }

    fn read_unit(&mut self) -> Result<Option<CompressedUnit>> {
        let unit = self.slots.get(self.cursor).cloned();
        if unit.is_some() {
            self.cursor += 1;
        }
        Ok(unit)
    }

    fn seek(&mut self, track: usize, key: SeekKey, flags: SeekFlags) -> Result<()> {
        self.stats.seeks.fetch_add(1, Ordering::Relaxed);
        match self.find_slot(track, key, flags) {
            Some(slot) => {
                tracing::trace!("Scripted seek on track {} to {:?} landed at slot {}", track, key, slot);
                self.cursor = slot;
                Ok(())
            }
            None => Err(Error::seek(format!("no unit for {key:?} on track {track}"))),
        }
    }

    fn open_video_decoder(&mut self, track: &TrackInfo, threads: u32) -> Result<Box<dyn VideoDecoder>> {
        let params = track.video()?;
        let script = self
            .media
            .video
            .as_ref()
            .ok_or(Error::TrackNotFound(MediaKind::Video))?;
        Ok(Box::new(ScriptedVideoDecoder::new(
            params.width,
            params.height,
            script.reorder_delay,
            threads,
        )))
    }

    fn open_audio_decoder(&mut self, track: &TrackInfo) -> Result<Box<dyn AudioDecoder>> {
        let params = track.audio()?;
        let script = self
            .media
            .audio
            .as_ref()
            .ok_or(Error::TrackNotFound(MediaKind::Audio))?;
        Ok(Box::new(ScriptedAudioDecoder::new(
            params.channels,
            params.bits_per_sample,
            script.frame_size,
            script.upsample,
            script.parser_hints,
        )))
    }
}
