//! Demux, decode and colour-conversion collaborators.
//!
//! The engine never parses a container or a bitstream itself. A
//! [`MediaBackend`] opens containers; each [`Container`] hands out compressed
//! units in container order, seeks, and creates decoders for its tracks.
//!
//! Backends available in this crate:
//!
//! - **Scripted**: an in-memory stream description, used by the CLI and the
//!   test suite to reproduce reordering, pipeline delay and damaged units.

pub mod scripted;

use bytes::Bytes;
use framedex_common::{Error, FrameFormat, MediaKind, PixelLayout, Rational, Result};
use framedex_index::{ContainerTraits, SeekKey};
use std::path::Path;

pub use scripted::{ScriptedBackend, ScriptedMedia};

/// Opens containers. Chosen once per media handle.
pub trait MediaBackend: Send + Sync {
    /// Human-readable name identifying this backend.
    fn name(&self) -> &'static str;

    /// Open a container. Every call yields an independent read context.
    fn open(&self, path: &Path) -> Result<Box<dyn Container>>;

    /// Colour converter for pictures produced by this backend's decoders.
    fn color_converter(&self) -> Box<dyn ColorConverter>;
}

/// An open container read context.
pub trait Container: Send {
    fn info(&self) -> ContainerInfo;

    /// First track of the given kind.
    fn track(&self, kind: MediaKind) -> Result<TrackInfo>;

    /// Next unit of any track in container order, or `None` at end of stream.
    fn read_unit(&mut self) -> Result<Option<CompressedUnit>>;

    /// Next unit belonging to `track`, skipping the others.
    fn read_next_unit(&mut self, track: usize) -> Result<Option<CompressedUnit>> {
        while let Some(unit) = self.read_unit()? {
            if unit.track == track {
                return Ok(Some(unit));
            }
        }
        Ok(None)
    }

    /// Reposition the read cursor of `track`.
    fn seek(&mut self, track: usize, key: SeekKey, flags: SeekFlags) -> Result<()>;

    /// Open a video decoder for `track` with a worker-thread hint.
    fn open_video_decoder(&mut self, track: &TrackInfo, threads: u32) -> Result<Box<dyn VideoDecoder>>;

    fn open_audio_decoder(&mut self, track: &TrackInfo) -> Result<Box<dyn AudioDecoder>>;
}

/// Seek modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekFlags {
    /// Land on the closest point at or before the key.
    pub backward: bool,
    /// Accept any unit, not only random-access points.
    pub any: bool,
}

impl SeekFlags {
    pub const BACKWARD: Self = Self {
        backward: true,
        any: false,
    };

    pub fn with_any(mut self) -> Self {
        self.any = true;
        self
    }
}

/// Container-level facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub format_name: String,
    pub byte_seek_forbidden: bool,
}

impl ContainerInfo {
    pub fn from_format_name(format_name: impl Into<String>, byte_seek_forbidden: bool) -> Self {
        Self {
            format_name: format_name.into(),
            byte_seek_forbidden,
        }
    }

    /// Addressing constraints derived from the demuxer.
    pub fn traits(&self) -> ContainerTraits {
        ContainerTraits::from_format_name(&self.format_name, self.byte_seek_forbidden)
    }
}

/// A selected track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    /// Stream index inside the container.
    pub index: usize,
    pub time_base: Rational,
    pub params: TrackParams,
}

impl TrackInfo {
    pub fn kind(&self) -> MediaKind {
        match self.params {
            TrackParams::Video(_) => MediaKind::Video,
            TrackParams::Audio(_) => MediaKind::Audio,
        }
    }

    pub fn video(&self) -> Result<&VideoParams> {
        match &self.params {
            TrackParams::Video(v) => Ok(v),
            TrackParams::Audio(_) => Err(Error::TrackNotFound(MediaKind::Video)),
        }
    }

    pub fn audio(&self) -> Result<&AudioParams> {
        match &self.params {
            TrackParams::Audio(a) => Ok(a),
            TrackParams::Video(_) => Err(Error::TrackNotFound(MediaKind::Audio)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackParams {
    Video(VideoParams),
    Audio(AudioParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    /// Frame rate declared by the container.
    pub frame_rate: Rational,
    /// Decoder-native pixel format name, e.g. `yuv420p`.
    pub pixel_format: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioParams {
    pub channels: u16,
    pub sample_rate: u32,
    /// Bytes per sample times eight.
    pub bits_per_sample: u16,
    /// Significant bits of the raw codec samples.
    pub bits_per_raw_sample: u16,
    /// Samples per frame when the codec uses a fixed frame size.
    pub frame_size: Option<u32>,
}

/// One demuxed compressed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedUnit {
    pub track: usize,
    pub data: Bytes,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub pos: Option<u64>,
    pub keyframe: bool,
    /// Duration in track time base, when the container stores one.
    pub duration: Option<u32>,
}

/// A decoded picture in the decoder's native format.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub width: u32,
    pub height: u32,
    pub pts: Option<i64>,
    pub data: Bytes,
}

pub trait VideoDecoder: Send {
    /// Feed one unit, or `None` to drain buffered pictures.
    ///
    /// `Ok(None)` means the unit was consumed but the picture is still held
    /// inside the decoder.
    fn decode(&mut self, unit: Option<&CompressedUnit>) -> Result<Option<Picture>>;

    /// Drop every buffered picture and reference.
    fn flush(&mut self) -> Result<()>;

    /// Discard units no other unit references.
    fn set_skip_non_reference(&mut self, skip: bool);

    /// Units fed before the first picture comes out.
    fn pipeline_delay(&self) -> u32;
}

pub trait AudioDecoder: Send {
    /// Decode one unit to interleaved PCM.
    fn decode(&mut self, unit: &CompressedUnit) -> Result<Bytes>;

    fn flush(&mut self) -> Result<()>;

    /// Samples produced per frame once decoding has started, if fixed.
    fn frame_size(&self) -> Option<u32>;

    /// Frame length reported by a bitstream parser without decoding.
    fn parse_frame_length(&mut self, _unit: &CompressedUnit) -> Option<u32> {
        None
    }
}

pub trait ColorConverter: Send {
    /// Layout the host receives for pictures of this track.
    fn output_layout(&self, params: &VideoParams) -> PixelLayout;

    /// Convert into `out`, returning the bytes written.
    fn convert(&mut self, picture: &Picture, format: &FrameFormat, out: &mut [u8]) -> Result<usize>;
}
