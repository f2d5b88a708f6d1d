//! Host-facing media handle.
//!
//! Opening a handle scans the container once and keeps the resulting index.
//! Each track is then activated on its own container read context, so video
//! and audio reads never disturb each other's position.

use crate::audio::AudioSequencer;
use crate::backend::{ContainerInfo, MediaBackend, TrackInfo};
use crate::config::EngineConfig;
use crate::indexer::build_index;
use crate::video::VideoSequencer;
use framedex_common::{AudioFormat, Error, FrameFormat, MediaKind, Result, SeekPolicy};
use framedex_index::StreamIndex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct MediaHandle {
    backend: Arc<dyn MediaBackend>,
    path: PathBuf,
    config: EngineConfig,
    info: ContainerInfo,
    index: StreamIndex,
    video_track: Option<TrackInfo>,
    audio_track: Option<TrackInfo>,
    video: Option<VideoSequencer>,
    audio: Option<AudioSequencer>,
}

fn find_track(container: &dyn crate::backend::Container, kind: MediaKind) -> Result<Option<TrackInfo>> {
    match container.track(kind) {
        Ok(track) => Ok(Some(track)),
        Err(Error::TrackNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl MediaHandle {
    /// Open `path` and index its first video and audio tracks.
    ///
    /// An allocation failure while indexing is not fatal: the handle opens
    /// with an empty index and both tracks report unavailable on activation.
    pub fn open(backend: Arc<dyn MediaBackend>, path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut container = backend.open(&path)?;
        let info = container.info();
        let video_track = find_track(container.as_ref(), MediaKind::Video)?;
        let audio_track = find_track(container.as_ref(), MediaKind::Audio)?;
        if video_track.is_none() && audio_track.is_none() {
            return Err(Error::open(format!("{}: no video or audio track", path.display())));
        }

        let index = match build_index(
            container.as_mut(),
            video_track.as_ref(),
            audio_track.as_ref(),
            config.index.max_records,
        ) {
            Ok(index) => index,
            Err(Error::Allocation(reason)) => {
                tracing::error!("Indexing {} aborted: {}", path.display(), reason);
                StreamIndex::default()
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            "Opened {} ({}) via {} backend",
            path.display(),
            info.format_name,
            backend.name()
        );
        Ok(Self {
            backend,
            path,
            config,
            info,
            index,
            video_track,
            audio_track,
            video: None,
            audio: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn container_info(&self) -> &ContainerInfo {
        &self.info
    }

    pub fn index(&self) -> &StreamIndex {
        &self.index
    }

    /// Audio start minus video start, in audio samples.
    pub fn sync_offset(&self) -> i64 {
        self.index.sync_offset
    }

    pub fn video_sample_count(&self) -> u32 {
        self.index.video.as_ref().map_or(0, |v| v.sample_count())
    }

    /// PCM samples in the audio track, including upsampling once prepared.
    pub fn audio_sample_count(&self) -> u64 {
        match (&self.audio, &self.index.audio) {
            (Some(audio), _) if audio.format().is_some() => audio.total_samples(),
            (_, Some(index)) => index.total_length(),
            _ => 0,
        }
    }

    /// Open the video decoder. `policy` is the most tolerant tier failed
    /// reads may escalate to.
    pub fn activate_video(&mut self, policy: SeekPolicy) -> Result<()> {
        self.video = None;
        let track = self
            .video_track
            .clone()
            .ok_or(Error::TrackNotFound(MediaKind::Video))?;
        let sample_count = self
            .index
            .video
            .as_ref()
            .map_or(0, |v| v.sample_count());
        if sample_count == 0 {
            return Err(Error::unavailable("video track has no index"));
        }
        let container = self.backend.open(&self.path)?;
        let sequencer = VideoSequencer::open(
            container,
            &track,
            self.backend.color_converter(),
            self.config.decoder_threads(),
            policy,
            self.config.video.max_retries,
            sample_count,
        )?;
        self.video = Some(sequencer);
        Ok(())
    }

    pub fn activate_audio(&mut self) -> Result<()> {
        self.audio = None;
        let track = self
            .audio_track
            .clone()
            .ok_or(Error::TrackNotFound(MediaKind::Audio))?;
        if self.index.audio.as_ref().map_or(true, |a| a.frame_count() == 0) {
            return Err(Error::unavailable("audio track has no index"));
        }
        let container = self.backend.open(&self.path)?;
        let sequencer = AudioSequencer::open(container, &track, self.config.audio.upsample_rule)?;
        self.audio = Some(sequencer);
        Ok(())
    }

    pub fn prepare_video(&mut self) -> Result<FrameFormat> {
        match (self.video.as_mut(), self.index.video.as_ref()) {
            (Some(video), Some(index)) => video.prepare(index),
            _ => Err(Error::unavailable("video track not active")),
        }
    }

    pub fn prepare_audio(&mut self) -> Result<AudioFormat> {
        match (self.audio.as_mut(), self.index.audio.as_ref()) {
            (Some(audio), Some(index)) => audio.prepare(index),
            _ => Err(Error::unavailable("audio track not active")),
        }
    }

    /// Decode video sample `n` (0-origin, presentation order) into `out`.
    ///
    /// Returns the bytes written; 0 means the sample could not be produced.
    pub fn read_video_sample(&mut self, n: u32, out: &mut [u8]) -> usize {
        let (Some(video), Some(index)) = (self.video.as_mut(), self.index.video.as_ref()) else {
            return 0;
        };
        match n.checked_add(1) {
            Some(sample) => video.read(index, sample, out),
            None => 0,
        }
    }

    /// Decode `count` PCM samples starting at `start` into `out`.
    ///
    /// Returns the samples written.
    pub fn read_audio_range(&mut self, start: u64, count: u32, out: &mut [u8]) -> usize {
        let sync_offset = self.index.sync_offset;
        match (self.audio.as_mut(), self.index.audio.as_ref()) {
            (Some(audio), Some(index)) => audio.read(index, sync_offset, start, count, out),
            _ => 0,
        }
    }

    /// Keyframe flag of video sample `n` (0-origin, presentation order).
    pub fn is_keyframe(&self, n: u32) -> bool {
        match (self.index.video.as_ref(), n.checked_add(1)) {
            (Some(video), Some(sample)) => video.is_keyframe(sample),
            _ => false,
        }
    }

    pub fn video(&self) -> Option<&VideoSequencer> {
        self.video.as_ref()
    }
}
