//! PCM range reads over variable-length compressed audio frames.
//!
//! A request is shifted by the audio/video sync offset, mapped onto the
//! frame containing its first sample, and decoded forward from a
//! random-access point. Decoded bytes beyond the request are carried over,
//! so a following request that starts where this one ended continues
//! without seeking.

pub mod upsample;

pub use upsample::{UpsampleRule, Upsampling};

use crate::backend::{AudioDecoder, AudioParams, Container, SeekFlags, TrackInfo};
use bytes::{Buf, Bytes};
use framedex_common::{AudioFormat, Error, Result};
use framedex_index::AudioIndex;

/// Decoded bytes left over from the previous request.
#[derive(Debug, Default)]
struct AudioCarry {
    remainder: Bytes,
    /// Decode-order frame that produced `remainder`.
    last_frame: u32,
    /// Track sample a continuation request must start at.
    next_sample: Option<u64>,
}

impl AudioCarry {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct AudioSequencer {
    container: Box<dyn Container>,
    decoder: Box<dyn AudioDecoder>,
    track: usize,
    params: AudioParams,
    upsample_rule: UpsampleRule,
    format: Option<AudioFormat>,
    upsampling: Upsampling,
    carry: AudioCarry,
}

impl AudioSequencer {
    /// Open the decoder on a container dedicated to this track.
    pub fn open(mut container: Box<dyn Container>, track: &TrackInfo, upsample_rule: UpsampleRule) -> Result<Self> {
        let params = track.audio()?.clone();
        let decoder = container.open_audio_decoder(track)?;
        tracing::debug!(
            "Audio decoder opened: {} ch, {} Hz, {} bits",
            params.channels,
            params.sample_rate,
            params.bits_per_sample
        );
        Ok(Self {
            container,
            decoder,
            track: track.index,
            params,
            upsample_rule,
            format: None,
            upsampling: Upsampling {
                total_samples: 0,
                scale: 1,
            },
            carry: AudioCarry::default(),
        })
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// PCM samples the track decodes to.
    pub fn total_samples(&self) -> u64 {
        self.upsampling.total_samples
    }

    pub fn prepare(&mut self, index: &AudioIndex) -> Result<AudioFormat> {
        self.upsampling = self.upsample_rule.apply(index, self.decoder.frame_size());
        if self.upsampling.total_samples == 0 {
            return Err(Error::unavailable("audio track has no decodable frames"));
        }
        let format = AudioFormat {
            channels: self.params.channels,
            sample_rate: self.params.sample_rate,
            bits_per_sample: self.params.bits_per_sample,
            valid_bits_per_sample: self.params.bits_per_raw_sample,
        };
        self.format = Some(format);
        self.carry.reset();
        tracing::debug!(
            "Audio prepared: {} samples, block align {}{}",
            self.upsampling.total_samples,
            format.block_align(),
            if format.is_extensible() { ", extensible" } else { "" }
        );
        Ok(format)
    }

    /// Read `count` samples starting at host sample `start`.
    ///
    /// `sync_offset` is the audio start minus the video start in samples.
    /// Host samples before a positive offset are silence; a request that
    /// ends there yields nothing. Returns the samples written to `out`.
    pub fn read(&mut self, index: &AudioIndex, sync_offset: i64, start: u64, count: u32, out: &mut [u8]) -> usize {
        let Some(format) = self.format else {
            tracing::debug!("Audio read before prepare");
            return 0;
        };
        let block_align = format.block_align() as usize;
        if block_align == 0 {
            return 0;
        }
        let mut wanted = (count as usize).min(out.len() / block_align);
        if wanted == 0 {
            return 0;
        }

        // Requests reaching past the sample space can hold nothing.
        let Some(end) = start.checked_add(wanted as u64) else {
            return 0;
        };
        let mut silence = 0usize;
        let track_start = if sync_offset > 0 {
            let gap = sync_offset as u64;
            if end <= gap {
                self.carry.reset();
                return 0;
            }
            if start < gap {
                silence = (gap - start) as usize;
                out[..silence * block_align].fill(format.silence_byte());
                wanted -= silence;
                0
            } else {
                start - gap
            }
        } else {
            match start.checked_add(sync_offset.unsigned_abs()) {
                Some(track_start) => track_start,
                None => return 0,
            }
        };

        let decoded = self.read_track(index, track_start, wanted, &mut out[silence * block_align..], block_align);
        silence + decoded
    }

    fn read_track(
        &mut self,
        index: &AudioIndex,
        track_start: u64,
        wanted: usize,
        out: &mut [u8],
        block_align: usize,
    ) -> usize {
        let wanted_bytes = wanted * block_align;
        let mut produced = 0usize;
        let mut frame;
        let mut data_offset;

        if self.carry.next_sample == Some(track_start) {
            let take = self.carry.remainder.len().min(wanted_bytes);
            out[..take].copy_from_slice(&self.carry.remainder[..take]);
            self.carry.remainder.advance(take);
            produced = take;
            frame = self.carry.last_frame;
            if produced >= wanted_bytes {
                return self.finish(track_start, produced, frame, block_align);
            }
            frame += 1;
            data_offset = 0;
        } else {
            self.carry.reset();
            let Some(position) = index.locate(track_start, self.upsampling.scale) else {
                tracing::debug!("Audio sample {} is past the end of the track", track_start);
                return 0;
            };
            frame = position.frame_number;
            data_offset = position.samples_into_frame as usize * block_align;
            if let Err(e) = self.seek_to_frame(index, frame) {
                tracing::debug!("Audio seek to frame {} failed: {}", frame, e);
                return 0;
            }
        }

        loop {
            let unit = match self.container.read_next_unit(self.track) {
                Ok(Some(unit)) => unit,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Audio read stopped at frame {}: {}", frame, e);
                    break;
                }
            };
            let pcm = match self.decoder.decode(&unit) {
                Ok(pcm) => pcm,
                Err(e) => {
                    tracing::debug!("Audio decode stopped at frame {}: {}", frame, e);
                    break;
                }
            };
            if pcm.len() > data_offset {
                let take = (pcm.len() - data_offset).min(wanted_bytes - produced);
                out[produced..produced + take].copy_from_slice(&pcm[data_offset..data_offset + take]);
                produced += take;
                if produced >= wanted_bytes {
                    self.carry.remainder = pcm.slice(data_offset + take..);
                    break;
                }
                data_offset = 0;
            } else {
                data_offset -= pcm.len();
            }
            frame += 1;
        }
        self.finish(track_start, produced, frame, block_align)
    }

    fn finish(&mut self, track_start: u64, produced: usize, frame: u32, block_align: usize) -> usize {
        let samples = produced / block_align;
        self.carry.next_sample = Some(track_start + samples as u64);
        self.carry.last_frame = frame;
        tracing::trace!(
            "Audio read {} samples from {}, {} bytes carried",
            samples,
            track_start,
            self.carry.remainder.len()
        );
        samples
    }

    /// Seek to the random-access point of `frame` and decode up to it.
    fn seek_to_frame(&mut self, index: &AudioIndex, frame: u32) -> Result<()> {
        let rap = index.random_access_point(frame);
        if let Err(e) = self.container.seek(self.track, rap.key, SeekFlags::BACKWARD) {
            tracing::debug!("Backward seek to {:?} failed ({}); retrying with any frame", rap.key, e);
            self.container
                .seek(self.track, rap.key, SeekFlags::BACKWARD.with_any())?;
        }
        self.decoder.flush()?;
        for skipped in rap.decode_number..frame {
            let Some(unit) = self.container.read_next_unit(self.track)? else {
                break;
            };
            if let Err(e) = self.decoder.decode(&unit) {
                tracing::trace!("Discarded frame {} failed to decode: {}", skipped, e);
            }
        }
        Ok(())
    }
}
