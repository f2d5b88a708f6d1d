//! Frame-accurate video reads.
//!
//! [`VideoSequencer`] turns "give me presentation sample `n`" into a seek to
//! a random-access point, a replay through the decoder's delay window and a
//! pull of the wanted picture. Sequential reads reuse the running pipeline
//! instead of seeking. Failures go through the [`RetryLadder`].

pub mod pipeline;
pub mod retry;

pub use pipeline::{DecodePipeline, Phase};
pub use retry::{RetryDecision, RetryLadder};

use crate::backend::{ColorConverter, Container, Picture, TrackInfo, VideoParams};
use framedex_common::{Error, FrameFormat, Result, SeekPolicy};
use framedex_index::{estimate_frame_rate, VideoIndex};

pub struct VideoSequencer {
    pipeline: DecodePipeline,
    converter: Box<dyn ColorConverter>,
    params: VideoParams,
    policy: SeekPolicy,
    max_retries: u32,
    sample_count: u32,
    format: Option<FrameFormat>,
    first_valid: u32,
    first_valid_frame: Option<Vec<u8>>,
    last_delivered: u32,
    last_rap: u32,
}

impl VideoSequencer {
    /// Open the decoder on a container dedicated to this track.
    pub fn open(
        mut container: Box<dyn Container>,
        track: &TrackInfo,
        converter: Box<dyn ColorConverter>,
        threads: u32,
        policy: SeekPolicy,
        max_retries: u32,
        sample_count: u32,
    ) -> Result<Self> {
        let params = track.video()?.clone();
        let decoder = container.open_video_decoder(track, threads)?;
        let pipeline = DecodePipeline::new(container, decoder, track.index, sample_count);
        tracing::debug!(
            "Video decoder opened: {}x{} {}, pipeline delay {}",
            params.width,
            params.height,
            params.pixel_format,
            pipeline.delay()
        );
        Ok(Self {
            pipeline,
            converter,
            params,
            policy,
            max_retries,
            sample_count,
            format: None,
            first_valid: 1,
            first_valid_frame: None,
            last_delivered: 0,
            last_rap: 1,
        })
    }

    pub fn policy(&self) -> SeekPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SeekPolicy) {
        self.policy = policy;
    }

    pub fn format(&self) -> Option<FrameFormat> {
        self.format
    }

    /// First presentation sample the decoder can reproduce.
    pub fn first_valid(&self) -> u32 {
        self.first_valid
    }

    /// Measure the frame rate, locate the first decodable picture and arm
    /// the sequencer so the first read seeks.
    pub fn prepare(&mut self, index: &VideoIndex) -> Result<FrameFormat> {
        let frame_rate = match estimate_frame_rate(index, self.params.frame_rate) {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!("{}; using the container frame rate {}", e, self.params.frame_rate);
                self.params.frame_rate
            }
        };
        let format = FrameFormat {
            width: self.params.width,
            height: self.params.height,
            pixel_layout: self.converter.output_layout(&self.params),
            frame_rate,
        };
        self.format = Some(format);

        match self.pipeline.find_first_valid()? {
            Some((first_valid, picture)) => {
                self.first_valid = first_valid;
                if first_valid > 1 || self.sample_count == 1 {
                    let mut frame = vec![0u8; format.frame_size()];
                    self.converter.convert(&picture, &format, &mut frame)?;
                    self.first_valid_frame = Some(frame);
                }
                if first_valid > 1 {
                    tracing::debug!("First decodable sample is {}", first_valid);
                }
            }
            None => tracing::warn!("No sample of the video track decodes"),
        }

        self.last_delivered = self.force_seek();
        tracing::debug!(
            "Video prepared: {}x{} {} at {} fps",
            format.width,
            format.height,
            format.pixel_layout,
            format.frame_rate
        );
        Ok(format)
    }

    /// A `last_delivered` value no request can follow sequentially.
    fn force_seek(&self) -> u32 {
        self.sample_count.saturating_add(1)
    }

    /// Decode presentation sample `n` (1-origin) into `out`.
    ///
    /// Returns the bytes written, or 0 when the sample cannot be produced.
    pub fn read(&mut self, index: &VideoIndex, n: u32, out: &mut [u8]) -> usize {
        match self.try_read(index, n, out) {
            Ok(written) => written,
            Err(e) => {
                tracing::debug!("Video sample {} unavailable: {}", n, e);
                self.last_delivered = self.force_seek();
                0
            }
        }
    }

    fn try_read(&mut self, index: &VideoIndex, n: u32, out: &mut [u8]) -> Result<usize> {
        let format = self
            .format
            .ok_or_else(|| Error::unavailable("video track not prepared"))?;
        if n == 0 || n > self.sample_count {
            return Err(Error::invalid_input(format!(
                "sample {} outside 1..={}",
                n, self.sample_count
            )));
        }

        if n < self.first_valid || self.sample_count == 1 {
            if let Some(frame) = &self.first_valid_frame {
                let target = out.get_mut(..frame.len()).ok_or_else(|| {
                    Error::invalid_input(format!("output buffer smaller than {} bytes", frame.len()))
                })?;
                target.copy_from_slice(frame);
                self.last_delivered = self.force_seek();
                return Ok(frame.len());
            }
        }

        let (mut rap, mut start) = if n == self.last_delivered.wrapping_add(1) {
            let rap = index.random_access_point(self.last_rap);
            (rap, Ok(n + self.pipeline.delay_count()))
        } else {
            let rap = index
                .find_random_access_point(n)
                .ok_or_else(|| Error::invalid_input(format!("no record for sample {n}")))?;
            self.last_rap = rap.decode_number;
            (rap, self.pipeline.seek_to(n, &rap, SeekPolicy::Normal))
        };

        let leading = index.record(n).is_some_and(|r| r.leading);
        let mut ladder = RetryLadder::new(self.policy, self.max_retries);
        let picture = loop {
            let attempt = start.and_then(|current| {
                let goal = n + self.pipeline.delay_count();
                self.pipeline.pull(current, goal, ladder.tier())
            });
            let e = match attempt {
                Ok(picture) => break Some(picture),
                Err(e) => e,
            };
            match ladder.on_failure(rap.decode_number, leading, index) {
                RetryDecision::EarlierPoint(earlier) => {
                    tracing::debug!(
                        "Sample {} failed from unit {} ({}); retrying from unit {}",
                        n,
                        rap.decode_number,
                        e,
                        earlier.decode_number
                    );
                    rap = earlier;
                }
                RetryDecision::Escalate(tier) => {
                    tracing::debug!("Sample {} failed ({}); escalating to {} tier", n, e, tier);
                }
                RetryDecision::Exhausted => {
                    tracing::debug!("Sample {} failed at every random-access point: {}", n, e);
                    break None;
                }
            }
            self.last_rap = rap.decode_number;
            start = self.pipeline.seek_to(n, &rap, ladder.tier());
        };

        match picture {
            Some(picture) => {
                let written = self.convert(&picture, &format, out)?;
                self.last_delivered = n;
                Ok(written)
            }
            None if ladder.tier() == SeekPolicy::Aggressive => {
                let picture = self
                    .pipeline
                    .last_picture()
                    .cloned()
                    .ok_or_else(|| Error::decode("nothing decoded to fall back on"))?;
                tracing::warn!("Returning the last decoded picture for sample {}", n);
                let written = self.convert(&picture, &format, out)?;
                self.last_delivered = self.force_seek();
                Ok(written)
            }
            None => Err(Error::decode(format!("sample {n} could not be decoded"))),
        }
    }

    fn convert(&mut self, picture: &Picture, format: &FrameFormat, out: &mut [u8]) -> Result<usize> {
        self.converter.convert(picture, format, out)
    }
}
