//! Decoder pipeline bookkeeping.
//!
//! The decoder holds back `delay` units before pictures start coming out, so
//! the picture for presentation sample `n` appears while decode-order unit
//! `n + delay` is being fed. The delay counter tracks how far the pipeline
//! actually lags; it grows whenever a unit produces no picture.

use crate::backend::{Container, Picture, SeekFlags, VideoDecoder};
use framedex_common::{Error, Result, SeekPolicy};
use framedex_index::{RandomAccessPoint, SeekKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Just seeked; the next pull primes the pipeline.
    NeedsPrime,
    /// Absorbing surplus delay from the pull after a seek.
    Priming,
    Steady,
}

/// Outcome of feeding one unit.
enum Step {
    Output(Picture),
    Buffered,
    EndOfStream,
}

pub struct DecodePipeline {
    container: Box<dyn Container>,
    decoder: Box<dyn VideoDecoder>,
    track: usize,
    sample_count: u32,
    delay: u32,
    phase: Phase,
    delay_count: u32,
    last_picture: Option<Picture>,
}

impl DecodePipeline {
    pub fn new(
        container: Box<dyn Container>,
        decoder: Box<dyn VideoDecoder>,
        track: usize,
        sample_count: u32,
    ) -> Self {
        let delay = decoder.pipeline_delay();
        Self {
            container,
            decoder,
            track,
            sample_count,
            delay,
            phase: Phase::NeedsPrime,
            delay_count: 0,
            last_picture: None,
        }
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    pub fn delay_count(&self) -> u32 {
        self.delay_count
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Most recent picture the decoder produced, for best-effort output.
    pub fn last_picture(&self) -> Option<&Picture> {
        self.last_picture.as_ref()
    }

    fn decode_next(&mut self) -> Result<Step> {
        let Some(unit) = self.container.read_next_unit(self.track)? else {
            return Ok(Step::EndOfStream);
        };
        match self.decoder.decode(Some(&unit))? {
            Some(picture) => {
                self.last_picture = Some(picture.clone());
                Ok(Step::Output(picture))
            }
            None => Ok(Step::Buffered),
        }
    }

    fn drain(&mut self) -> Result<Option<Picture>> {
        let picture = self.decoder.decode(None)?;
        if let Some(picture) = &picture {
            self.last_picture = Some(picture.clone());
        }
        Ok(picture)
    }

    fn seek(&mut self, key: SeekKey) -> Result<()> {
        if let Err(e) = self.container.seek(self.track, key, SeekFlags::BACKWARD) {
            tracing::debug!("Backward seek to {:?} failed ({}); retrying with any frame", key, e);
            self.container
                .seek(self.track, key, SeekFlags::BACKWARD.with_any())?;
        }
        Ok(())
    }

    /// Decode from the first unit until a picture comes out.
    ///
    /// Returns the first presentation sample that decodes, with its picture.
    pub fn find_first_valid(&mut self) -> Result<Option<(u32, Picture)>> {
        let mut no_output = 0u32;
        for i in 1..=self.sample_count + self.delay {
            let (picture, fed) = if i <= self.sample_count {
                match self.decode_next() {
                    Ok(Step::Output(picture)) => (Some(picture), true),
                    Ok(Step::Buffered) => (None, true),
                    Ok(Step::EndOfStream) => (self.drain()?, false),
                    Err(e) if e.is_recoverable() => {
                        tracing::trace!("Unit {} undecodable: {}", i, e);
                        (None, true)
                    }
                    Err(e) => return Err(e),
                }
            } else {
                (self.drain()?, false)
            };
            if let Some(picture) = picture {
                return Ok(Some((i - self.delay.min(no_output), picture)));
            }
            if fed {
                no_output += 1;
            }
        }
        Ok(None)
    }

    /// Seek to `rap` and replay up to the delay window before `target`.
    ///
    /// Non-reference units are skipped while the target is still more than
    /// the pipeline delay away. Returns the decode-order number the next pull
    /// starts at.
    pub fn seek_to(&mut self, target: u32, rap: &RandomAccessPoint, tier: SeekPolicy) -> Result<u32> {
        self.seek(rap.key)?;
        self.decoder.flush()?;
        self.phase = Phase::NeedsPrime;
        self.delay_count = 0;

        let skipping = rap.decode_number + self.delay < target;
        self.decoder.set_skip_non_reference(skipping);
        tracing::debug!(
            "Replaying from unit {} toward sample {} (delay {}, {} tier)",
            rap.decode_number,
            target,
            self.delay,
            tier
        );

        let mut i = rap.decode_number;
        while i < target + self.delay {
            if skipping && i + self.delay == target {
                self.decoder.set_skip_non_reference(false);
            }
            match self.decode_next() {
                Ok(Step::EndOfStream) => break,
                Ok(_) => {}
                Err(Error::Decode(reason)) if tier.tolerates_replay_errors() => {
                    tracing::trace!("Ignoring decode error at unit {}: {}", i, reason);
                }
                Err(e) => {
                    self.decoder.set_skip_non_reference(false);
                    return Err(e);
                }
            }
            i += 1;
        }
        self.decoder.set_skip_non_reference(false);
        self.delay_count = self.delay;
        Ok(i)
    }

    /// Feed units `current..=goal` and return the last picture produced.
    ///
    /// Once the container runs out without a picture in hand, the decoder is
    /// drained with empty input for the remaining positions, at least once.
    pub fn pull(&mut self, mut current: u32, goal: u32, tier: SeekPolicy) -> Result<Picture> {
        if self.phase == Phase::Priming {
            if self.delay_count > self.delay {
                self.delay_count -= 1;
            } else {
                self.phase = Phase::Steady;
            }
        }

        let mut output = None;
        while current <= goal {
            match self.decode_next() {
                Ok(Step::EndOfStream) => break,
                Ok(Step::Output(picture)) => output = Some(picture),
                Ok(Step::Buffered) => output = None,
                Err(Error::Decode(reason)) if tier == SeekPolicy::Aggressive => {
                    tracing::trace!("Ignoring decode error at unit {}: {}", current, reason);
                    output = None;
                }
                Err(e) => return Err(e),
            }
            current += 1;
            if output.is_none() {
                self.delay_count += 1;
            }
            if self.delay_count > self.delay && self.phase == Phase::Steady {
                break;
            }
        }

        if current > self.sample_count && output.is_none() && self.delay > 0 {
            loop {
                output = self.drain()?;
                current += 1;
                if output.is_none() {
                    self.delay_count += 1;
                }
                if current > goal {
                    break;
                }
            }
        }

        if self.phase == Phase::NeedsPrime {
            self.phase = Phase::Priming;
        }
        output.ok_or_else(|| Error::decode(format!("no picture after feeding up to unit {goal}")))
    }
}
