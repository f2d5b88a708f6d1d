//! Scripted audio decoder.

use super::FLAG_CORRUPT;
use crate::backend::{AudioDecoder, CompressedUnit};
use bytes::{Buf, Bytes};
use framedex_common::{Error, Result};

/// Value of one channel at an absolute output sample position.
///
/// Never zero in its low byte, so decoded audio is always distinguishable
/// from silence.
pub fn pcm_sample(position: u64, channel: u16) -> u32 {
    let x = position
        .wrapping_mul(0x2545_f491_4f6c_dd1d)
        .wrapping_add(channel as u64 * 0x9e37_79b9);
    ((x >> 24) as u32) | 1
}

/// Interleaved little-endian PCM for `count` samples starting at `start`.
pub fn rendered_pcm(start: u64, count: u64, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let width = (bits_per_sample / 8).max(1) as usize;
    let mut out = Vec::with_capacity(count as usize * channels as usize * width);
    for position in start..start + count {
        for channel in 0..channels {
            out.extend_from_slice(&pcm_sample(position, channel).to_le_bytes()[..width]);
        }
    }
    out
}

#[derive(Debug)]
pub struct ScriptedAudioDecoder {
    channels: u16,
    bits_per_sample: u16,
    frame_size: Option<u32>,
    upsample: u32,
    parser_hints: bool,
}

impl ScriptedAudioDecoder {
    pub fn new(
        channels: u16,
        bits_per_sample: u16,
        frame_size: Option<u32>,
        upsample: u32,
        parser_hints: bool,
    ) -> Self {
        Self {
            channels,
            bits_per_sample,
            frame_size,
            upsample: upsample.max(1),
            parser_hints,
        }
    }

    fn parse(unit: &CompressedUnit) -> Result<(u8, u64, u32)> {
        let mut data: Bytes = unit.data.clone();
        if data.remaining() < 13 {
            return Err(Error::decode("truncated audio unit"));
        }
        Ok((data.get_u8(), data.get_u64_le(), data.get_u32_le()))
    }
}

impl AudioDecoder for ScriptedAudioDecoder {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<Bytes> {
        let (flags, first_sample, samples) = Self::parse(unit)?;
        if flags & FLAG_CORRUPT != 0 {
            return Err(Error::decode(format!("invalid audio frame at sample {first_sample}")));
        }
        let count = samples as u64 * self.upsample as u64;
        Ok(Bytes::from(rendered_pcm(
            first_sample,
            count,
            self.channels,
            self.bits_per_sample,
        )))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn frame_size(&self) -> Option<u32> {
        self.frame_size.map(|size| size * self.upsample)
    }

    fn parse_frame_length(&mut self, unit: &CompressedUnit) -> Option<u32> {
        if !self.parser_hints {
            return None;
        }
        Self::parse(unit).ok().map(|(_, _, samples)| samples)
    }
}
