//! Scripted video decoder and colour converter.

use super::{FLAG_CORRUPT, FLAG_KEYFRAME, FLAG_REFERENCE};
use crate::backend::{ColorConverter, CompressedUnit, Picture, VideoDecoder, VideoParams};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use framedex_common::{Error, FrameFormat, PixelLayout, Result};
use std::collections::VecDeque;

/// XOR mask applied to every byte of a picture decoded from damaged references.
const DEGRADED_MASK: u8 = 0x5a;

#[derive(Debug, Clone, Copy)]
struct Decoded {
    order: i64,
    degraded: bool,
}

/// Decoder with a reorder buffer followed by frame-thread latency.
///
/// A picture leaves the reorder buffer once more than `reorder_delay`
/// pictures are waiting, smallest presentation order first, then spends
/// `threads - 1` further calls in flight.
#[derive(Debug)]
pub struct ScriptedVideoDecoder {
    width: u32,
    height: u32,
    reorder_delay: usize,
    in_flight: usize,
    reorder: Vec<Decoded>,
    fifo: VecDeque<Decoded>,
    skip_non_reference: bool,
    has_reference: bool,
    damaged: bool,
    keyframes_seen: u32,
    last_keyframe: Option<i64>,
}

impl ScriptedVideoDecoder {
    pub fn new(width: u32, height: u32, reorder_delay: u32, threads: u32) -> Self {
        Self {
            width,
            height,
            reorder_delay: reorder_delay as usize,
            in_flight: threads.max(1) as usize - 1,
            reorder: Vec::new(),
            fifo: VecDeque::new(),
            skip_non_reference: false,
            has_reference: false,
            damaged: false,
            keyframes_seen: 0,
            last_keyframe: None,
        }
    }

    fn take_earliest(&mut self) -> Option<Decoded> {
        let (i, _) = self
            .reorder
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| d.order)?;
        Some(self.reorder.swap_remove(i))
    }

    fn picture(&self, decoded: Decoded) -> Picture {
        let mut data = BytesMut::with_capacity(9);
        data.put_i64_le(decoded.order);
        data.put_u8(u8::from(decoded.degraded));
        Picture {
            width: self.width,
            height: self.height,
            pts: Some(decoded.order),
            data: data.freeze(),
        }
    }

    fn drain_one(&mut self) -> Option<Picture> {
        if let Some(earliest) = self.take_earliest() {
            self.fifo.push_back(earliest);
        }
        let decoded = self.fifo.pop_front()?;
        Some(self.picture(decoded))
    }
}

impl VideoDecoder for ScriptedVideoDecoder {
    fn decode(&mut self, unit: Option<&CompressedUnit>) -> Result<Option<Picture>> {
        let Some(unit) = unit else {
            return Ok(self.drain_one());
        };
        let mut data = unit.data.clone();
        if data.remaining() < 9 {
            return Err(Error::decode("truncated unit"));
        }
        let flags = data.get_u8();
        let order = data.get_i64_le();
        let keyframe = flags & FLAG_KEYFRAME != 0;

        if flags & FLAG_CORRUPT != 0 {
            self.damaged = true;
            return Err(Error::decode(format!("invalid bitstream in unit {order}")));
        }
        if keyframe {
            self.has_reference = true;
            self.damaged = false;
            self.keyframes_seen += 1;
            self.last_keyframe = Some(order);
        } else if !self.has_reference {
            return Err(Error::decode(format!("missing reference for unit {order}")));
        }
        if self.skip_non_reference && flags & FLAG_REFERENCE == 0 {
            return Ok(None);
        }

        // Leading pictures predict from the previous GOP.
        let orphaned = !keyframe
            && self.keyframes_seen < 2
            && self.last_keyframe.is_some_and(|k| order < k);
        self.reorder.push(Decoded {
            order,
            degraded: self.damaged || orphaned,
        });
        if self.reorder.len() > self.reorder_delay {
            if let Some(earliest) = self.take_earliest() {
                self.fifo.push_back(earliest);
            }
        }
        if self.fifo.len() > self.in_flight {
            return Ok(self.fifo.pop_front().map(|d| self.picture(d)));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<()> {
        self.reorder.clear();
        self.fifo.clear();
        self.has_reference = false;
        self.damaged = false;
        self.keyframes_seen = 0;
        self.last_keyframe = None;
        Ok(())
    }

    fn set_skip_non_reference(&mut self, skip: bool) {
        self.skip_non_reference = skip;
    }

    fn pipeline_delay(&self) -> u32 {
        (self.reorder_delay + self.in_flight) as u32
    }
}

/// Bytes a scripted picture converts to.
///
/// Every presentation order yields a distinct pattern, and a degraded
/// picture differs from the clean one in every byte.
pub fn rendered_frame(order: i64, degraded: bool, len: usize) -> Vec<u8> {
    let mask = if degraded { DEGRADED_MASK } else { 0 };
    (0..len as u64)
        .map(|i| {
            let mut x = (order as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
                ^ (i + 1).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            x ^= x >> 31;
            x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
            x ^= x >> 29;
            (x as u8) ^ mask
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct ScriptedColorConverter;

impl ColorConverter for ScriptedColorConverter {
    fn output_layout(&self, params: &VideoParams) -> PixelLayout {
        let format = params.pixel_format.as_str();
        if format.contains("rgb") || format.contains("bgr") {
            PixelLayout::Rgb24
        } else if ["10", "12", "16"].iter().any(|depth| format.contains(depth)) {
            PixelLayout::Yc48
        } else {
            PixelLayout::Yuy2
        }
    }

    fn convert(&mut self, picture: &Picture, format: &FrameFormat, out: &mut [u8]) -> Result<usize> {
        let size = format.frame_size();
        if out.len() < size {
            return Err(Error::invalid_input(format!(
                "output buffer holds {} bytes, picture needs {}",
                out.len(),
                size
            )));
        }
        let mut data: Bytes = picture.data.clone();
        if data.remaining() < 9 {
            return Err(Error::decode("picture payload truncated"));
        }
        let order = data.get_i64_le();
        let degraded = data.get_u8() != 0;
        out[..size].copy_from_slice(&rendered_frame(order, degraded, size));
        Ok(size)
    }
}
