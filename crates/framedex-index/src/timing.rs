//! Frame rate and audio/video sync derived from the index.

use crate::index::{AudioIndex, VideoIndex};
use framedex_common::{Error, Rational, Result};

/// Relative tolerance when matching a measured rate against the
/// `k * 1000 / 1001` family.
const NTSC_TOLERANCE: f64 = 5e-5;

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Split a positive value into a significand in `[1, 10)` and a power of ten.
fn sig_exp10(mut value: f64) -> (f64, f64) {
    let mut exponent = 1.0;
    while value < 1.0 {
        value *= 10.0;
        exponent /= 10.0;
    }
    while value >= 10.0 {
        value /= 10.0;
        exponent *= 10.0;
    }
    (value, exponent)
}

/// Snap a measured rate onto `k * 1000 / 1001` when it is one.
pub fn try_ntsc_frame_rate(fps: f64) -> Option<Rational> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    let k = (fps * 1001.0 / 1000.0).round();
    if k < 1.0 {
        return None;
    }
    let num = u32::try_from(k as u64 * 1000).ok()?;
    let (fps_sig, exponent) = sig_exp10(fps);
    let candidate = num as f64 / 1001.0;
    if (candidate / exponent - fps_sig).abs() < NTSC_TOLERANCE {
        Some(Rational::new(num, 1001))
    } else {
        None
    }
}

/// Derive the video frame rate from presentation timestamps.
///
/// Falls back to `declared` when the track has at most one sample or no
/// timestamp addressing survived. Two consecutive samples sharing a
/// presentation timestamp is reported as [`Error::TimingInconsistency`].
pub fn estimate_frame_rate(video: &VideoIndex, declared: Rational) -> Result<Rational> {
    let count = video.sample_count();
    if count <= 1 || !video.mode().has_timestamps() {
        return Ok(declared);
    }
    let pts: Option<Vec<i64>> = video.records().iter().map(|r| r.pts).collect();
    let Some(pts) = pts else {
        return Ok(declared);
    };

    let mut timebase = 0u64;
    for (i, pair) in pts.windows(2).enumerate() {
        if pair[1] == pair[0] {
            return Err(Error::TimingInconsistency { sample: i as u32 + 2 });
        }
        timebase = gcd(timebase, pair[1].abs_diff(pair[0]));
    }

    let first = pts[0];
    let largest = pts[pts.len() - 1];
    let second_largest = pts[pts.len() - 2];

    let time_base = video.time_base();
    let timebase = timebase * time_base.num as u64;
    let timescale = time_base.den as u64;
    let reduce = gcd(timescale, timebase);
    if reduce == 0 {
        return Ok(declared);
    }
    let (timescale, timebase) = (timescale / reduce, timebase / reduce);
    let span = largest.abs_diff(first) + largest.abs_diff(second_largest);
    let duration = span / reduce;
    if duration == 0 || timebase == 0 {
        return Ok(declared);
    }

    let fps = count as f64 * (timescale as f64 / duration as f64);
    if let Some(rate) = try_ntsc_frame_rate(fps) {
        tracing::debug!("Frame rate {:.6} snapped to {}", fps, rate);
        return Ok(rate);
    }

    let num = (fps * timebase as f64 + 0.5) as u64;
    let common = gcd(num, timebase).max(1);
    match (
        u32::try_from(num / common),
        u32::try_from(timebase / common),
    ) {
        (Ok(num), Ok(den)) if num > 0 => Ok(Rational::new(num, den)),
        _ => {
            tracing::warn!("Frame rate {:.6} not representable; using {}", fps, declared);
            Ok(declared)
        }
    }
}

/// Rescale a timestamp between time bases, rounding half away from zero.
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return 0;
    }
    let half = den / 2;
    let rounded = if num >= 0 { (num + half) / den } else { (num - half) / den };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Audio start minus video start, in audio samples.
///
/// Uses presentation timestamps when the video track is addressed by them,
/// otherwise decode timestamps. Zero when either start is unknown.
pub fn sync_offset(video: &VideoIndex, audio: &AudioIndex) -> i64 {
    let (Some(v), Some(a)) = (video.record(1), audio.record(1)) else {
        return 0;
    };
    let mode = video.mode();
    let starts = if mode.presentation_ts {
        v.pts.zip(a.pts)
    } else if mode.decode_ts {
        v.dts.zip(a.dts)
    } else {
        None
    };
    let Some((video_start, audio_start)) = starts else {
        return 0;
    };
    let gap = audio_start - rescale(video_start, video.time_base(), audio.time_base());
    if gap == 0 || audio.sample_rate() == 0 {
        return 0;
    }
    let offset = rescale(gap, audio.time_base(), Rational::new(1, audio.sample_rate()));
    tracing::debug!("Audio/video sync offset: {} samples", offset);
    offset
}
