//! Shared fixtures for integration tests.
//!
//! Streams are built with the scripted backend. Video tracks use a 1/25 time
//! base with presentation timestamps equal to the 0-origin presentation
//! number, so the expected output of sample `n` is `frame(n)`.

#![allow(dead_code)]

use framedex::backend::scripted::{
    rendered_frame, rendered_pcm, ScriptStats, ScriptedAudioTrack, ScriptedAudioUnit,
    ScriptedBackend, ScriptedMedia, ScriptedVideoTrack, ScriptedVideoUnit,
};
use framedex::config::EngineConfig;
use framedex::MediaHandle;
use framedex_common::{Rational, SeekPolicy};
use std::sync::Arc;

/// Converted size of one 8x4 YUY2 frame.
pub const FRAME_BYTES: usize = 64;

pub const AUDIO_FRAME: u32 = 1024;

pub const CLIP: &str = "clip.json";

// ---------------------------------------------------------------------------
// Expected output
// ---------------------------------------------------------------------------

pub fn frame(pts: i64) -> Vec<u8> {
    rendered_frame(pts, false, FRAME_BYTES)
}

pub fn degraded_frame(pts: i64) -> Vec<u8> {
    rendered_frame(pts, true, FRAME_BYTES)
}

/// Stereo 16-bit PCM for decoded positions `start..start + count`.
pub fn pcm(start: u64, count: u64) -> Vec<u8> {
    rendered_pcm(start, count, 2, 16)
}

// ---------------------------------------------------------------------------
// Video streams
// ---------------------------------------------------------------------------

fn video_track(reorder_delay: u32) -> ScriptedVideoTrack {
    ScriptedVideoTrack::new(Rational::new(1, 25), Rational::new(25, 1)).reorder_delay(reorder_delay)
}

/// Closed GOPs of `1 + 3 * triples` frames: an I frame followed by
/// P B B triples, B frames unreferenced. Decode order within a GOP based at
/// `b` is `b, b+3, b+1, b+2, b+6, b+4, b+5, ...`.
pub fn ipbb_video(gops: i64, triples: i64) -> ScriptedVideoTrack {
    let gop_len = 1 + 3 * triples;
    let mut track = video_track(1);
    let mut dts = 0;
    for g in 0..gops {
        let base = g * gop_len;
        track = track.push(ScriptedVideoUnit::new(base, dts, true));
        dts += 1;
        for k in 0..triples {
            let p = base + 3 * k + 3;
            track = track
                .push(ScriptedVideoUnit::new(p, dts, false))
                .push(ScriptedVideoUnit::new(p - 2, dts + 1, false).non_reference())
                .push(ScriptedVideoUnit::new(p - 1, dts + 2, false).non_reference());
            dts += 3;
        }
    }
    track
}

/// Sixteen frames in three GOPs. The first is closed; the later two are
/// open, each keyframe followed by two B frames that precede it in
/// presentation order.
///
/// Decode order: `0 3 1 2 | 6 4 5 9 7 8 | 12 10 11 15 13 14`.
pub fn open_gop_video() -> ScriptedVideoTrack {
    let order: [(i64, bool, bool); 16] = [
        (0, true, true),
        (3, false, true),
        (1, false, false),
        (2, false, false),
        (6, true, true),
        (4, false, false),
        (5, false, false),
        (9, false, true),
        (7, false, false),
        (8, false, false),
        (12, true, true),
        (10, false, false),
        (11, false, false),
        (15, false, true),
        (13, false, false),
        (14, false, false),
    ];
    let mut track = video_track(1);
    for (dts, (pts, keyframe, reference)) in order.into_iter().enumerate() {
        let unit = ScriptedVideoUnit::new(pts, dts as i64, keyframe);
        track = track.push(if reference { unit } else { unit.non_reference() });
    }
    track
}

/// GOPs of an I frame and `gop_len - 1` P frames with no reordering.
/// Decode-order units listed in `corrupt` (0-origin) fail to decode.
pub fn ipp_video(gops: i64, gop_len: i64, corrupt: &[i64]) -> ScriptedVideoTrack {
    let mut track = video_track(0);
    for i in 0..gops * gop_len {
        let unit = ScriptedVideoUnit::new(i, i, i % gop_len == 0);
        track = track.push(if corrupt.contains(&i) { unit.corrupt() } else { unit });
    }
    track
}

// ---------------------------------------------------------------------------
// Audio streams
// ---------------------------------------------------------------------------

/// Stereo 16-bit 48 kHz audio in a 1/48000 time base, `frames` frames of
/// 1024 samples starting at `start_ts`.
pub fn audio_track(frames: u32, start_ts: i64) -> ScriptedAudioTrack {
    let mut track = ScriptedAudioTrack::new(Rational::new(1, 48000), 48000);
    for i in 0..frames {
        let ts = start_ts + (i * AUDIO_FRAME) as i64;
        track = track.push(ScriptedAudioUnit::new(ts, AUDIO_FRAME));
    }
    track
}

/// Video in a 1/1000 time base at 25 fps, starting at `start_ms`.
pub fn millisecond_video(frames: i64, start_ms: i64) -> ScriptedVideoTrack {
    let mut track = ScriptedVideoTrack::new(Rational::new(1, 1000), Rational::new(25, 1));
    for i in 0..frames {
        let ts = start_ms + i * 40;
        track = track.push(ScriptedVideoUnit::new(ts, ts, i % 4 == 0));
    }
    track
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

pub fn config(threads: u32, policy: SeekPolicy) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.threads = threads;
    config.video.seek_policy = policy;
    config
}

pub fn open(media: ScriptedMedia, config: EngineConfig) -> (MediaHandle, Arc<ScriptStats>) {
    let backend = ScriptedBackend::new().with_media(CLIP, media);
    let stats = backend.stats();
    let handle = MediaHandle::open(Arc::new(backend), CLIP, config).unwrap();
    (handle, stats)
}

/// Open, activate and prepare a video-only clip.
pub fn video_handle(
    track: ScriptedVideoTrack,
    threads: u32,
    policy: SeekPolicy,
) -> (MediaHandle, Arc<ScriptStats>) {
    let media = ScriptedMedia::new("matroska,webm").with_video(track);
    let (mut handle, stats) = open(media, config(threads, policy));
    handle.activate_video(policy).unwrap();
    let format = handle.prepare_video().unwrap();
    assert_eq!(format.frame_size(), FRAME_BYTES);
    (handle, stats)
}

/// Open, activate and prepare the audio track of `media`.
pub fn audio_handle(media: ScriptedMedia, config: EngineConfig) -> (MediaHandle, Arc<ScriptStats>) {
    let (mut handle, stats) = open(media, config);
    handle.activate_audio().unwrap();
    handle.prepare_audio().unwrap();
    (handle, stats)
}

/// Read video sample `n`; an empty vector when nothing was written.
pub fn read_frame(handle: &mut MediaHandle, n: u32) -> Vec<u8> {
    let mut buf = vec![0u8; FRAME_BYTES];
    let written = handle.read_video_sample(n, &mut buf);
    buf.truncate(written);
    buf
}

/// Read stereo 16-bit PCM; the buffer is trimmed to the samples written.
pub fn read_pcm(handle: &mut MediaHandle, start: u64, count: u32) -> Vec<u8> {
    let mut buf = vec![0xffu8; count as usize * 4];
    let samples = handle.read_audio_range(start, count, &mut buf);
    buf.truncate(samples * 4);
    buf
}
