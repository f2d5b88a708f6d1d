//! Integration tests for opening and indexing media.

mod common;

use common::{audio_track, config, ipbb_video, millisecond_video, open, open_gop_video, CLIP};
use framedex::backend::scripted::{ScriptedBackend, ScriptedMedia, ScriptedVideoTrack, ScriptedVideoUnit};
use framedex::config::EngineConfig;
use framedex::MediaHandle;
use framedex_common::{Error, MediaKind, PixelLayout, Rational, SeekPolicy};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

#[test]
fn open_indexes_both_tracks() {
    let media = ScriptedMedia::new("matroska,webm")
        .with_video(millisecond_video(12, 0))
        .with_audio(audio_track(6, 0));
    let (handle, stats) = open(media, EngineConfig::default());

    assert_eq!(handle.video_sample_count(), 12);
    assert_eq!(handle.audio_sample_count(), 6 * 1024);
    assert_eq!(handle.sync_offset(), 0);
    assert_eq!(handle.container_info().format_name, "matroska,webm");
    assert_eq!(stats.opens(), 1);
    assert_eq!(stats.seeks(), 0);
}

#[test]
fn open_missing_script_fails() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = MediaHandle::open(backend, "/nonexistent/clip.json", EngineConfig::default());
    assert!(matches!(result, Err(Error::Open(_))));
}

#[test]
fn open_script_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.json");
    std::fs::write(
        &path,
        r#"{
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "video": {
                "time_base": { "num": 1, "den": 25 },
                "frame_rate": { "num": 25, "den": 1 },
                "units": [
                    { "pts": 0, "dts": 0, "keyframe": true },
                    { "pts": 1, "dts": 1 },
                    { "pts": 2, "dts": 2 }
                ]
            }
        }"#,
    )
    .unwrap();

    let mut handle =
        MediaHandle::open(Arc::new(ScriptedBackend::new()), &path, EngineConfig::default()).unwrap();
    assert_eq!(handle.video_sample_count(), 3);
    assert!(handle.index().audio.is_none());

    handle.activate_video(SeekPolicy::Normal).unwrap();
    handle.prepare_video().unwrap();
    assert_eq!(common::read_frame(&mut handle, 2), common::frame(2));
}

#[test]
fn missing_track_is_reported_on_activation() {
    let media = ScriptedMedia::new("matroska,webm").with_audio(audio_track(4, 0));
    let (mut handle, _) = open(media, EngineConfig::default());
    assert!(matches!(
        handle.activate_video(SeekPolicy::Normal),
        Err(Error::TrackNotFound(MediaKind::Video))
    ));
    assert!(handle.video().is_none());
    assert!(handle.prepare_video().is_err());
    assert_eq!(common::read_frame(&mut handle, 0).len(), 0);
}

#[test]
fn activation_open_failure_leaves_track_inactive() {
    let media = ScriptedMedia::new("matroska,webm").with_video(ipbb_video(2, 1));
    let backend = ScriptedBackend::new().with_media(CLIP, media).open_limit(1);
    let mut handle = MediaHandle::open(Arc::new(backend), CLIP, EngineConfig::default()).unwrap();

    assert!(matches!(handle.activate_video(SeekPolicy::Normal), Err(Error::Open(_))));
    assert!(handle.video().is_none());
    assert!(common::read_frame(&mut handle, 0).is_empty());
}

#[test]
fn record_limit_leaves_an_inert_handle() {
    let media = ScriptedMedia::new("matroska,webm")
        .with_video(ipbb_video(3, 1))
        .with_audio(audio_track(20, 0));
    let mut limited = EngineConfig::default();
    limited.index.max_records = Some(5);
    let (mut handle, _) = open(media, limited);

    assert!(handle.index().is_empty());
    assert_eq!(handle.video_sample_count(), 0);
    assert!(matches!(
        handle.activate_video(SeekPolicy::Normal),
        Err(Error::Unavailable(_))
    ));
    assert!(matches!(handle.activate_audio(), Err(Error::Unavailable(_))));
    assert_eq!(handle.read_audio_range(0, 10, &mut [0u8; 40]), 0);
}

// ---------------------------------------------------------------------------
// Index contents
// ---------------------------------------------------------------------------

#[test]
fn keyframes_are_reported_in_presentation_order() {
    let (handle, _) = open(
        ScriptedMedia::new("matroska,webm").with_video(open_gop_video()),
        EngineConfig::default(),
    );
    let video = handle.index().video.as_ref().unwrap();
    assert!(video.is_reordered());
    assert!(video.mode().presentation_ts);

    let keyframes: Vec<u32> = (0..16).filter(|&n| handle.is_keyframe(n)).collect();
    assert_eq!(keyframes, vec![0, 6, 12]);
    assert!(!handle.is_keyframe(16));
    assert!(!handle.is_keyframe(u32::MAX));
}

#[test]
fn byte_offsets_need_every_video_record() {
    let mut complete = ScriptedVideoTrack::new(Rational::new(1, 90000), Rational::new(25, 1));
    let mut partial = complete.clone();
    for i in 0..8i64 {
        let unit = ScriptedVideoUnit::new(i * 3600, i * 3600, i % 4 == 0);
        complete = complete.push(unit.clone().at(i as u64 * 188));
        partial = partial.push(if i == 3 { unit } else { unit.at(i as u64 * 188) });
    }

    let (handle, _) = open(ScriptedMedia::new("mpegts").with_video(complete.clone()), EngineConfig::default());
    assert!(handle.index().video.as_ref().unwrap().mode().byte_offset);

    let (handle, _) = open(ScriptedMedia::new("mpegts").with_video(partial), EngineConfig::default());
    assert!(!handle.index().video.as_ref().unwrap().mode().byte_offset);

    let (handle, _) = open(
        ScriptedMedia::new("mpegts").with_video(complete).forbid_byte_seek(),
        EngineConfig::default(),
    );
    assert!(!handle.index().video.as_ref().unwrap().mode().byte_offset);
}

#[test]
fn byte_addressed_video_reads() {
    let mut track = ScriptedVideoTrack::new(Rational::new(1, 25), Rational::new(25, 1));
    for i in 0..12i64 {
        track = track.push(ScriptedVideoUnit::new(i, i, i % 4 == 0).at(1000 + i as u64 * 188));
    }
    let (mut handle, _) = open(ScriptedMedia::new("mpegts").with_video(track), config(1, SeekPolicy::Normal));
    handle.activate_video(SeekPolicy::Normal).unwrap();
    handle.prepare_video().unwrap();
    for n in [9, 2, 3, 11, 0] {
        assert_eq!(common::read_frame(&mut handle, n), common::frame(n as i64));
    }
}

#[test]
fn missing_timestamps_fall_back_to_decode_order() {
    let mut track = ScriptedVideoTrack::new(Rational::new(1, 25), Rational::new(25, 1));
    for i in 0..8i64 {
        track = track.push(ScriptedVideoUnit::new(i, i, i % 4 == 0).without_pts());
    }
    let (mut handle, _) = open(ScriptedMedia::new("avi").with_video(track), EngineConfig::default());
    let mode = handle.index().video.as_ref().unwrap().mode();
    assert!(!mode.presentation_ts);
    assert!(mode.decode_ts);

    handle.activate_video(SeekPolicy::Normal).unwrap();
    handle.prepare_video().unwrap();
    assert_eq!(common::read_frame(&mut handle, 6), common::frame(6));
}

// ---------------------------------------------------------------------------
// Output formats
// ---------------------------------------------------------------------------

#[test]
fn frame_rate_is_measured_from_timestamps() {
    let mut ntsc = ScriptedVideoTrack::new(Rational::new(1, 90000), Rational::new(30, 1));
    for i in 0..12i64 {
        ntsc = ntsc.push(ScriptedVideoUnit::new(i * 3003, i * 3003, i % 4 == 0));
    }
    let (mut handle, _) = open(ScriptedMedia::new("matroska,webm").with_video(ntsc), EngineConfig::default());
    handle.activate_video(SeekPolicy::Normal).unwrap();
    let format = handle.prepare_video().unwrap();
    assert_eq!(format.frame_rate, Rational::new(30000, 1001));
    assert_eq!(format.pixel_layout, PixelLayout::Yuy2);
    assert_eq!(format.frame_size(), 8 * 4 * 2);
}

#[test]
fn duplicate_timestamps_keep_the_declared_rate() {
    let mut track = ScriptedVideoTrack::new(Rational::new(1, 25), Rational::new(24, 1));
    for (i, pts) in [0i64, 1, 1, 2].into_iter().enumerate() {
        track = track.push(ScriptedVideoUnit::new(pts, i as i64, i == 0));
    }
    let (mut handle, _) = open(ScriptedMedia::new("matroska,webm").with_video(track), EngineConfig::default());
    handle.activate_video(SeekPolicy::Normal).unwrap();
    let format = handle.prepare_video().unwrap();
    assert_eq!(format.frame_rate, Rational::new(24, 1));
}

#[test]
fn high_depth_video_converts_to_yc48() {
    let mut track = ipbb_video(1, 1);
    track.pixel_format = "yuv420p10le".to_string();
    let (mut handle, _) = open(ScriptedMedia::new("matroska,webm").with_video(track), EngineConfig::default());
    handle.activate_video(SeekPolicy::Normal).unwrap();
    let format = handle.prepare_video().unwrap();
    assert_eq!(format.pixel_layout, PixelLayout::Yc48);
}

#[test]
fn audio_format_describes_the_track() {
    let mut track = audio_track(4, 0);
    track.bits_per_sample = 24;
    track.channels = 6;
    let (mut handle, _) = open(ScriptedMedia::new("matroska,webm").with_audio(track), EngineConfig::default());
    handle.activate_audio().unwrap();
    let format = handle.prepare_audio().unwrap();
    assert_eq!(format.channels, 6);
    assert_eq!(format.block_align(), 18);
    assert_eq!(format.avg_bytes_per_sec(), 48000 * 18);
    assert!(format.is_extensible());
}
