//! Integration tests for PCM range reads.

mod common;

use common::{audio_handle, audio_track, millisecond_video, pcm, read_pcm, AUDIO_FRAME};
use framedex::audio::UpsampleRule;
use framedex::backend::scripted::{ScriptedAudioTrack, ScriptedAudioUnit, ScriptedMedia};
use framedex::config::EngineConfig;
use framedex_common::{Error, Rational};

fn audio_only(track: ScriptedAudioTrack) -> ScriptedMedia {
    ScriptedMedia::new("matroska,webm").with_audio(track)
}

// ---------------------------------------------------------------------------
// Continuation
// ---------------------------------------------------------------------------

#[test]
fn split_reads_match_a_single_read() {
    let (mut split, _) = audio_handle(audio_only(audio_track(10, 0)), EngineConfig::default());
    let mut joined = read_pcm(&mut split, 0, 100);
    joined.extend(read_pcm(&mut split, 100, 150));

    let (mut whole, _) = audio_handle(audio_only(audio_track(10, 0)), EngineConfig::default());
    let single = read_pcm(&mut whole, 0, 250);

    assert_eq!(joined, single);
    assert_eq!(single, pcm(0, 250));
}

#[test]
fn continuation_crosses_frames_without_seeking() {
    let (mut handle, stats) = audio_handle(audio_only(audio_track(10, 0)), EngineConfig::default());
    assert_eq!(read_pcm(&mut handle, 0, 1000), pcm(0, 1000));
    let seeks = stats.seeks();

    assert_eq!(read_pcm(&mut handle, 1000, 1000), pcm(1000, 1000));
    assert_eq!(read_pcm(&mut handle, 2000, 2096), pcm(2000, 2096));
    assert_eq!(read_pcm(&mut handle, 4096, 10), pcm(4096, 10));
    assert_eq!(stats.seeks(), seeks);
}

#[test]
fn non_contiguous_reads_seek() {
    let (mut handle, stats) = audio_handle(audio_only(audio_track(10, 0)), EngineConfig::default());
    assert_eq!(read_pcm(&mut handle, 5000, 100), pcm(5000, 100));
    assert_eq!(read_pcm(&mut handle, 10, 20), pcm(10, 20));
    assert_eq!(read_pcm(&mut handle, 9000, 2000), pcm(9000, 1240));
    assert_eq!(stats.seeks(), 3);
}

#[test]
fn reads_past_the_end() {
    let (mut handle, _) = audio_handle(audio_only(audio_track(10, 0)), EngineConfig::default());
    let total = 10 * AUDIO_FRAME as u64;
    assert_eq!(handle.audio_sample_count(), total);
    assert!(read_pcm(&mut handle, total, 10).is_empty());
    assert_eq!(read_pcm(&mut handle, total - 40, 100), pcm(total - 40, 40));
}

#[test]
fn count_is_limited_by_the_buffer() {
    let (mut handle, _) = audio_handle(audio_only(audio_track(10, 0)), EngineConfig::default());
    let mut buf = vec![0u8; 10 * 4];
    assert_eq!(handle.read_audio_range(0, 100, &mut buf), 10);
    assert_eq!(buf, pcm(0, 10));
}

// ---------------------------------------------------------------------------
// Audio/video sync
// ---------------------------------------------------------------------------

/// Audio starting 100 ms (4800 samples) after the video.
fn late_audio() -> ScriptedMedia {
    ScriptedMedia::new("matroska,webm")
        .with_video(millisecond_video(25, 0))
        .with_audio(audio_track(10, 4800))
}

#[test]
fn request_before_audio_start_is_empty() {
    let (mut handle, _) = audio_handle(late_audio(), EngineConfig::default());
    assert_eq!(handle.sync_offset(), 4800);
    assert!(read_pcm(&mut handle, 0, 1000).is_empty());
    assert!(read_pcm(&mut handle, 3800, 1000).is_empty());
}

#[test]
fn request_after_audio_start_is_shifted() {
    let (mut handle, _) = audio_handle(late_audio(), EngineConfig::default());
    assert_eq!(read_pcm(&mut handle, 4800, 100), pcm(0, 100));
    assert_eq!(read_pcm(&mut handle, 4900, 100), pcm(100, 100));
}

#[test]
fn request_straddling_audio_start_is_padded_with_silence() {
    let (mut handle, _) = audio_handle(late_audio(), EngineConfig::default());
    let mut expected = vec![0u8; 100 * 4];
    expected.extend(pcm(0, 100));
    assert_eq!(read_pcm(&mut handle, 4700, 200), expected);

    // The decoded part continues like any other read.
    assert_eq!(read_pcm(&mut handle, 4900, 50), pcm(100, 50));
}

#[test]
fn early_audio_skips_its_head() {
    let media = ScriptedMedia::new("matroska,webm")
        .with_video(millisecond_video(25, 100))
        .with_audio(audio_track(10, 0));
    let (mut handle, _) = audio_handle(media, EngineConfig::default());
    assert_eq!(handle.sync_offset(), -4800);
    assert_eq!(read_pcm(&mut handle, 0, 100), pcm(4800, 100));
}

#[test]
fn request_at_the_sample_ceiling_is_empty() {
    let early_audio = ScriptedMedia::new("matroska,webm")
        .with_video(millisecond_video(25, 100))
        .with_audio(audio_track(10, 0));
    for media in [late_audio(), early_audio, audio_only(audio_track(10, 0))] {
        let (mut handle, _) = audio_handle(media, EngineConfig::default());
        assert!(read_pcm(&mut handle, u64::MAX - 10, 100).is_empty());
        assert!(read_pcm(&mut handle, u64::MAX, 1).is_empty());

        // The handle stays usable afterwards.
        let at = handle.sync_offset().max(0) as u64;
        assert_eq!(read_pcm(&mut handle, at, 10).len(), 10 * 4);
    }
}

// ---------------------------------------------------------------------------
// Upsampling
// ---------------------------------------------------------------------------

fn upsampled_audio() -> ScriptedMedia {
    audio_only(audio_track(10, 0).fixed_frame_size(AUDIO_FRAME).upsample(2))
}

#[test]
fn upsampling_decoder_doubles_the_track() {
    let (mut handle, _) = audio_handle(upsampled_audio(), EngineConfig::default());
    assert_eq!(handle.audio_sample_count(), 20 * AUDIO_FRAME as u64);
    assert_eq!(read_pcm(&mut handle, 3000, 100), pcm(3000, 100));
    assert_eq!(read_pcm(&mut handle, 20_000, 1000), pcm(20_000, 480));
}

#[test]
fn upsampling_rule_off_trusts_the_index() {
    let mut config = EngineConfig::default();
    config.audio.upsample_rule = UpsampleRule::Off;
    let (mut handle, _) = audio_handle(upsampled_audio(), config);
    assert_eq!(handle.audio_sample_count(), 10 * AUDIO_FRAME as u64);

    // Sample 3000 maps into the third frame, which decodes to positions
    // from 4096.
    assert_eq!(read_pcm(&mut handle, 3000, 100), pcm(4096 + 952, 100));
}

// ---------------------------------------------------------------------------
// Seeking
// ---------------------------------------------------------------------------

#[test]
fn byte_offsets_address_transport_streams() {
    let mut track = ScriptedAudioTrack::new(Rational::new(1, 48000), 48000);
    for i in 0..10u32 {
        let unit = ScriptedAudioUnit::new((i * AUDIO_FRAME) as i64, AUDIO_FRAME);
        track = track.push(match i {
            0 => unit.at(0),
            5 => unit.at(5000),
            _ => unit,
        });
    }
    let (mut handle, _) = audio_handle(ScriptedMedia::new("mpegts").with_audio(track), EngineConfig::default());
    assert!(handle.index().audio.as_ref().unwrap().mode().byte_offset);

    assert_eq!(read_pcm(&mut handle, 5 * 1024 + 10, 100), pcm(5 * 1024 + 10, 100));
    // No offset between frames 1 and 6: decoding restarts at frame 1.
    assert_eq!(read_pcm(&mut handle, 3100, 50), pcm(3100, 50));
}

#[test]
fn seek_falls_back_to_any_frame() {
    let mut track = audio_track(10, 0);
    for unit in &mut track.units {
        unit.keyframe = false;
    }
    let (mut handle, stats) = audio_handle(audio_only(track), EngineConfig::default());
    assert_eq!(read_pcm(&mut handle, 2048, 100), pcm(2048, 100));
    // The keyframe-only seek fails before the fallback lands.
    assert_eq!(stats.seeks(), 2);
}

#[test]
fn corrupt_frame_ends_the_read() {
    let mut track = ScriptedAudioTrack::new(Rational::new(1, 48000), 48000);
    for i in 0..4u32 {
        let unit = ScriptedAudioUnit::new((i * AUDIO_FRAME) as i64, AUDIO_FRAME);
        track = track.push(if i == 2 { unit.corrupt() } else { unit });
    }
    let (mut handle, _) = audio_handle(audio_only(track), EngineConfig::default());
    assert_eq!(read_pcm(&mut handle, 1000, 2000), pcm(1000, 1048));
}

#[test]
fn silent_track_cannot_be_prepared() {
    let mut track = ScriptedAudioTrack::new(Rational::new(1, 48000), 48000);
    for i in 0..4 {
        track = track.push(ScriptedAudioUnit::new(i, 0));
    }
    let (mut handle, _) = common::open(audio_only(track), EngineConfig::default());
    handle.activate_audio().unwrap();
    let err = handle.prepare_audio().unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
    assert!(read_pcm(&mut handle, 0, 10).is_empty());
}
