mod cli;

use framedex::backend::ScriptedBackend;
use framedex::{config, MediaHandle};
use framedex_common::{Rational, SeekPolicy};
use framedex_index::{estimate_frame_rate, AddressingMode};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "framedex=trace,framedex_index=trace,framedex_common=debug".to_string()
        } else {
            "framedex=info,framedex_index=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { script, json } => probe_script(&script, cli.config.as_deref(), json),
        Commands::ReadVideo {
            script,
            frame,
            policy,
            output,
        } => read_video(&script, cli.config.as_deref(), frame, policy, output.as_deref()),
        Commands::ReadAudio {
            script,
            start,
            count,
            output,
        } => read_audio(&script, cli.config.as_deref(), start, count, output.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("framedex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_handle(script: &Path, config_path: Option<&Path>) -> Result<MediaHandle> {
    let config = config::load_config_or_default(config_path)?;
    if !script.exists() {
        anyhow::bail!("Script does not exist: {:?}", script);
    }
    let backend = Arc::new(ScriptedBackend::new());
    MediaHandle::open(backend, script, config).with_context(|| format!("Failed to open {:?}", script))
}

#[derive(Serialize)]
struct VideoSummary {
    samples: u32,
    keyframes: usize,
    reordered: bool,
    addressing: AddressingMode,
    time_base: Rational,
    frame_rate: Option<Rational>,
    max_keyframe_interval_secs: Option<f64>,
}

#[derive(Serialize)]
struct AudioSummary {
    frames: u32,
    samples: u64,
    sample_rate: u32,
    constant_frame_length: Option<u32>,
    addressing: AddressingMode,
}

#[derive(Serialize)]
struct ProbeSummary {
    format_name: String,
    byte_seek_forbidden: bool,
    video: Option<VideoSummary>,
    audio: Option<AudioSummary>,
    sync_offset: i64,
}

fn probe_script(script: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let handle = open_handle(script, config_path)?;
    let index = handle.index();
    let info = handle.container_info();

    let summary = ProbeSummary {
        format_name: info.format_name.clone(),
        byte_seek_forbidden: info.byte_seek_forbidden,
        video: index.video.as_ref().map(|video| VideoSummary {
            samples: video.sample_count(),
            keyframes: video.keyframes().count(),
            reordered: video.is_reordered(),
            addressing: video.mode(),
            time_base: video.time_base(),
            frame_rate: estimate_frame_rate(video, Rational::default()).ok(),
            max_keyframe_interval_secs: video.max_keyframe_interval_secs(),
        }),
        audio: index.audio.as_ref().map(|audio| AudioSummary {
            frames: audio.frame_count(),
            samples: audio.total_length(),
            sample_rate: audio.sample_rate(),
            constant_frame_length: audio.constant_frame_length(),
            addressing: audio.mode(),
        }),
        sync_offset: index.sync_offset,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Script: {}", script.display());
    println!("Container: {}", summary.format_name);
    if let Some(video) = &summary.video {
        println!("\nVideo: {} samples, {} keyframes", video.samples, video.keyframes);
        println!("  Addressing: {}", video.addressing);
        println!("  Reordered: {}", video.reordered);
        match video.frame_rate {
            Some(rate) => println!("  Frame rate: {} ({:.3} fps)", rate, rate.as_f64()),
            None => println!("  Frame rate: inconsistent timestamps"),
        }
        if let Some(gop) = video.max_keyframe_interval_secs {
            println!("  Max keyframe interval: {:.3}s", gop);
        }
    } else {
        println!("\nVideo: none");
    }
    if let Some(audio) = &summary.audio {
        println!(
            "\nAudio: {} frames, {} samples at {} Hz",
            audio.frames, audio.samples, audio.sample_rate
        );
        println!("  Addressing: {}", audio.addressing);
        if let Some(length) = audio.constant_frame_length {
            println!("  Frame length: {}", length);
        }
    } else {
        println!("\nAudio: none");
    }
    println!("\nSync offset: {} samples", summary.sync_offset);
    Ok(())
}

fn read_video(
    script: &Path,
    config_path: Option<&Path>,
    frame: u32,
    policy: Option<SeekPolicy>,
    output: Option<&Path>,
) -> Result<()> {
    let mut handle = open_handle(script, config_path)?;
    let policy = policy.unwrap_or(handle.config().video.seek_policy);
    handle.activate_video(policy)?;
    let format = handle.prepare_video()?;

    let mut buf = vec![0u8; format.frame_size()];
    let written = handle.read_video_sample(frame, &mut buf);
    if written == 0 {
        anyhow::bail!("Frame {} could not be decoded under the {} policy", frame, policy);
    }

    println!(
        "Frame {}: {} bytes {}x{} {}{}",
        frame,
        written,
        format.width,
        format.height,
        format.pixel_layout,
        if handle.is_keyframe(frame) { " (keyframe)" } else { "" }
    );
    if let Some(path) = output {
        std::fs::write(path, &buf[..written])
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Written to {}", path.display());
    }
    Ok(())
}

fn read_audio(
    script: &Path,
    config_path: Option<&Path>,
    start: u64,
    count: u32,
    output: Option<&Path>,
) -> Result<()> {
    let mut handle = open_handle(script, config_path)?;
    handle.activate_audio()?;
    let format = handle.prepare_audio()?;

    let block_align = format.block_align() as usize;
    let mut buf = vec![0u8; count as usize * block_align];
    let samples = handle.read_audio_range(start, count, &mut buf);

    println!(
        "Samples {}..{}: {} read ({} ch, {} Hz, {} bits{})",
        start,
        start + count as u64,
        samples,
        format.channels,
        format.sample_rate,
        format.bits_per_sample,
        if format.is_extensible() { ", extensible" } else { "" }
    );
    if let Some(path) = output {
        std::fs::write(path, &buf[..samples * block_align])
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Written to {}", path.display());
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::EngineConfig::default()
        }
    };
    println!("  Decoder threads: {}", config.decoder_threads());
    println!("  Seek policy: {}", config.video.seek_policy);
    println!("  Max retries: {}", config.video.max_retries);
    println!("  Upsample rule: {:?}", config.audio.upsample_rule);
    match config.index.max_records {
        Some(limit) => println!("  Record limit: {}", limit),
        None => println!("  Record limit: none"),
    }
    Ok(())
}
