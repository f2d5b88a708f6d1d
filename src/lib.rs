//! Framedex - frame-accurate random access over decoded media
//!
//! The library indexes a container once, then serves arbitrary video samples
//! and PCM ranges by seeking to random-access points and replaying the
//! decoder through its delay.
//!
//! - `backend` - demux/decode/convert traits and the scripted backend
//! - `indexer` - the open-time scan feeding `framedex-index`
//! - `video` - seek, replay, pull and the retry ladder
//! - `audio` - PCM range reads with carry-over between calls
//! - `handle` - the host-facing [`MediaHandle`]
//! - `config` - TOML engine configuration

pub mod audio;
pub mod backend;
pub mod config;
pub mod handle;
pub mod indexer;
pub mod video;

pub use handle::MediaHandle;
