use crate::audio::UpsampleRule;
use framedex_common::SeekPolicy;
use serde::{Deserialize, Serialize};

/// Upper bound on the decoder worker-thread hint.
pub const MAX_THREADS: u32 = 4;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Decoder worker threads (1..=4). More threads add pipeline delay.
    #[serde(default = "default_threads")]
    pub threads: u32,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

fn default_threads() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Thread hint passed to the decoder, clamped to `1..=MAX_THREADS`.
    pub fn decoder_threads(&self) -> u32 {
        self.threads.clamp(1, MAX_THREADS)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    /// Most tolerant tier a failed read may escalate to.
    #[serde(default)]
    pub seek_policy: SeekPolicy,

    /// Failures per tier before escalating (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            seek_policy: SeekPolicy::default(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub upsample_rule: UpsampleRule,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Cap on records per track. Reaching it aborts indexing like an
    /// allocation failure.
    #[serde(default)]
    pub max_records: Option<usize>,
}
