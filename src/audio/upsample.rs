//! Detection of decoders that output more samples than the container declares.
//!
//! HE-AAC is the usual case: the container counts 1024 samples per frame
//! while the decoder produces 2048 after spectral band replication.

use framedex_index::AudioIndex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsampleRule {
    /// Trust the indexed frame lengths.
    Off,
    /// Double the track length when the indexed lengths are constant and at
    /// most half of what the opened decoder produces per frame.
    #[default]
    HalfNominal,
}

/// Track length after applying an [`UpsampleRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upsampling {
    pub total_samples: u64,
    /// Factor applied to every indexed frame length.
    pub scale: u32,
}

impl UpsampleRule {
    pub fn apply(self, index: &AudioIndex, decoder_frame_size: Option<u32>) -> Upsampling {
        let total_samples = index.total_length();
        let plain = Upsampling {
            total_samples,
            scale: 1,
        };
        if self == Self::Off || index.constant_frame_length().is_none() {
            return plain;
        }
        let Some(frame_size) = decoder_frame_size.filter(|&n| n > 0) else {
            return plain;
        };
        if total_samples * 2 <= index.frame_count() as u64 * frame_size as u64 {
            tracing::debug!(
                "Decoder frame size {} is twice the indexed length; doubling {} samples",
                frame_size,
                total_samples
            );
            Upsampling {
                total_samples: total_samples * 2,
                scale: 2,
            }
        } else {
            plain
        }
    }
}
