//! Framedex-Index: per-sample stream index and random-access lookup
//!
//! The index is built once, in a single forward pass over the container, and
//! then answers every random-access question without touching the file again.
//!
//! # Modules
//!
//! - `record` - Per-sample video and audio records
//! - `store` - 1-origin record storage and the decode-order keyframe map
//! - `addressing` - Seek key spaces and their elimination rules
//! - `builder` - Incremental index construction from demuxed units
//! - `locator` - Random-access point lookup, including open-GOP leading frames
//! - `timing` - Frame rate estimation and audio/video sync offset
//!
//! # Numbering
//!
//! Every sample number is 1-origin. Video records are stored in presentation
//! order once the index is finished, and each keeps its decode-order number
//! in `sample_number`. The keyframe map is always indexed by decode order.

pub mod addressing;
pub mod builder;
pub mod index;
pub mod locator;
pub mod record;
pub mod store;
pub mod timing;

pub use addressing::{AddressingMode, ContainerTraits, SeekKey};
pub use builder::{IndexBuilder, UnitMeta, AUDIO_DURATION_CEILING};
pub use index::{AudioIndex, StreamIndex, VideoIndex};
pub use locator::{AudioPosition, RandomAccessPoint};
pub use record::{AudioFrameRecord, VideoFrameRecord};
pub use store::{KeyframeMap, RecordStore};
pub use timing::{estimate_frame_rate, rescale, sync_offset, try_ntsc_frame_rate};
