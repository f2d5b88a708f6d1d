//! Framedex-Common: shared types and the error taxonomy.
//!
//! This crate provides functionality used across the framedex workspace:
//!
//! - **Error Handling**: the engine's failure taxonomy and result alias
//! - **Core Types**: media kinds, seek policies, rationals and output formats
//!
//! # Examples
//!
//! ```
//! use framedex_common::{Error, MediaKind, Rational, Result, SeekPolicy};
//!
//! let rate = Rational::new(30000, 1001);
//! assert!((rate.as_f64() - 29.97).abs() < 0.01);
//!
//! assert_eq!(SeekPolicy::default(), SeekPolicy::Normal);
//!
//! fn example() -> Result<()> {
//!     Err(Error::TrackNotFound(MediaKind::Video))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
