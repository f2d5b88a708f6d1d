//! Dense, append-only record storage with 1-origin sample numbering.
//!
//! Sample number `n` lives in slot `n - 1`. Number 0 is never valid and every
//! accessor rejects it explicitly instead of relying on a sentinel slot.

use framedex_common::{Error, Result};

/// Capacity reserved on the first push.
pub const INITIAL_CAPACITY: usize = 1 << 16;

/// Growable record array addressed by 1-origin sample number.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordStore<T> {
    records: Vec<T>,
    limit: Option<usize>,
}

impl<T> RecordStore<T> {
    /// Create an empty store without a record limit.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            limit: None,
        }
    }

    /// Create an empty store that refuses to grow past `limit` records.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            limit,
        }
    }

    /// Append a record and return its sample number.
    ///
    /// Capacity doubles when full. A failed reservation, or a push beyond
    /// the configured limit, is an allocation failure.
    pub fn push(&mut self, record: T) -> Result<u32> {
        if let Some(limit) = self.limit {
            if self.records.len() >= limit {
                return Err(Error::allocation(format!(
                    "record store limit of {limit} records reached"
                )));
            }
        }
        if self.records.len() == self.records.capacity() {
            self.grow()?;
        }
        self.records.push(record);
        u32::try_from(self.records.len())
            .map_err(|_| Error::allocation("sample number exceeds u32 range"))
    }

    fn grow(&mut self) -> Result<()> {
        let mut additional = self.records.capacity().max(INITIAL_CAPACITY);
        if let Some(limit) = self.limit {
            additional = additional.min(limit.saturating_sub(self.records.len())).max(1);
        }
        self.records.try_reserve_exact(additional)?;
        Ok(())
    }

    /// Number of records; also the last valid sample number.
    pub fn len(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by 1-origin sample number.
    pub fn get(&self, sample_number: u32) -> Option<&T> {
        let slot = (sample_number as usize).checked_sub(1)?;
        self.records.get(slot)
    }

    /// Get a mutable record by 1-origin sample number.
    pub fn get_mut(&mut self, sample_number: u32) -> Option<&mut T> {
        let slot = (sample_number as usize).checked_sub(1)?;
        self.records.get_mut(slot)
    }

    /// Iterate records in storage order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> {
        self.records.iter()
    }

    /// Iterate `(sample_number, record)` pairs.
    pub fn numbered(&self) -> impl Iterator<Item = (u32, &T)> {
        self.records
            .iter()
            .enumerate()
            .map(|(slot, record)| (slot as u32 + 1, record))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.records
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.records
    }

    /// Release unused capacity once the scan is over.
    pub fn shrink_to_fit(&mut self) {
        self.records.shrink_to_fit();
    }
}

impl<T> Default for RecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Random-access flags in decode order, 1-origin.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyframeMap {
    flags: Vec<bool>,
}

impl KeyframeMap {
    /// Build from flags listed in decode order.
    pub fn from_decode_order<I>(flags: I) -> Result<Self>
    where
        I: ExactSizeIterator<Item = bool>,
    {
        let mut buf = Vec::new();
        buf.try_reserve_exact(flags.len())?;
        buf.extend(flags);
        Ok(Self { flags: buf })
    }

    /// Whether the unit at `decode_number` is a random-access point.
    /// Out-of-range numbers, including 0, are never keyframes.
    pub fn is_keyframe(&self, decode_number: u32) -> bool {
        (decode_number as usize)
            .checked_sub(1)
            .and_then(|slot| self.flags.get(slot))
            .copied()
            .unwrap_or(false)
    }

    pub fn len(&self) -> u32 {
        self.flags.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&k| k).count()
    }
}
