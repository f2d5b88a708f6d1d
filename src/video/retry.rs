//! Retry ladder for failed video reads.
//!
//! A read starts at the `Normal` tier. Each failure either moves decoding to
//! an earlier random-access point or, once the retry budget is spent or the
//! start of the stream is reached, escalates to the next tier up to the
//! caller's ceiling.

use framedex_common::SeekPolicy;
use framedex_index::{RandomAccessPoint, VideoIndex};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry from a random-access point further back.
    EarlierPoint(RandomAccessPoint),
    /// Retry from the same point with a more tolerant tier.
    Escalate(SeekPolicy),
    /// No point and no tier left.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct RetryLadder {
    ceiling: SeekPolicy,
    tier: SeekPolicy,
    failures: u32,
    max_retries: u32,
}

impl RetryLadder {
    pub fn new(ceiling: SeekPolicy, max_retries: u32) -> Self {
        Self {
            ceiling,
            tier: SeekPolicy::Normal,
            failures: 0,
            max_retries,
        }
    }

    /// Tier the next attempt runs at.
    pub fn tier(&self) -> SeekPolicy {
        self.tier
    }

    /// Record a failure of the attempt that started at decode-order number
    /// `rap`. `leading` is the flag of the sample being read.
    pub fn on_failure(&mut self, rap: u32, leading: bool, index: &VideoIndex) -> RetryDecision {
        self.failures += 1;
        if self.failures <= self.max_retries && rap > 1 {
            return RetryDecision::EarlierPoint(index.find_random_access_point_from(rap - 1, leading));
        }
        match self.tier.escalate(self.ceiling) {
            Some(next) => {
                self.tier = next;
                self.failures = 0;
                RetryDecision::Escalate(next)
            }
            None => RetryDecision::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framedex_common::Rational;
    use framedex_index::{ContainerTraits, IndexBuilder, UnitMeta};

    /// Keyframe every fourth sample.
    fn index(samples: i64) -> VideoIndex {
        let mut builder =
            IndexBuilder::new(ContainerTraits::from_format_name("mov", false)).with_video(Rational::new(1, 25));
        for i in 0..samples {
            builder
                .push_video(UnitMeta {
                    pts: Some(i),
                    dts: Some(i),
                    byte_offset: None,
                    keyframe: i % 4 == 0,
                })
                .unwrap();
        }
        builder.finish().unwrap().video.unwrap()
    }

    #[test]
    fn test_walks_back_then_escalates() {
        let video = index(16);
        let mut ladder = RetryLadder::new(SeekPolicy::Aggressive, 3);
        assert_eq!(ladder.tier(), SeekPolicy::Normal);

        let RetryDecision::EarlierPoint(rap) = ladder.on_failure(13, false, &video) else {
            panic!("expected an earlier point");
        };
        assert_eq!(rap.decode_number, 9);
        let RetryDecision::EarlierPoint(rap) = ladder.on_failure(rap.decode_number, false, &video) else {
            panic!("expected an earlier point");
        };
        assert_eq!(rap.decode_number, 5);

        assert_eq!(ladder.on_failure(1, false, &video), RetryDecision::Escalate(SeekPolicy::Unsafe));
        assert_eq!(ladder.on_failure(1, false, &video), RetryDecision::Escalate(SeekPolicy::Aggressive));
        assert_eq!(ladder.on_failure(1, false, &video), RetryDecision::Exhausted);
    }

    #[test]
    fn test_leading_target_skips_an_extra_keyframe() {
        let video = index(16);
        let mut ladder = RetryLadder::new(SeekPolicy::Normal, 3);
        let RetryDecision::EarlierPoint(rap) = ladder.on_failure(13, true, &video) else {
            panic!("expected an earlier point");
        };
        assert_eq!(rap.decode_number, 5);
    }

    #[test]
    fn test_retry_budget() {
        let video = index(40);
        let mut ladder = RetryLadder::new(SeekPolicy::Unsafe, 2);
        assert!(matches!(ladder.on_failure(37, false, &video), RetryDecision::EarlierPoint(_)));
        assert!(matches!(ladder.on_failure(33, false, &video), RetryDecision::EarlierPoint(_)));
        assert_eq!(ladder.on_failure(29, false, &video), RetryDecision::Escalate(SeekPolicy::Unsafe));
        assert!(matches!(ladder.on_failure(29, false, &video), RetryDecision::EarlierPoint(_)));
    }

    #[test]
    fn test_normal_ceiling_never_escalates() {
        let video = index(4);
        let mut ladder = RetryLadder::new(SeekPolicy::Normal, 3);
        assert_eq!(ladder.on_failure(1, false, &video), RetryDecision::Exhausted);
        assert_eq!(ladder.tier(), SeekPolicy::Normal);
    }
}
