// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Exponential backoff with additive jitter.

use rand::Rng;
use std::time::Duration;

/// Backoff schedule: `base * 2^retry`, plus up to the same amount of jitter,
/// never shorter than the service's retry hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    /// Schedule starting at `base`.
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before retry `retry` (0 for the first retry), without jitter.
    pub fn nominal(&self, retry: u32) -> Duration {
        self.base.saturating_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX))
    }

    /// Delay before retry `retry`, jittered and floored by `hint`.
    pub fn delay(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let nominal = self.nominal(retry);
        let jittered = nominal + jitter(nominal);
        hint.map_or(jittered, |h| jittered.max(h))
    }
}

fn jitter(upto: Duration) -> Duration {
    let millis = u64::try_from(upto.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_doubles() {
        let b = Backoff::new(Duration::from_millis(200));
        assert_eq!(b.nominal(0), Duration::from_millis(200));
        assert_eq!(b.nominal(1), Duration::from_millis(400));
        assert_eq!(b.nominal(2), Duration::from_millis(800));
    }

    #[test]
    fn jitter_stays_within_one_nominal() {
        let b = Backoff::new(Duration::from_millis(200));
        for _ in 0..200 {
            let d = b.delay(1, None);
            assert!(d >= Duration::from_millis(400));
            assert!(d < Duration::from_millis(800));
        }
    }

    #[test]
    fn hint_is_a_floor() {
        let b = Backoff::new(Duration::from_millis(10));
        assert!(b.delay(0, Some(Duration::from_secs(2))) >= Duration::from_secs(2));
    }
}
