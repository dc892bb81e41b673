//! Confidence-tiered TTL policy.

use std::time::Duration;

use super::CacheError;

const MIN_TTL: Duration = Duration::from_secs(1);

/// Maps a result's confidence to how long it may be served from cache.
///
/// Tiers are checked from the highest threshold down; the first tier whose
/// threshold the confidence meets wins, otherwise `floor` applies.
/// Last-known-good entries use the fixed `last_known_good` lifetime
/// regardless of confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    tiers: Vec<(f64, Duration)>,
    floor: Duration,
    last_known_good: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                (0.9, Duration::from_secs(4 * 3600)),
                (0.8, Duration::from_secs(2 * 3600)),
                (0.7, Duration::from_secs(3600)),
            ],
            floor: Duration::from_secs(30 * 60),
            last_known_good: Duration::from_secs(24 * 3600),
        }
    }
}

impl TtlPolicy {
    /// Build a policy from `(threshold, ttl)` pairs in any order.
    ///
    /// TTLs must be non-zero, must not decrease as the threshold rises and
    /// must not exceed `last_known_good`, which is the absolute ceiling.
    pub fn new(
        tiers: impl IntoIterator<Item = (f64, Duration)>,
        floor: Duration,
        last_known_good: Duration,
    ) -> Result<Self, CacheError> {
        let mut tiers: Vec<_> = tiers.into_iter().collect();
        tiers.sort_by(|a, b| b.0.total_cmp(&a.0));

        if floor < MIN_TTL || last_known_good < MIN_TTL || tiers.iter().any(|(_, ttl)| *ttl < MIN_TTL) {
            return Err(CacheError::InvalidPolicy("every TTL must be at least one second".into()));
        }
        if tiers.iter().any(|(threshold, _)| !(0.0..=1.0).contains(threshold)) {
            return Err(CacheError::InvalidPolicy("tier thresholds must lie in [0, 1]".into()));
        }
        let mut previous = floor;
        for (_, ttl) in tiers.iter().rev() {
            if *ttl < previous {
                return Err(CacheError::InvalidPolicy(
                    "TTL must not shrink as confidence rises".into(),
                ));
            }
            previous = *ttl;
        }
        if previous > last_known_good {
            return Err(CacheError::InvalidPolicy(format!(
                "TTL {previous:?} exceeds the last-known-good ceiling {last_known_good:?}"
            )));
        }

        Ok(Self { tiers, floor, last_known_good })
    }

    /// TTL for an entry with the given confidence.
    pub fn ttl_for(&self, confidence: f64) -> Duration {
        self.tiers
            .iter()
            .find(|(threshold, _)| confidence >= *threshold)
            .map_or(self.floor, |(_, ttl)| *ttl)
    }

    /// TTL for last-known-good entries.
    pub fn last_known_good_ttl(&self) -> Duration {
        self.last_known_good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3600;

    /// Validates the default tier boundaries.
    ///
    /// Assertions:
    /// - Confirms 0.9 and above map to 4h, 0.8 to 2h, 0.7 to 1h.
    /// - Confirms anything lower, including NaN, maps to 30min.
    #[test]
    fn test_default_tiers() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(1.0), Duration::from_secs(4 * HOUR));
        assert_eq!(policy.ttl_for(0.9), Duration::from_secs(4 * HOUR));
        assert_eq!(policy.ttl_for(0.89), Duration::from_secs(2 * HOUR));
        assert_eq!(policy.ttl_for(0.8), Duration::from_secs(2 * HOUR));
        assert_eq!(policy.ttl_for(0.7), Duration::from_secs(HOUR));
        assert_eq!(policy.ttl_for(0.69), Duration::from_secs(30 * 60));
        assert_eq!(policy.ttl_for(0.0), Duration::from_secs(30 * 60));
        assert_eq!(policy.ttl_for(f64::NAN), Duration::from_secs(30 * 60));
        assert_eq!(policy.last_known_good_ttl(), Duration::from_secs(24 * HOUR));
    }

    #[test]
    fn test_ttl_is_monotonic_in_confidence() {
        let policy = TtlPolicy::default();
        let mut previous = Duration::ZERO;
        for step in 0..=100 {
            let ttl = policy.ttl_for(f64::from(step) / 100.0);
            assert!(ttl >= previous);
            previous = ttl;
        }
    }

    /// Validates that no tier may outlive the last-known-good ceiling.
    ///
    /// Assertions:
    /// - Ensures a 48h tier under a 24h ceiling is rejected.
    /// - Ensures a floor above the ceiling is rejected.
    /// - Confirms a tier equal to the ceiling is accepted.
    #[test]
    fn test_rejects_ttl_above_ceiling() {
        let ceiling = Duration::from_secs(24 * HOUR);
        let too_long = TtlPolicy::new([(0.9, Duration::from_secs(48 * HOUR))], Duration::from_secs(60), ceiling);
        assert!(matches!(too_long, Err(CacheError::InvalidPolicy(msg)) if msg.contains("ceiling")));

        let floor_too_long = TtlPolicy::new(Vec::new(), Duration::from_secs(25 * HOUR), ceiling);
        assert!(floor_too_long.is_err());

        let at_ceiling = TtlPolicy::new([(0.9, ceiling)], Duration::from_secs(60), ceiling).unwrap();
        assert_eq!(at_ceiling.ttl_for(0.95), ceiling);
    }

    #[test]
    fn test_rejects_shrinking_tiers() {
        let result = TtlPolicy::new(
            [(0.9, Duration::from_secs(60)), (0.5, Duration::from_secs(600))],
            Duration::from_secs(30),
            Duration::from_secs(3600),
        );
        assert!(matches!(result, Err(CacheError::InvalidPolicy(_))));
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let result = TtlPolicy::new([], Duration::ZERO, Duration::from_secs(3600));
        assert!(result.is_err());
    }
}
