//! Staleness checks between remote and local modification times

use chrono::{DateTime, Utc};

/// Window within which remote and local timestamps are considered equal.
///
/// Only the distance matters: a local file newer than the remote by more
/// than the window is stale too, since the remote side is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    millis: i64,
}

impl Tolerance {
    pub fn from_secs(secs: u64) -> Self {
        let millis = i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self { millis }
    }

    pub fn as_secs(&self) -> u64 {
        (self.millis / 1000) as u64
    }

    /// Returns true when the local artifact can be kept as is
    pub fn is_current(&self, remote: DateTime<Utc>, local: DateTime<Utc>) -> bool {
        let difference = remote.signed_duration_since(local).num_milliseconds();
        difference.checked_abs().unwrap_or(i64::MAX) <= self.millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use quickcheck_macros::quickcheck;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_identical_timestamps_are_current() {
        let tolerance = Tolerance::from_secs(0);
        assert!(tolerance.is_current(base(), base()));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let tolerance = Tolerance::from_secs(60);
        assert!(tolerance.is_current(base(), base() + Duration::seconds(60)));
        assert!(tolerance.is_current(base() + Duration::seconds(60), base()));
        assert!(!tolerance.is_current(base(), base() + Duration::milliseconds(60_001)));
    }

    #[test]
    fn test_newer_local_file_is_still_stale() {
        let tolerance = Tolerance::from_secs(60);
        let local = base() + Duration::hours(2);
        assert!(!tolerance.is_current(base(), local));
    }

    #[test]
    fn test_huge_tolerance_saturates() {
        let tolerance = Tolerance::from_secs(u64::MAX);
        assert!(tolerance.is_current(base(), base() + Duration::days(365 * 100)));
    }

    #[quickcheck]
    fn prop_current_iff_within_tolerance(remote_offset: i32, local_offset: i32, secs: u16) -> bool {
        let remote = base() + Duration::seconds(remote_offset as i64);
        let local = base() + Duration::seconds(local_offset as i64);
        let distance = (remote_offset as i64 - local_offset as i64).abs();

        Tolerance::from_secs(secs as u64).is_current(remote, local) == (distance <= secs as i64)
    }

    #[quickcheck]
    fn prop_symmetric(a: i32, b: i32, secs: u16) -> bool {
        let tolerance = Tolerance::from_secs(secs as u64);
        let first = base() + Duration::seconds(a as i64);
        let second = base() + Duration::seconds(b as i64);

        tolerance.is_current(first, second) == tolerance.is_current(second, first)
    }
}
