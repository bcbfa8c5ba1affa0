//! Wallet Classifier - decides whether a wallet is a sleeping giant

use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Token wealth needed to qualify, as a multiple of the SOL threshold
pub const TOKEN_VALUE_MULTIPLIER: f64 = 20.0;

pub const HIGH_SEVERITY_SOL: f64 = 100_000.0;
pub const MEDIUM_SEVERITY_SOL: f64 = 50_000.0;

/// Alert severity, derived from the giant's SOL balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_balance(sol_balance: f64) -> Self {
        if sol_balance > HIGH_SEVERITY_SOL {
            Severity::High
        } else if sol_balance > MEDIUM_SEVERITY_SOL {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

/// A wallet qualifies when it is rich enough, in SOL or in token value
/// (`min_balance * 20`), and has been inactive for at least
/// `min_inactive_days`. Negative or NaN inputs count as zero.
pub fn is_giant_wallet(
    sol_balance: f64,
    total_value: f64,
    inactive_days: u64,
    min_balance: f64,
    min_inactive_days: u64,
) -> bool {
    let sol_balance = non_negative(sol_balance);
    let total_value = non_negative(total_value);
    let min_balance = non_negative(min_balance);

    let rich = sol_balance >= min_balance || total_value >= min_balance * TOKEN_VALUE_MULTIPLIER;
    rich && inactive_days >= min_inactive_days
}

/// Whole days elapsed since `last_activity` (unix seconds).
///
/// A wallet with no known activity (`last_activity <= 0`) has never been
/// seen active, so its inactivity is unbounded (`u64::MAX`). Activity
/// stamped in the future counts as zero days.
pub fn inactivity_days(last_activity: i64, now: i64) -> u64 {
    if last_activity <= 0 {
        return u64::MAX;
    }
    let elapsed = now.saturating_sub(last_activity);
    if elapsed <= 0 {
        return 0;
    }
    (elapsed / SECONDS_PER_DAY) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_examples() {
        assert!(is_giant_wallet(10_000.0, 0.0, 180, 10_000.0, 180));
        assert!(!is_giant_wallet(9_999.0, 0.0, 180, 10_000.0, 180));
        assert!(is_giant_wallet(0.0, 200_000.0, 180, 10_000.0, 180));
    }

    #[test]
    fn recent_activity_disqualifies() {
        assert!(!is_giant_wallet(1_000_000.0, 0.0, 179, 10_000.0, 180));
    }

    #[test]
    fn token_value_just_below_multiplier_does_not_qualify() {
        assert!(!is_giant_wallet(0.0, 199_999.0, 365, 10_000.0, 180));
    }

    #[test]
    fn negative_inputs_are_clamped() {
        assert!(!is_giant_wallet(-50_000.0, -1.0, 365, 10_000.0, 180));
        // A negative threshold behaves like zero: everyone is rich enough
        assert!(is_giant_wallet(0.0, 0.0, 365, -5.0, 180));
        assert!(!is_giant_wallet(f64::NAN, f64::NAN, 365, 10_000.0, 180));
    }

    #[test]
    fn qualification_is_monotonic() {
        let balances = [0.0, 5_000.0, 9_999.0, 10_000.0, 50_000.0, 1e9];
        let values = [0.0, 100_000.0, 199_999.0, 200_000.0, 1e12];
        let days = [0u64, 1, 179, 180, 365, u64::MAX];

        for (bi, &b) in balances.iter().enumerate() {
            for (vi, &v) in values.iter().enumerate() {
                for (di, &d) in days.iter().enumerate() {
                    if !is_giant_wallet(b, v, d, 10_000.0, 180) {
                        continue;
                    }
                    for &b2 in &balances[bi..] {
                        assert!(is_giant_wallet(b2, v, d, 10_000.0, 180));
                    }
                    for &v2 in &values[vi..] {
                        assert!(is_giant_wallet(b, v2, d, 10_000.0, 180));
                    }
                    for &d2 in &days[di..] {
                        assert!(is_giant_wallet(b, v, d2, 10_000.0, 180));
                    }
                }
            }
        }
    }

    #[test]
    fn inactivity_floors_whole_days() {
        let now = 1_700_000_000;
        assert_eq!(inactivity_days(now - SECONDS_PER_DAY * 3 - 10, now), 3);
        assert_eq!(inactivity_days(now - SECONDS_PER_DAY + 1, now), 0);
        assert_eq!(inactivity_days(now, now), 0);
    }

    #[test]
    fn unknown_activity_is_unbounded() {
        assert_eq!(inactivity_days(0, 1_700_000_000), u64::MAX);
        assert!(is_giant_wallet(10_000.0, 0.0, inactivity_days(0, 1_700_000_000), 10_000.0, 180));
    }

    #[test]
    fn future_activity_counts_as_zero_days() {
        assert_eq!(inactivity_days(1_700_000_100, 1_700_000_000), 0);
    }

    #[test]
    fn severity_thresholds_are_strict() {
        assert_eq!(Severity::from_balance(150_000.0), Severity::High);
        assert_eq!(Severity::from_balance(100_000.0), Severity::Medium);
        assert_eq!(Severity::from_balance(50_001.0), Severity::Medium);
        assert_eq!(Severity::from_balance(50_000.0), Severity::Low);
        assert_eq!(Severity::from_balance(0.0), Severity::Low);
    }
}
