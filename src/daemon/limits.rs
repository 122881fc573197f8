use std::fmt::Display;

use serde::Serialize;

/// Remaining time under which the user gets warned.
const CONCERN_WINDOW_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitState {
    /// More than an hour left.
    Alert,
    /// Less than an hour left.
    Concerned,
    /// Nothing left.
    Exhausted,
}

impl Display for LimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitState::Alert => write!(f, "alert"),
            LimitState::Concerned => write!(f, "concerned"),
            LimitState::Exhausted => write!(f, "exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitStatus {
    pub limit_seconds: u64,
    pub remaining_seconds: u64,
    pub over_limit_seconds: u64,
    pub state: LimitState,
}

impl LimitStatus {
    pub fn is_over_limit(&self) -> bool {
        self.remaining_seconds == 0
    }
}

/// Classifies today's total against the day's limit. Always computed from scratch, so a total
/// hovering around a boundary may flip the state back and forth.
pub fn evaluate_limit(total_seconds: u64, limit_seconds: u64) -> LimitStatus {
    let remaining_seconds = limit_seconds.saturating_sub(total_seconds);
    let over_limit_seconds = total_seconds.saturating_sub(limit_seconds);
    let state = if remaining_seconds > CONCERN_WINDOW_SECONDS {
        LimitState::Alert
    } else if remaining_seconds > 0 {
        LimitState::Concerned
    } else {
        LimitState::Exhausted
    };
    LimitStatus {
        limit_seconds,
        remaining_seconds,
        over_limit_seconds,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate_limit, LimitState};

    const LIMIT: u64 = 4 * 3600;

    #[test]
    fn nothing_used_is_alert() {
        let status = evaluate_limit(0, LIMIT);
        assert_eq!(status.state, LimitState::Alert);
        assert_eq!(status.remaining_seconds, LIMIT);
        assert_eq!(status.over_limit_seconds, 0);
    }

    #[test]
    fn last_hour_is_concerned() {
        let status = evaluate_limit(10801, LIMIT);
        assert_eq!(status.state, LimitState::Concerned);
        assert_eq!(status.remaining_seconds, 3599);
    }

    #[test]
    fn exactly_one_hour_left_is_concerned() {
        assert_eq!(evaluate_limit(10800, LIMIT).state, LimitState::Concerned);
        assert_eq!(evaluate_limit(10799, LIMIT).state, LimitState::Alert);
    }

    #[test]
    fn reaching_limit_is_exhausted() {
        let status = evaluate_limit(LIMIT, LIMIT);
        assert_eq!(status.state, LimitState::Exhausted);
        assert_eq!(status.remaining_seconds, 0);
        assert_eq!(status.over_limit_seconds, 0);
        assert!(status.is_over_limit());
    }

    #[test]
    fn over_limit_reports_excess() {
        let status = evaluate_limit(20000, LIMIT);
        assert_eq!(status.state, LimitState::Exhausted);
        assert_eq!(status.over_limit_seconds, 5600);
    }

    #[test]
    fn zero_limit_is_always_exhausted() {
        assert_eq!(evaluate_limit(0, 0).state, LimitState::Exhausted);
    }
}
