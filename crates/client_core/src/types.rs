//! Claim state, session snapshots and the events a rendering layer observes.

use chrono::{DateTime, Utc};
use shared::{
    domain::{CouponCode, COOLDOWN_WINDOW_SECS},
    protocol::CheckClaimResponse,
};
use tracing::warn;

/// What the session knows about this visitor's claim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClaimState {
    #[default]
    Unclaimed,
    /// Claimed and still inside the cooldown window. `seconds_remaining` is never zero.
    ClaimedActive {
        coupon: CouponCode,
        seconds_remaining: u64,
    },
    ClaimedIdle {
        coupon: CouponCode,
    },
}

impl ClaimState {
    /// Collapses a zero countdown into `ClaimedIdle`.
    pub fn cooling_down(coupon: CouponCode, seconds_remaining: u64) -> Self {
        if seconds_remaining == 0 {
            Self::ClaimedIdle { coupon }
        } else {
            Self::ClaimedActive {
                coupon,
                seconds_remaining,
            }
        }
    }

    pub fn coupon(&self) -> Option<&CouponCode> {
        match self {
            Self::Unclaimed => None,
            Self::ClaimedActive { coupon, .. } | Self::ClaimedIdle { coupon } => Some(coupon),
        }
    }

    pub fn is_claimed(&self) -> bool {
        !matches!(self, Self::Unclaimed)
    }

    pub fn cooldown_active(&self) -> bool {
        matches!(self, Self::ClaimedActive { .. })
    }

    pub fn seconds_remaining(&self) -> u64 {
        match self {
            Self::ClaimedActive {
                seconds_remaining, ..
            } => *seconds_remaining,
            _ => 0,
        }
    }
}

/// Derives the initial state from a `/check-claim` answer observed at `now`.
pub fn reconcile_claim_state(status: &CheckClaimResponse, now: DateTime<Utc>) -> ClaimState {
    if !status.is_claimed {
        return ClaimState::Unclaimed;
    }

    let Some(coupon) = status.coupon.clone() else {
        warn!("reconcile: service reported a claim without a coupon; treating as unclaimed");
        return ClaimState::Unclaimed;
    };

    let Some(claimed_at) = status.timestamp else {
        return ClaimState::ClaimedIdle { coupon };
    };

    let window_ms = (COOLDOWN_WINDOW_SECS * 1000) as i64;
    // A claim timestamp ahead of the local clock counts as "just claimed".
    let elapsed_ms = (now - claimed_at).num_milliseconds().max(0);
    if elapsed_ms >= window_ms {
        return ClaimState::ClaimedIdle { coupon };
    }

    let seconds_remaining = ((window_ms - elapsed_ms) / 1000) as u64;
    ClaimState::cooling_down(coupon, seconds_remaining)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Reconciling,
    Ready,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSnapshot {
    pub phase: SessionPhase,
    pub state: ClaimState,
    /// Text of the most recent notice. Informational only.
    pub message: Option<String>,
}

impl ClaimSnapshot {
    /// The claim action is offered once reconciliation finished and no cooldown
    /// is running. A claimed visitor whose window expired is offered it again;
    /// the service rejects the attempt if it disagrees.
    pub fn claim_offered(&self) -> bool {
        self.phase == SessionPhase::Ready && !self.state.cooldown_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Initial state derived from the service at session start.
    Reconciled(ClaimState),
    /// The claim state moved after a claim result or a finished cooldown.
    StateChanged(ClaimState),
    CooldownTick { seconds_remaining: u64 },
    Notice(Notice),
    Closed,
}

/// Result of one Claim Initiator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimAttempt {
    Granted(CouponCode),
    AdoptedExisting(CouponCode),
    Rejected(String),
    Unreachable,
    NotOffered,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().expect("timestamp")
    }

    #[test]
    fn unclaimed_status_stays_unclaimed() {
        assert_eq!(
            reconcile_claim_state(&CheckClaimResponse::unclaimed(), now()),
            ClaimState::Unclaimed
        );
    }

    #[test]
    fn claim_within_window_starts_cooldown() {
        let status = CheckClaimResponse::claimed("ABC123", now() - Duration::seconds(600));
        assert_eq!(
            reconcile_claim_state(&status, now()),
            ClaimState::ClaimedActive {
                coupon: CouponCode::from("ABC123"),
                seconds_remaining: 3000,
            }
        );
    }

    #[test]
    fn remaining_seconds_round_down() {
        let status = CheckClaimResponse::claimed("ABC123", now() - Duration::milliseconds(600_400));
        assert_eq!(reconcile_claim_state(&status, now()).seconds_remaining(), 2999);
    }

    #[test]
    fn expired_window_leaves_claim_idle() {
        let status = CheckClaimResponse::claimed("ABC123", now() - Duration::seconds(7200));
        let state = reconcile_claim_state(&status, now());
        assert_eq!(
            state,
            ClaimState::ClaimedIdle {
                coupon: CouponCode::from("ABC123")
            }
        );
        assert!(state.is_claimed());
        assert!(!state.cooldown_active());
    }

    #[test]
    fn sub_second_remainder_does_not_activate_cooldown() {
        let status = CheckClaimResponse::claimed("ABC123", now() - Duration::milliseconds(3_599_500));
        assert_eq!(
            reconcile_claim_state(&status, now()),
            ClaimState::ClaimedIdle {
                coupon: CouponCode::from("ABC123")
            }
        );
    }

    #[test]
    fn future_timestamp_is_capped_at_full_window() {
        let status = CheckClaimResponse::claimed("ABC123", now() + Duration::seconds(30));
        assert_eq!(
            reconcile_claim_state(&status, now()).seconds_remaining(),
            COOLDOWN_WINDOW_SECS
        );
    }

    #[test]
    fn claimed_without_coupon_is_treated_as_unclaimed() {
        let status = CheckClaimResponse {
            is_claimed: true,
            coupon: None,
            timestamp: Some(now()),
        };
        assert_eq!(reconcile_claim_state(&status, now()), ClaimState::Unclaimed);
    }

    #[test]
    fn claimed_without_timestamp_has_no_cooldown() {
        let status = CheckClaimResponse {
            is_claimed: true,
            coupon: Some(CouponCode::from("ABC123")),
            timestamp: None,
        };
        assert_eq!(
            reconcile_claim_state(&status, now()),
            ClaimState::ClaimedIdle {
                coupon: CouponCode::from("ABC123")
            }
        );
    }

    #[test]
    fn claim_is_offered_only_when_ready_and_not_cooling_down() {
        let mut snapshot = ClaimSnapshot {
            phase: SessionPhase::Reconciling,
            state: ClaimState::Unclaimed,
            message: None,
        };
        assert!(!snapshot.claim_offered());

        snapshot.phase = SessionPhase::Ready;
        assert!(snapshot.claim_offered());

        snapshot.state = ClaimState::cooling_down(CouponCode::from("ABC123"), 10);
        assert!(!snapshot.claim_offered());

        snapshot.state = ClaimState::cooling_down(CouponCode::from("ABC123"), 0);
        assert!(snapshot.claim_offered());

        snapshot.phase = SessionPhase::Closed;
        assert!(!snapshot.claim_offered());
    }
}
