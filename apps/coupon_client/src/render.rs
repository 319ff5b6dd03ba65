//! Plain-text rendering of the session for the terminal.

use client_core::{ClaimSnapshot, ClaimState, Notice, NoticeLevel, SessionEvent, SessionPhase};

pub const IDLE_PROMPT: &str = "Type 'claim' to claim a coupon.";

pub const HELP: &str = "Commands:
  claim   claim a coupon
  copy    copy your coupon to the clipboard
  status  show your claim status
  help    show this list
  quit    leave";

pub fn render_snapshot(snapshot: &ClaimSnapshot) -> String {
    match snapshot.phase {
        SessionPhase::Reconciling => return "Checking for an existing claim...".to_string(),
        SessionPhase::Closed => return "Session closed.".to_string(),
        SessionPhase::Ready => {}
    }

    match &snapshot.state {
        ClaimState::Unclaimed => snapshot
            .message
            .clone()
            .unwrap_or_else(|| IDLE_PROMPT.to_string()),
        ClaimState::ClaimedActive {
            coupon,
            seconds_remaining,
        } => format!(
            "You have already claimed a coupon. Your Coupon: {coupon}\n\
             Wait for {seconds_remaining} seconds to claim again."
        ),
        ClaimState::ClaimedIdle { coupon } => format!(
            "You have already claimed a coupon. Your Coupon: {coupon}\n\
             Your cooldown has ended. {IDLE_PROMPT}"
        ),
    }
}

pub fn render_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Error => "error",
    };
    format!("[{tag}] {}", notice.text)
}

/// Countdown ticks are not echoed; `status` shows the current value. The
/// reconciled state is printed as a snapshot at startup, so its event is
/// silent too and "Cooldown over." only follows a countdown run in this session.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Notice(notice) => Some(render_notice(notice)),
        SessionEvent::StateChanged(ClaimState::ClaimedActive {
            coupon,
            seconds_remaining,
        }) => Some(format!(
            "Your Coupon: {coupon} (wait {seconds_remaining} seconds to claim again)"
        )),
        SessionEvent::StateChanged(ClaimState::ClaimedIdle { .. }) => {
            Some(format!("Cooldown over. {IDLE_PROMPT}"))
        }
        SessionEvent::StateChanged(ClaimState::Unclaimed)
        | SessionEvent::Reconciled(_)
        | SessionEvent::CooldownTick { .. }
        | SessionEvent::Closed => None,
    }
}
