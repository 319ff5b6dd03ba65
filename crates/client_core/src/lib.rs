use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{domain::COOLDOWN_WINDOW_SECS, protocol::CheckClaimResponse};
use tokio::{
    sync::{broadcast, Mutex},
    time::{self, Instant},
};
use tracing::{debug, info, warn};

pub mod error;
mod scoped_task;
pub mod transport;
pub mod types;

pub use error::ServiceError;
pub use shared::domain::CouponCode;
pub use transport::HttpDistributionService;
pub use types::{
    reconcile_claim_state, ClaimAttempt, ClaimSnapshot, ClaimState, Notice, NoticeLevel,
    SessionEvent, SessionPhase,
};

use scoped_task::ScopedTask;

pub const COOLDOWN_TICK: Duration = Duration::from_secs(1);
/// Delay between a granted claim and the automatic clipboard copy.
pub const CLIPBOARD_COPY_DELAY: Duration = Duration::from_secs(2);
pub const COPIED_NOTICE: &str = "Coupon copied to clipboard!";
pub const UNREACHABLE_NOTICE: &str = "Could not reach the coupon service. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted {
        coupon: CouponCode,
        message: String,
    },
    AlreadyClaimed {
        coupon: CouponCode,
        message: String,
    },
    Rejected {
        message: String,
    },
}

/// The remote authority that hands out coupons and tracks claims per visitor.
#[async_trait]
pub trait DistributionService: Send + Sync {
    async fn check_claim(&self) -> Result<CheckClaimResponse, ServiceError>;
    async fn claim(&self) -> Result<ClaimOutcome, ServiceError>;
}

pub trait ClipboardSink: Send + Sync {
    fn set_text(&self, text: &str) -> Result<()>;
}

pub struct MissingClipboard;

impl ClipboardSink for MissingClipboard {
    fn set_text(&self, _text: &str) -> Result<()> {
        Err(anyhow!("clipboard is unavailable"))
    }
}

struct SessionState {
    phase: SessionPhase,
    /// Set when the status query has been issued; guards against overlapping reconciles.
    reconcile_started: bool,
    claim: ClaimState,
    message: Option<String>,
}

/// One visitor session: reconciles with the service, runs the cooldown clock
/// and performs claims. All mutation goes through `inner`.
pub struct ClaimSession {
    service: Arc<dyn DistributionService>,
    clipboard: Arc<dyn ClipboardSink>,
    inner: Mutex<SessionState>,
    cooldown_task: Mutex<Option<ScopedTask>>,
    deferred_copies: Mutex<Vec<ScopedTask>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ClaimSession {
    pub fn new(
        service: Arc<dyn DistributionService>,
        clipboard: Arc<dyn ClipboardSink>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            service,
            clipboard,
            inner: Mutex::new(SessionState {
                phase: SessionPhase::Reconciling,
                reconcile_started: false,
                claim: ClaimState::Unclaimed,
                message: None,
            }),
            cooldown_task: Mutex::new(None),
            deferred_copies: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ClaimSnapshot {
        let guard = self.inner.lock().await;
        ClaimSnapshot {
            phase: guard.phase,
            state: guard.claim.clone(),
            message: guard.message.clone(),
        }
    }

    async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    /// Queries the service once for an existing claim and seeds the session.
    /// Failures leave the session unclaimed; they are logged, never surfaced.
    pub async fn reconcile(self: &Arc<Self>) {
        {
            let mut guard = self.inner.lock().await;
            if guard.phase != SessionPhase::Reconciling || guard.reconcile_started {
                warn!("reconcile: already performed for this session; ignoring");
                return;
            }
            guard.reconcile_started = true;
        }

        let claim = match self.service.check_claim().await {
            Ok(status) => reconcile_claim_state(&status, Utc::now()),
            Err(err) => {
                warn!(error = %err, "reconcile: claim status unavailable; starting unclaimed");
                ClaimState::Unclaimed
            }
        };

        {
            let mut guard = self.inner.lock().await;
            if guard.phase != SessionPhase::Reconciling {
                debug!(phase = ?guard.phase, "reconcile: late claim status discarded");
                return;
            }
            guard.phase = SessionPhase::Ready;
            guard.claim = claim.clone();
        }

        info!(
            claimed = claim.is_claimed(),
            cooldown_active = claim.cooldown_active(),
            seconds_remaining = claim.seconds_remaining(),
            "reconcile: initial claim state applied"
        );
        self.emit(SessionEvent::Reconciled(claim.clone()));

        if claim.cooldown_active() {
            self.start_cooldown_clock().await;
        }
    }

    /// Runs the claim operation. The service is the authority on whether the
    /// visitor may claim; locally only the session phase is checked.
    pub async fn claim(self: &Arc<Self>) -> ClaimAttempt {
        if self.phase().await != SessionPhase::Ready {
            warn!("claim: session is not ready; request ignored");
            return ClaimAttempt::NotOffered;
        }

        let outcome = self.service.claim().await;

        if self.phase().await == SessionPhase::Closed {
            debug!("claim: session closed while request was in flight; result discarded");
            return ClaimAttempt::NotOffered;
        }

        match outcome {
            Ok(ClaimOutcome::Granted { coupon, message }) => {
                if !self.activate_cooldown(coupon.clone()).await {
                    return ClaimAttempt::NotOffered;
                }
                info!(coupon = %coupon, "claim: coupon granted");
                self.notify(Notice::success(message)).await;
                self.schedule_clipboard_copy(coupon.clone()).await;
                ClaimAttempt::Granted(coupon)
            }
            Ok(ClaimOutcome::AlreadyClaimed { coupon, message }) => {
                if !self.activate_cooldown(coupon.clone()).await {
                    return ClaimAttempt::NotOffered;
                }
                info!(coupon = %coupon, "claim: visitor already holds a claim; adopting it");
                self.notify(Notice::error(message)).await;
                ClaimAttempt::AdoptedExisting(coupon)
            }
            Ok(ClaimOutcome::Rejected { message }) => {
                warn!(%message, "claim: rejected by service");
                self.notify(Notice::error(message.clone())).await;
                ClaimAttempt::Rejected(message)
            }
            Err(err) => {
                warn!(error = %err, "claim: request failed");
                self.notify(Notice::error(UNREACHABLE_NOTICE)).await;
                ClaimAttempt::Unreachable
            }
        }
    }

    /// Copies the displayed coupon. Never touches the claim state.
    pub async fn copy_coupon(&self) -> bool {
        let coupon = self.inner.lock().await.claim.coupon().cloned();
        let Some(coupon) = coupon else {
            debug!("copy: no coupon to copy");
            return false;
        };
        self.copy_to_clipboard(&coupon).await
    }

    /// Closes the session and cancels the cooldown clock and pending copies.
    pub async fn shutdown(&self) {
        {
            let mut guard = self.inner.lock().await;
            if guard.phase == SessionPhase::Closed {
                return;
            }
            guard.phase = SessionPhase::Closed;
        }

        let cooldown = self.cooldown_task.lock().await.take();
        let copies = std::mem::take(&mut *self.deferred_copies.lock().await);
        drop(cooldown);
        drop(copies);

        info!("session closed");
        self.emit(SessionEvent::Closed);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn notify(&self, notice: Notice) {
        self.inner.lock().await.message = Some(notice.text.clone());
        self.emit(SessionEvent::Notice(notice));
    }

    /// Starts a full cooldown for `coupon`. Returns false, leaving the state
    /// untouched, once the session is closed.
    async fn activate_cooldown(self: &Arc<Self>, coupon: CouponCode) -> bool {
        let state = ClaimState::cooling_down(coupon, COOLDOWN_WINDOW_SECS);
        {
            let mut guard = self.inner.lock().await;
            if guard.phase == SessionPhase::Closed {
                debug!("claim: session closed before the result was applied; discarded");
                return false;
            }
            guard.claim = state.clone();
        }
        self.emit(SessionEvent::StateChanged(state));
        self.start_cooldown_clock().await;
        true
    }

    /// Replaces any running clock; the previous task is aborted when its guard drops.
    async fn start_cooldown_clock(self: &Arc<Self>) {
        let mut slot = self.cooldown_task.lock().await;
        if self.phase().await == SessionPhase::Closed {
            return;
        }
        let first_tick = Instant::now() + COOLDOWN_TICK;
        let previous = slot.replace(ScopedTask::spawn(run_cooldown_clock(
            Arc::downgrade(self),
            first_tick,
        )));
        drop(previous);
        debug!("cooldown: clock started");
    }

    /// Applies one tick. Returns whether the clock should keep running.
    async fn advance_cooldown(&self) -> bool {
        let next = {
            let mut guard = self.inner.lock().await;
            if guard.phase == SessionPhase::Closed {
                return false;
            }
            let ClaimState::ClaimedActive {
                coupon,
                seconds_remaining,
            } = &guard.claim
            else {
                return false;
            };
            let next = ClaimState::cooling_down(coupon.clone(), seconds_remaining.saturating_sub(1));
            guard.claim = next.clone();
            next
        };

        match next {
            ClaimState::ClaimedActive {
                seconds_remaining, ..
            } => {
                self.emit(SessionEvent::CooldownTick { seconds_remaining });
                true
            }
            state => {
                info!("cooldown: window elapsed; claiming is available again");
                self.emit(SessionEvent::StateChanged(state));
                false
            }
        }
    }

    async fn schedule_clipboard_copy(self: &Arc<Self>, coupon: CouponCode) {
        let mut copies = self.deferred_copies.lock().await;
        if self.phase().await == SessionPhase::Closed {
            return;
        }
        copies.retain(|task| !task.is_finished());

        let deadline = Instant::now() + CLIPBOARD_COPY_DELAY;
        let session = Arc::downgrade(self);
        copies.push(ScopedTask::spawn(async move {
            time::sleep_until(deadline).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            if session.phase().await == SessionPhase::Closed {
                return;
            }
            session.copy_to_clipboard(&coupon).await;
        }));
    }

    async fn copy_to_clipboard(&self, coupon: &CouponCode) -> bool {
        match self.clipboard.set_text(coupon.as_str()) {
            Ok(()) => {
                debug!(coupon = %coupon, "copy: coupon placed on clipboard");
                self.notify(Notice::info(COPIED_NOTICE)).await;
                true
            }
            Err(err) => {
                warn!(error = %err, "copy: clipboard write failed");
                self.notify(Notice::error(format!(
                    "Could not copy coupon to clipboard: {err}"
                )))
                .await;
                false
            }
        }
    }
}

async fn run_cooldown_clock(session: Weak<ClaimSession>, first_tick: Instant) {
    let mut ticker = time::interval_at(first_tick, COOLDOWN_TICK);
    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if !session.advance_cooldown().await {
            break;
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
