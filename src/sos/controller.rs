//! SOS flow controller.
//!
//! Owns the [`SosMachine`], the countdown timer task, the most recent location
//! fix and the route context, and runs sends against an [`AlertService`].
//!
//! # Scheduling
//!
//! All state sits behind one mutex that is never held across an await. The
//! countdown is a Tokio task holding only a weak reference to the controller,
//! so a tick that fires after the controller is gone does nothing. The task is
//! aborted on cancel, on teardown and when it expires.
//!
//! Location requests and sends may be in flight at the same time. The payload
//! is assembled from whatever is known when the countdown expires; a pending
//! location request never delays an alert.
//!
//! Once sending has begun it cannot be cancelled; the outcome is always
//! recorded. History is refreshed in the background after a live send, after
//! the success notice has gone out.
//!
//! # Observing
//!
//! State and history are published on `watch` channels. Notices (the
//! snackbar messages) arrive on the receiver returned by
//! [`SosController::new`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::machine::{AlertKind, SosMachine, SosState, TickOutcome, TriggerOutcome};
use super::{AlertService, build_payload};
use crate::error::ApiError;
use crate::geolocation::{LocationRequest, LocationSource, locate_once};
use crate::model::{GeoFix, HistoricalAlert, SosPayload};
use crate::notify::Notice;
use crate::route_cache::{RouteContext, RouteContextCache};
use crate::storage::KeyValueStore;

pub const SENT_MESSAGE: &str = "SOS Alert sent to your emergency contacts";
pub const DRILL_MESSAGE: &str = "Test SOS Alert sent successfully";
pub const TIMEOUT_MESSAGE: &str = "SOS request timed out. Please try again.";
pub const FAILURE_MESSAGE: &str = "Failed to send SOS alert";

/// Timing of the SOS flow.
#[derive(Debug, Clone, Copy)]
pub struct SosConfig {
    /// Countdown length in ticks.
    pub arming_delay: u32,
    /// Interval between ticks.
    pub tick: Duration,
    /// Give up on a send after this long.
    pub send_timeout: Duration,
    /// How long a drill pretends to send.
    pub drill_delay: Duration,
}

impl Default for SosConfig {
    fn default() -> Self {
        Self {
            arming_delay: 3,
            tick: Duration::from_secs(1),
            send_timeout: Duration::from_secs(30),
            drill_delay: Duration::from_secs(1),
        }
    }
}

pub struct SosController<A: AlertService> {
    shared: Arc<Shared<A>>,
}

struct Shared<A> {
    service: A,
    config: SosConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SosState>,
    history_tx: watch::Sender<Vec<HistoricalAlert>>,
    notices: mpsc::UnboundedSender<Notice>,
}

struct Inner {
    machine: SosMachine,
    location: Option<GeoFix>,
    route: Option<RouteContext>,
    countdown: Option<JoinHandle<()>>,
}

impl<A: AlertService> SosController<A> {
    /// Create an idle controller. Must be called within a Tokio runtime
    /// before `trigger` or `test_alert` are used.
    pub fn new(service: A, config: SosConfig) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SosState::Idle);
        let (history_tx, _) = watch::channel(Vec::new());

        let shared = Arc::new(Shared {
            service,
            config,
            inner: Mutex::new(Inner {
                machine: SosMachine::new(config.arming_delay),
                location: None,
                route: None,
                countdown: None,
            }),
            state_tx,
            history_tx,
            notices,
        });

        (Self { shared }, notice_rx)
    }

    pub fn state(&self) -> SosState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SosState> {
        self.shared.state_tx.subscribe()
    }

    /// Seconds left on the countdown; the full delay when not armed.
    pub fn remaining(&self) -> u32 {
        self.shared.lock().machine.remaining()
    }

    pub fn history(&self) -> Vec<HistoricalAlert> {
        self.shared.history_tx.borrow().clone()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Vec<HistoricalAlert>> {
        self.shared.history_tx.subscribe()
    }

    pub fn location(&self) -> Option<GeoFix> {
        self.shared.lock().location
    }

    pub fn route_context(&self) -> Option<RouteContext> {
        self.shared.lock().route.clone()
    }

    pub fn set_route_context(&self, route: Option<RouteContext>) {
        self.shared.lock().route = route;
    }

    /// Read the journey in progress from the cache. An unusable record
    /// leaves the controller without route context.
    pub async fn load_route_context<S: KeyValueStore>(&self, cache: &RouteContextCache<S>) {
        let route = cache.load().await;
        debug!(has_route = route.is_some(), "Route context loaded");
        self.set_route_context(route);
    }

    /// Request one fix and wait for it.
    pub async fn locate<L: LocationSource>(&self, source: &L) {
        self.shared.locate(source).await;
    }

    /// Request one fix in the background.
    pub fn request_location<L: LocationSource>(&self, source: L) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            shared.locate(&source).await;
        })
    }

    /// Fetch alert history and publish it.
    pub async fn refresh_history(&self) -> Result<(), ApiError> {
        self.shared.refresh_history().await
    }

    /// Fetch alert history in the background. Failures are logged.
    pub fn request_history(&self) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if let Err(e) = shared.refresh_history().await {
                warn!(error = %e, "Failed to load alert history");
            }
        })
    }

    /// Arm the countdown. Returns false when a live alert is already armed
    /// or sending. A drill in progress is abandoned.
    pub fn trigger(&self) -> bool {
        let mut inner = self.shared.lock();

        match inner.machine.trigger() {
            TriggerOutcome::Ignored => {
                debug!("SOS trigger ignored; already in progress");
                false
            }
            TriggerOutcome::Armed { cycle } => {
                let period = self.shared.config.tick;
                let countdown = tokio::spawn(run_countdown(
                    Arc::downgrade(&self.shared),
                    cycle,
                    Instant::now() + period,
                    period,
                ));
                inner.countdown = Some(countdown);
                self.shared.publish(&inner);
                info!(delay = inner.machine.arming_delay(), "SOS armed");
                true
            }
            TriggerOutcome::Fire => {
                let payload = inner.payload();
                self.shared.publish(&inner);
                drop(inner);
                tokio::spawn(Arc::clone(&self.shared).deliver(payload));
                true
            }
        }
    }

    /// Abort the countdown. Returns false unless armed; once sending has
    /// begun it cannot be stopped.
    pub fn cancel(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.machine.cancel() {
            return false;
        }
        if let Some(countdown) = inner.countdown.take() {
            countdown.abort();
        }
        self.shared.publish(&inner);
        info!("SOS cancelled");
        true
    }

    /// Dismiss a sent or failed outcome.
    pub fn acknowledge(&self) -> bool {
        let mut inner = self.shared.lock();
        let acknowledged = inner.machine.acknowledge();
        if acknowledged {
            self.shared.publish(&inner);
        }
        acknowledged
    }

    /// Run a drill: pretend to send, without contacting the service or
    /// touching history. Refused while a live alert is armed or sending.
    pub fn test_alert(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.machine.begin_drill() {
            return false;
        }
        self.shared.publish(&inner);
        drop(inner);

        let shared = Arc::downgrade(&self.shared);
        let delay = self.shared.config.drill_delay;
        tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.finish(AlertKind::Drill, Ok(()));
            }
        });
        info!("SOS drill started");
        true
    }

    /// Tear down: stop the countdown so nothing fires after the owner is
    /// gone. A send already under way still completes.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        if let Some(countdown) = inner.countdown.take() {
            countdown.abort();
        }
        if inner.machine.cancel() {
            self.shared.publish(&inner);
            debug!("Armed SOS discarded on shutdown");
        }
    }
}

impl<A: AlertService> Drop for SosController<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn payload(&self) -> SosPayload {
        build_payload(self.location.as_ref(), self.route.as_ref())
    }
}

impl<A: AlertService> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the machine's state. Called with the lock held so observers
    /// see transitions in order.
    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.machine.state().clone());
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine.
        let _ = self.notices.send(notice);
    }

    async fn locate<L: LocationSource>(&self, source: &L) {
        match locate_once(source, LocationRequest::default()).await {
            Ok(fix) => self.lock().location = Some(fix),
            Err(warning) => self.notify(warning),
        }
    }

    async fn refresh_history(&self) -> Result<(), ApiError> {
        let history = self.service.alert_history().await?;
        debug!(count = history.len(), "Alert history refreshed");
        self.history_tx.send_replace(history);
        Ok(())
    }

    /// Apply one tick. Returns false when the countdown task should stop.
    fn on_tick(self: &Arc<Self>, cycle: u64) -> bool {
        let mut inner = self.lock();

        match inner.machine.tick(cycle) {
            TickOutcome::Stale => false,
            TickOutcome::Counting { remaining } => {
                self.publish(&inner);
                debug!(remaining, "SOS countdown");
                true
            }
            TickOutcome::Expired => {
                // The countdown task is the caller; it exits on its own.
                inner.countdown = None;
                let payload = inner.payload();
                self.publish(&inner);
                drop(inner);

                tokio::spawn(Arc::clone(self).deliver(payload));
                false
            }
        }
    }

    async fn deliver(self: Arc<Self>, payload: SosPayload) {
        info!(
            has_location = payload.location.is_some(),
            has_route = payload.route_details.is_some(),
            "Sending SOS alert"
        );

        let result = time::timeout(self.config.send_timeout, self.service.send_alert(&payload)).await;

        match result {
            Ok(Ok(receipt)) => {
                info!(notified = receipt.notified_contacts.len(), "SOS alert sent");
                if self.finish(AlertKind::Live, Ok(())) {
                    let shared = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = shared.refresh_history().await {
                            warn!(error = %e, "Failed to refresh alert history");
                        }
                    });
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "SOS alert failed");
                let mut message = e.user_message();
                if message.trim().is_empty() {
                    message = FAILURE_MESSAGE.to_string();
                }
                self.finish(AlertKind::Live, Err(message));
            }
            Err(_) => {
                warn!(timeout = ?self.config.send_timeout, "SOS alert timed out");
                self.finish(AlertKind::Live, Err(TIMEOUT_MESSAGE.to_string()));
            }
        }
    }

    /// Record a send outcome and tell the user.
    fn finish(&self, kind: AlertKind, result: Result<(), String>) -> bool {
        let notice = match (&result, kind) {
            (Ok(()), AlertKind::Live) => Notice::success(SENT_MESSAGE),
            (Ok(()), AlertKind::Drill) => Notice::success(DRILL_MESSAGE),
            (Err(message), _) => Notice::error(message.clone()),
        };

        let finished = {
            let mut inner = self.lock();
            let finished = inner.machine.finish(kind, result);
            if finished {
                self.publish(&inner);
            }
            finished
        };

        if finished {
            self.notify(notice);
        }
        finished
    }
}

async fn run_countdown<A: AlertService>(
    shared: Weak<Shared<A>>,
    cycle: u64,
    start: Instant,
    period: Duration,
) {
    let mut interval = time::interval_at(start, period);
    // After a stall, count on from now instead of replaying missed ticks.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            debug!("SOS controller gone; countdown stopped");
            return;
        };
        if !shared.on_tick(cycle) {
            return;
        }
    }
}
