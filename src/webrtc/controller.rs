//! Connection lifecycle controller
//!
//! Owns at most one session (and one transport) at a time and drives it
//! through the negotiation state machine:
//!
//! ```text
//!  idle ──connect──> connecting ──answer applied + transport up──> connected
//!                        │                                          │
//!                        └──────────────> failed <──────────────────┤
//!                                           │                  disconnected
//!                      (once, after delay) reconnect ──> connecting
//!  any ──disconnect──> idle
//! ```
//!
//! Every session carries a generation number. Each suspended negotiation
//! step re-checks it when resuming, so a result that arrives after teardown
//! (or after the session was replaced) is discarded instead of being applied.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use super::session::{ConnectivityObservation, Session, SessionEvent, SessionState};
use super::signaling::SignalingClient;
use super::target::StreamTarget;
use super::transport::{
    InboundTrack, MediaTransport, TransportEvent, TransportFactory, TransportState,
};
use crate::error::{StreamError, StreamResult};
use crate::render::RenderSink;
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Session event channel capacity
const SESSION_EVENT_CAPACITY: usize = 64;

/// Automatic reconnect policy
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay between a failure and the automatic reconnect
    pub delay: Duration,
    /// Automatic reconnects allowed before the user has to reconnect
    pub max_automatic: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_automatic: 1,
        }
    }
}

/// The one session slot of a controller
#[derive(Default)]
struct SessionSlot {
    generation: u64,
    session: Option<Session>,
    transport: Option<Arc<dyn MediaTransport>>,
    /// Last connectivity signal of the current transport
    transport_state: Option<TransportState>,
    /// Automatic reconnects used since the last successful connection
    auto_reconnects: u32,
}

impl SessionSlot {
    fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    /// Whether `generation` still owns a live session
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.state.is_live())
    }
}

struct ControllerInner {
    target: StreamTarget,
    policy: ReconnectPolicy,
    factory: Arc<dyn TransportFactory>,
    signaling: Arc<dyn SignalingClient>,
    sink: Arc<RenderSink>,
    slot: Mutex<SessionSlot>,
    observation: watch::Sender<ConnectivityObservation>,
    events: broadcast::Sender<SessionEvent>,
    /// Failure warnings, keyed by error kind
    failure_log: LogThrottler,
}

/// Drives one viewing session for a stream target
///
/// Failures never escape: they become a `failed` observation and a
/// [`SessionEvent`]. Dropping the controller tears the session down.
pub struct ConnectionController {
    inner: Arc<ControllerInner>,
}

impl ConnectionController {
    pub fn new(
        target: StreamTarget,
        factory: Arc<dyn TransportFactory>,
        signaling: Arc<dyn SignalingClient>,
        sink: Arc<RenderSink>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (observation, _) = watch::channel(ConnectivityObservation::idle());
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Self {
            inner: Arc::new(ControllerInner {
                target,
                policy,
                factory,
                signaling,
                sink,
                slot: Mutex::new(SessionSlot::default()),
                observation,
                events,
                failure_log: LogThrottler::default(),
            }),
        }
    }

    pub fn target(&self) -> &StreamTarget {
        &self.inner.target
    }

    /// Current state machine state
    pub fn state(&self) -> SessionState {
        self.inner.slot.lock().state()
    }

    /// Snapshot of the current session, if any
    pub fn session(&self) -> Option<Session> {
        self.inner.slot.lock().session.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.slot.lock().generation
    }

    /// Current connectivity observation
    pub fn observation(&self) -> ConnectivityObservation {
        self.inner.observation.borrow().clone()
    }

    /// Watch connectivity observations
    pub fn watch(&self) -> watch::Receiver<ConnectivityObservation> {
        self.inner.observation.subscribe()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Start a new session
    ///
    /// Only valid from `idle`; requests in any other state are ignored.
    /// Returns whether a session was started.
    pub fn connect(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.session.is_some() {
            debug!(
                "Connect request for {} ignored in state {}",
                self.inner.target.camera_id,
                slot.state()
            );
            return false;
        }

        slot.auto_reconnects = 0;
        self.inner.start_session(&mut slot);
        true
    }

    /// User-triggered reconnect from `failed` or `disconnected`
    ///
    /// Tears down the old transport first. From `idle` this is `connect()`;
    /// while connecting or connected it is ignored.
    pub fn reconnect(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        match slot.state() {
            SessionState::Idle => {}
            SessionState::Failed | SessionState::Disconnected => {
                let transport = slot.transport.take();
                self.inner.sink.unbind();
                self.inner.release(transport);
            }
            state => {
                debug!(
                    "Reconnect request for {} ignored in state {}",
                    self.inner.target.camera_id, state
                );
                return false;
            }
        }

        slot.auto_reconnects = 0;
        self.inner.start_session(&mut slot);
        true
    }

    /// Tear down the session and release the transport
    ///
    /// Non-blocking and idempotent. Any in-flight negotiation step becomes
    /// stale and its result is discarded.
    pub fn disconnect(&self) {
        self.inner.teardown();
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl ControllerInner {
    /// Allocate a new generation and spawn its negotiation
    ///
    /// The caller must already have released the previous transport.
    fn start_session(self: &Arc<Self>, slot: &mut SessionSlot) {
        let from = slot.state();
        slot.generation += 1;
        let generation = slot.generation;

        let session = Session::new(generation);
        let session_id = session.id.clone();
        slot.session = Some(session);
        slot.transport = None;
        slot.transport_state = None;

        info!(
            "Stream {} {} -> connecting (session {}, generation {})",
            self.target.camera_id, from, session_id, generation
        );
        self.publish(slot, from, SessionState::Connecting, generation, None);

        let inner = self.clone();
        tokio::spawn(async move {
            inner.negotiate(generation, session_id).await;
        });
    }

    async fn negotiate(self: Arc<Self>, generation: u64, session_id: String) {
        match self.run_negotiation(generation, &session_id).await {
            Ok(()) => {}
            Err(StreamError::StaleSessionDiscarded { generation }) => {
                debug!(
                    "Stream {}: discarded negotiation result of generation {}",
                    self.target.camera_id, generation
                );
                let _ = self.events.send(SessionEvent::StaleDiscarded { generation });
            }
            Err(err) => self.fail(generation, err),
        }
    }

    /// Offer -> signaling -> answer, strictly in order
    async fn run_negotiation(self: &Arc<Self>, generation: u64, session_id: &str) -> StreamResult<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = self.factory.open(session_id, events_tx).await?;

        {
            let mut slot = self.slot.lock();
            if !slot.is_current(generation) {
                drop(slot);
                self.release(Some(transport));
                return Err(StreamError::StaleSessionDiscarded { generation });
            }
            slot.transport = Some(transport.clone());
        }

        tokio::spawn(self.clone().pump_events(generation, events_rx));

        let offer = transport.create_offer().await;
        self.ensure_current(generation)?;
        let offer = offer?;
        self.with_session(generation, |s| s.local_description = Some(offer.clone()))?;

        debug!(
            "Stream {}: sending offer via {} ({} bytes)",
            self.target.camera_id,
            self.signaling.name(),
            offer.len()
        );
        let answer = self.signaling.negotiate(&self.target, &offer).await;
        self.ensure_current(generation)?;
        let answer = answer?;

        let applied = transport.apply_answer(&answer).await;
        self.ensure_current(generation)?;
        applied?;

        let mut slot = self.slot.lock();
        if !slot.is_current(generation) {
            return Err(StreamError::StaleSessionDiscarded { generation });
        }
        if let Some(session) = slot.session.as_mut() {
            session.remote_description = Some(answer);
        }
        debug!("Stream {}: remote description applied", self.target.camera_id);

        if slot.transport_state == Some(TransportState::Connected) {
            self.mark_connected(&mut slot, generation);
        }
        Ok(())
    }

    /// Turn transport events into state-machine inputs until the session goes stale
    async fn pump_events(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let mut slot = self.slot.lock();
            if !slot.is_current(generation) {
                break;
            }

            match event {
                TransportEvent::State(state) => self.on_transport_state(&mut slot, generation, state),
                TransportEvent::Track(track) => self.on_track(&mut slot, generation, track),
            }
        }
    }

    fn on_transport_state(
        self: &Arc<Self>,
        slot: &mut SessionSlot,
        generation: u64,
        state: TransportState,
    ) {
        slot.transport_state = Some(state);
        let current = slot.state();
        let remote_applied = slot
            .session
            .as_ref()
            .is_some_and(|s| s.remote_description.is_some());

        match state {
            TransportState::Connected
                if remote_applied
                    && matches!(current, SessionState::Connecting | SessionState::Disconnected) =>
            {
                self.mark_connected(slot, generation);
            }
            TransportState::Disconnected if current == SessionState::Connected => {
                self.transition(slot, SessionState::Disconnected, None);
            }
            TransportState::Failed => {
                self.fail_locked(
                    slot,
                    generation,
                    StreamError::NegotiationFailure(
                        "transport reported failed connectivity".to_string(),
                    ),
                );
            }
            _ => {}
        }
    }

    fn on_track(&self, slot: &mut SessionSlot, generation: u64, track: InboundTrack) {
        let info = track.info.clone();
        if !self.sink.bind(track) {
            return;
        }

        if let Some(session) = slot.session.as_mut() {
            if session.state == SessionState::Connected && session.inbound_track.is_none() {
                session.inbound_track = Some(info.clone());
            }
        }
        let _ = self.events.send(SessionEvent::TrackBound {
            generation,
            track: info,
        });
    }

    fn mark_connected(&self, slot: &mut SessionSlot, generation: u64) {
        if !self.transition(slot, SessionState::Connected, None) {
            return;
        }
        slot.auto_reconnects = 0;
        self.failure_log.clear_all();

        if let Some(session) = slot.session.as_mut() {
            if session.inbound_track.is_none() {
                session.inbound_track = self.sink.bound_tracks().into_iter().next();
            }
        }
        debug!(
            "Stream {} connected (generation {})",
            self.target.camera_id, generation
        );
    }

    fn fail(self: &Arc<Self>, generation: u64, err: StreamError) {
        let mut slot = self.slot.lock();
        if !slot.is_current(generation) {
            debug!(
                "Stream {}: ignoring failure of stale generation {}: {}",
                self.target.camera_id, generation, err
            );
            let _ = self.events.send(SessionEvent::StaleDiscarded { generation });
            return;
        }
        self.fail_locked(&mut slot, generation, err);
    }

    /// Enter `failed`, release the transport and schedule the automatic reconnect
    fn fail_locked(self: &Arc<Self>, slot: &mut SessionSlot, generation: u64, err: StreamError) {
        if let Some(session) = slot.session.as_mut() {
            session.last_error = Some(err.clone());
        }
        warn_throttled!(
            self.failure_log,
            err.kind(),
            "Stream {} failed: {}",
            self.target.camera_id,
            err
        );

        if !self.transition(slot, SessionState::Failed, Some(err)) {
            return;
        }

        let transport = slot.transport.take();
        slot.transport_state = None;
        self.sink.unbind();
        self.release(transport);

        if slot.auto_reconnects >= self.policy.max_automatic {
            info!(
                "Stream {}: automatic reconnect already used, waiting for manual reconnect",
                self.target.camera_id
            );
            return;
        }
        slot.auto_reconnects += 1;

        let delay = self.policy.delay;
        let _ = self.events.send(SessionEvent::ReconnectScheduled {
            generation,
            delay_ms: delay.as_millis() as u64,
        });
        info!(
            "Stream {}: reconnecting in {}ms",
            self.target.camera_id,
            delay.as_millis()
        );

        let inner = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut slot = inner.slot.lock();
            if slot.generation != generation || slot.state() != SessionState::Failed {
                debug!(
                    "Stream {}: automatic reconnect of generation {} cancelled",
                    inner.target.camera_id, generation
                );
                return;
            }
            inner.start_session(&mut slot);
        });
    }

    /// Apply a transition of the current session; returns whether it happened
    fn transition(
        &self,
        slot: &mut SessionSlot,
        to: SessionState,
        error: Option<StreamError>,
    ) -> bool {
        let Some(session) = slot.session.as_mut() else {
            return false;
        };

        let from = session.state;
        if from == to || !from.can_transition(to) {
            debug!(
                "Stream {}: transition {} -> {} not allowed",
                self.target.camera_id, from, to
            );
            return false;
        }

        session.state = to;
        let generation = session.generation;
        info!(
            "Stream {} {} -> {} (generation {})",
            self.target.camera_id, from, to, generation
        );
        self.publish(slot, from, to, generation, error);
        true
    }

    fn publish(
        &self,
        slot: &SessionSlot,
        from: SessionState,
        to: SessionState,
        generation: u64,
        error: Option<StreamError>,
    ) {
        let _ = self.events.send(SessionEvent::StateChanged {
            from,
            to,
            generation,
            error,
        });
        self.observation
            .send_replace(ConnectivityObservation::from_session(slot.session.as_ref()));
    }

    fn ensure_current(&self, generation: u64) -> StreamResult<()> {
        if self.slot.lock().is_current(generation) {
            Ok(())
        } else {
            Err(StreamError::StaleSessionDiscarded { generation })
        }
    }

    fn with_session(&self, generation: u64, f: impl FnOnce(&mut Session)) -> StreamResult<()> {
        let mut slot = self.slot.lock();
        if !slot.is_current(generation) {
            return Err(StreamError::StaleSessionDiscarded { generation });
        }
        if let Some(session) = slot.session.as_mut() {
            f(session);
        }
        Ok(())
    }

    fn teardown(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        let transport = slot.transport.take();
        slot.transport_state = None;

        if let Some(previous) = slot.session.take() {
            info!(
                "Stream {} {} -> idle (generation {})",
                self.target.camera_id, previous.state, previous.generation
            );
            self.publish(
                &slot,
                previous.state,
                SessionState::Idle,
                previous.generation,
                None,
            );
        }

        self.sink.unbind();
        self.release(transport);
    }

    /// Close a transport in the background
    ///
    /// Without a runtime (teardown during shutdown) the transport is dropped.
    fn release(&self, transport: Option<Arc<dyn MediaTransport>>) {
        let Some(transport) = transport else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let camera_id = self.target.camera_id.clone();
                handle.spawn(async move {
                    if let Err(e) = transport.close().await {
                        debug!("Stream {}: transport close failed: {}", camera_id, e);
                    }
                });
            }
            Err(_) => {
                debug!(
                    "Stream {}: no runtime, dropping transport without close",
                    self.target.camera_id
                );
            }
        }
    }
}
