//! Request state machine without I/O.
//!
//! # Design
//! `RequestLifecycle` owns the memoized inputs and a shared state slot.
//! Starting a fetch cycle yields a `PendingFetch`: the built request plus a
//! handle on the slot. Whoever performs the I/O (the async controller, a test,
//! or a C host) finishes the cycle with `PendingFetch::complete`.
//!
//! The slot is a `watch` channel. Every write goes through
//! `send_if_modified`, so subscribers only wake for real changes, and the
//! liveness check and the write happen under the same lock. Teardown clears
//! the liveness flag inside that lock, which is what keeps a late completion
//! from writing into a torn-down controller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse};
use crate::inputs::{DerivedInputs, FetchInputs};
use crate::types::{CompletionOrder, GraphQLError, RequestSpec, ResponseEnvelope};
use crate::wire;

/// Current state of a controller.
#[derive(Debug)]
pub enum ControllerState<D = Value> {
    /// Nothing received yet, or cleared by reset, failure or teardown.
    Idle,
    /// The last stored envelope. It may carry server-reported errors.
    Settled(Arc<ResponseEnvelope<D>>),
}

impl<D> Clone for ControllerState<D> {
    fn clone(&self) -> Self {
        match self {
            ControllerState::Idle => ControllerState::Idle,
            ControllerState::Settled(env) => ControllerState::Settled(Arc::clone(env)),
        }
    }
}

impl<D> ControllerState<D> {
    pub fn is_idle(&self) -> bool {
        matches!(self, ControllerState::Idle)
    }
}

/// Immutable snapshot of a controller's result.
#[derive(Debug)]
pub struct ResultView<D = Value> {
    state: ControllerState<D>,
}

impl<D> Clone for ResultView<D> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<D> ResultView<D> {
    pub fn new(state: ControllerState<D>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ControllerState<D> {
        &self.state
    }

    pub fn envelope(&self) -> Option<&Arc<ResponseEnvelope<D>>> {
        match &self.state {
            ControllerState::Settled(env) => Some(env),
            ControllerState::Idle => None,
        }
    }

    pub fn loaded(&self) -> bool {
        !self.state.is_idle()
    }

    /// Loaded and free of server-reported errors.
    pub fn ok(&self) -> bool {
        self.envelope().is_some_and(|env| env.errors.is_none())
    }

    pub fn data(&self) -> Option<&D> {
        self.envelope().and_then(|env| env.data.as_ref())
    }

    pub fn errors(&self) -> Option<&[GraphQLError]> {
        self.envelope().and_then(|env| env.errors.as_deref())
    }
}

/// `data` and `errors` are present (possibly `null`) only once loaded.
impl<D: Serialize> Serialize for ResultView<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(env) = self.envelope() {
            map.serialize_entry("data", &env.data)?;
            map.serialize_entry("errors", &env.errors)?;
        }
        map.serialize_entry("loaded", &self.loaded())?;
        map.serialize_entry("ok", &self.ok())?;
        map.end()
    }
}

/// What a finished fetch cycle did to the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A new envelope was stored.
    Settled,
    /// The envelope equalled the stored one; nothing changed.
    Unchanged,
    /// The cycle failed and the state was reset to idle.
    Failed,
    /// The controller was torn down, or a newer cycle was issued under
    /// `CompletionOrder::LatestIssued`.
    Discarded,
}

struct Slot<D> {
    state: watch::Sender<ControllerState<D>>,
    live: AtomicBool,
    issued: AtomicU64,
}

impl<D> Slot<D> {
    fn new() -> Self {
        let (state, _) = watch::channel(ControllerState::Idle);
        Self {
            state,
            live: AtomicBool::new(true),
            issued: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn clear(&self) -> bool {
        self.state.send_if_modified(|state| {
            let changed = !state.is_idle();
            *state = ControllerState::Idle;
            changed
        })
    }

    fn teardown(&self) {
        self.state.send_if_modified(|state| {
            self.live.store(false, Ordering::Release);
            let changed = !state.is_idle();
            *state = ControllerState::Idle;
            changed
        });
    }
}

impl<D: PartialEq> Slot<D> {
    fn apply(
        &self,
        seq: u64,
        order: CompletionOrder,
        outcome: Result<ResponseEnvelope<D>, ClientError>,
    ) -> Completion {
        let mut completion = Completion::Discarded;
        self.state.send_if_modified(|state| {
            if !self.live.load(Ordering::Acquire) {
                debug!(seq, "completion after teardown discarded");
                return false;
            }
            if order == CompletionOrder::LatestIssued && seq != self.issued.load(Ordering::Acquire) {
                debug!(seq, "completion superseded by a newer cycle");
                return false;
            }
            match outcome {
                Ok(envelope) => {
                    if let ControllerState::Settled(prev) = &*state {
                        if **prev == envelope {
                            trace!(seq, "identical envelope, state kept");
                            completion = Completion::Unchanged;
                            return false;
                        }
                    }
                    *state = ControllerState::Settled(Arc::new(envelope));
                    completion = Completion::Settled;
                    true
                }
                Err(error) => {
                    warn!(seq, %error, "fetch cycle failed, controller reset to idle");
                    completion = Completion::Failed;
                    let changed = !state.is_idle();
                    *state = ControllerState::Idle;
                    changed
                }
            }
        });
        completion
    }
}

/// A started fetch cycle waiting for its response.
pub struct PendingFetch<D = Value> {
    seq: u64,
    order: CompletionOrder,
    request: Result<HttpRequest, ClientError>,
    slot: Arc<Slot<D>>,
}

impl<D> PendingFetch<D> {
    /// Issue number of this cycle, starting at 1 per controller.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The request to perform, or the reason none could be built. A cycle
    /// without a request still has to be completed to record the failure.
    pub fn request(&self) -> Result<&HttpRequest, &ClientError> {
        self.request.as_ref()
    }
}

impl<D: DeserializeOwned + PartialEq> PendingFetch<D> {
    /// Finish the cycle with the transport outcome.
    pub fn complete(self, response: Result<HttpResponse, ClientError>) -> Completion {
        let outcome = match (self.request, response) {
            (Err(error), _) => Err(error),
            (Ok(_), Err(error)) => Err(error),
            (Ok(_), Ok(response)) => wire::parse_envelope(&response),
        };
        self.slot.apply(self.seq, self.order, outcome)
    }
}

/// Sans-IO request controller.
///
/// `mount` and `render` hand back the automatic fetch cycle, if one is due;
/// `begin` starts an explicit one. Dropping the lifecycle tears it down.
pub struct RequestLifecycle<D = Value> {
    derived: DerivedInputs,
    inputs: FetchInputs,
    order: CompletionOrder,
    slot: Arc<Slot<D>>,
}

impl<D> RequestLifecycle<D> {
    /// Start a fetch cycle against the current inputs, regardless of
    /// passive mode.
    pub fn begin(&self) -> PendingFetch<D> {
        let seq = self.slot.next_seq();
        let request = self.inputs.to_request();
        match &request {
            Ok(req) => debug!(seq, url = %req.url, "fetch cycle issued"),
            Err(error) => debug!(seq, %error, "fetch cycle issued without a request"),
        }
        PendingFetch {
            seq,
            order: self.order,
            request,
            slot: Arc::clone(&self.slot),
        }
    }

    /// Clear the state to idle. The next completion is always stored.
    pub fn reset(&self) {
        self.slot.clear();
    }

    pub fn view(&self) -> ResultView<D> {
        ResultView::new(self.slot.state.borrow().clone())
    }

    /// Watch the state slot. Receivers are only notified on real changes.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState<D>> {
        self.slot.state.subscribe()
    }

    pub fn inputs(&self) -> &FetchInputs {
        &self.inputs
    }

    /// Tear the controller down. Equivalent to dropping it.
    pub fn teardown(self) {}
}

impl<D: DeserializeOwned + PartialEq> RequestLifecycle<D> {
    /// Create a controller from its first spec.
    pub fn mount<V: Serialize>(
        spec: &RequestSpec<V>,
    ) -> Result<(Self, Option<PendingFetch<D>>), ClientError> {
        let mut derived = DerivedInputs::default();
        let inputs = derived.derive(spec)?;
        let lifecycle = Self {
            derived,
            inputs,
            order: spec.order,
            slot: Arc::new(Slot::new()),
        };
        let trigger = (!spec.passive).then(|| lifecycle.begin());
        Ok((lifecycle, trigger))
    }

    /// Apply a new render's spec.
    ///
    /// When the fetch inputs changed, the state is cleared and, unless the
    /// `spec` is passive, exactly one new cycle is returned. A change to
    /// `passive` alone does nothing.
    pub fn render<V: Serialize>(
        &mut self,
        spec: &RequestSpec<V>,
    ) -> Result<Option<PendingFetch<D>>, ClientError> {
        let inputs = self.derived.derive(spec)?;
        self.order = spec.order;
        if inputs.same_identity(&self.inputs) {
            return Ok(None);
        }
        self.inputs = inputs;
        self.slot.clear();
        if spec.passive {
            debug!("inputs changed, passive controller not fetching");
            return Ok(None);
        }
        Ok(Some(self.begin()))
    }
}

impl<D> Drop for RequestLifecycle<D> {
    fn drop(&mut self) {
        self.slot.teardown();
        self.derived.teardown();
    }
}
