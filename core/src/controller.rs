//! Async request controller.
//!
//! # Design
//! `RequestController` pairs a `RequestLifecycle` with a `Transport` and
//! turns every pending cycle into a `FetchCycle` future. The controller never
//! spawns: the host awaits or spawns the futures it is handed, the same way a
//! UI framework schedules effects. Each future is `'static` and only holds the
//! transport and the shared state slot, so it may outlive the controller;
//! teardown makes such late completions no-ops.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug_span, Instrument};

use crate::error::ClientError;
use crate::http::Transport;
use crate::inputs::FetchInputs;
use crate::lifecycle::{Completion, ControllerState, PendingFetch, RequestLifecycle, ResultView};
use crate::types::RequestSpec;

/// One fetch cycle, ready to be awaited or spawned.
pub type FetchCycle = BoxFuture<'static, Completion>;

/// Perform `pending` over `transport` and record the outcome.
///
/// A cycle whose request could not be built skips the transport and records
/// the build error.
pub async fn perform<T, D>(pending: PendingFetch<D>, transport: &T) -> Completion
where
    T: Transport,
    D: DeserializeOwned + PartialEq,
{
    let response = match pending.request().cloned().map_err(ClientError::clone) {
        Ok(request) => transport.perform(request).await,
        Err(error) => Err(error),
    };
    pending.complete(response)
}

/// Request controller bound to a transport.
pub struct RequestController<T, D = Value> {
    lifecycle: RequestLifecycle<D>,
    transport: Arc<T>,
}

impl<T, D> RequestController<T, D>
where
    T: Transport,
    D: DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    /// Create a controller. The returned cycle is the automatic fetch; it is
    /// `None` for passive specs.
    pub fn mount<V: Serialize>(
        spec: &RequestSpec<V>,
        transport: Arc<T>,
    ) -> Result<(Self, Option<FetchCycle>), ClientError> {
        let (lifecycle, trigger) = RequestLifecycle::mount(spec)?;
        let controller = Self {
            lifecycle,
            transport,
        };
        let trigger = trigger.map(|pending| controller.drive(pending));
        Ok((controller, trigger))
    }

    /// Apply a new render's spec, returning the automatic fetch if the
    /// fetch inputs changed and `spec` is not passive.
    pub fn render<V: Serialize>(
        &mut self,
        spec: &RequestSpec<V>,
    ) -> Result<Option<FetchCycle>, ClientError> {
        let trigger = self.lifecycle.render(spec)?;
        Ok(trigger.map(|pending| self.drive(pending)))
    }

    /// Run one fetch cycle now, whatever the passive setting. Overlapping
    /// calls are not deduplicated.
    pub fn execute(&self) -> FetchCycle {
        self.drive(self.lifecycle.begin())
    }

    fn drive(&self, pending: PendingFetch<D>) -> FetchCycle {
        let transport = Arc::clone(&self.transport);
        let span = debug_span!("fetch_cycle", seq = pending.seq());
        async move { perform(pending, &*transport).await }
            .instrument(span)
            .boxed()
    }
}

impl<T, D> RequestController<T, D> {
    /// Clear the state to idle.
    pub fn reset(&self) {
        self.lifecycle.reset();
    }

    pub fn view(&self) -> ResultView<D> {
        self.lifecycle.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState<D>> {
        self.lifecycle.subscribe()
    }

    pub fn inputs(&self) -> &FetchInputs {
        self.lifecycle.inputs()
    }

    /// Tear the controller down. In-flight cycles still run to completion but
    /// no longer write.
    pub fn teardown(self) {}
}
