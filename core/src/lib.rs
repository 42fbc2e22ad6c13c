//! GraphQL request controller.
//!
//! # Overview
//! Given an operation, optional variables and credentials, a controller
//! derives a stable request identity, fetches when that identity changes
//! (unless passive), and keeps an `Idle` / `Settled` state that only changes
//! when the server's answer actually changes.
//!
//! # Design
//! - `RequestLifecycle` is the sans-IO core: it builds `HttpRequest` values
//!   and records outcomes, the host performs the round-trip.
//! - `RequestController` adds a `Transport` and hands back `FetchCycle`
//!   futures for the host to await or spawn.
//! - `VariableStabilizer` keys request identity on serialized content, so
//!   rebuilding equal variables every render never refetches.
//! - Transport and decode failures are logged and collapse to `Idle`;
//!   server-reported GraphQL errors settle normally with `ok() == false`.

pub mod controller;
pub mod error;
pub mod http;
pub mod inputs;
pub mod lifecycle;
pub mod types;
pub mod variables;
pub mod wire;

pub use controller::{FetchCycle, RequestController};
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use inputs::FetchInputs;
pub use lifecycle::{Completion, ControllerState, PendingFetch, RequestLifecycle, ResultView};
pub use types::{
    CompletionOrder, ErrorLocation, GraphQLError, Operation, QueryDocument, RequestSpec,
    ResponseEnvelope, DEFAULT_ENDPOINT,
};
pub use variables::VariableStabilizer;
