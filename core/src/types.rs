//! Request inputs and response DTOs.
//!
//! # Design
//! `RequestSpec` is rebuilt by the caller on every render; the controller
//! decides from its contents whether anything logically changed. Documents
//! are compared by `Arc` identity and everything else by value, so callers
//! that keep a parsed document alive across renders never re-print it. A
//! new document that prints the same text is still the same request.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Endpoint used when a `RequestSpec` does not name one.
pub const DEFAULT_ENDPOINT: &str = "/graphql";

/// A pre-parsed query document that can print itself as query text.
pub trait QueryDocument: Send + Sync {
    fn render(&self) -> String;
}

/// The operation to send: raw query text or a structured document.
#[derive(Clone)]
pub enum Operation {
    Text(String),
    Document(Arc<dyn QueryDocument>),
}

impl Operation {
    pub fn document(doc: impl QueryDocument + 'static) -> Self {
        Operation::Document(Arc::new(doc))
    }

    /// Query text for the wire. Documents are printed on every call; the
    /// controller memoizes the result.
    pub fn to_query_text(&self) -> String {
        match self {
            Operation::Text(text) => text.clone(),
            Operation::Document(doc) => doc.render(),
        }
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operation::Text(a), Operation::Text(b)) => a == b,
            (Operation::Document(a), Operation::Document(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Operation::Document(doc) => f
                .debug_tuple("Document")
                .field(&Arc::as_ptr(doc).cast::<()>())
                .finish(),
        }
    }
}

impl From<&str> for Operation {
    fn from(text: &str) -> Self {
        Operation::Text(text.to_string())
    }
}

impl From<String> for Operation {
    fn from(text: String) -> Self {
        Operation::Text(text)
    }
}

impl<D: QueryDocument + 'static> From<Arc<D>> for Operation {
    fn from(doc: Arc<D>) -> Self {
        Operation::Document(doc)
    }
}

/// How overlapping fetch cycles are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Whichever cycle completes last writes last.
    #[default]
    LastWriteWins,
    /// Only the most recently issued cycle may write; earlier completions
    /// are dropped.
    LatestIssued,
}

/// Inputs for one render of a request controller.
#[derive(Debug, Clone)]
pub struct RequestSpec<V = Value> {
    pub operation: Option<Operation>,
    pub variables: Option<V>,
    pub token: Option<String>,
    pub passive: bool,
    pub endpoint: Option<String>,
    pub order: CompletionOrder,
}

impl RequestSpec {
    pub fn new(operation: impl Into<Operation>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Self::without_operation()
        }
    }

    /// A spec with no operation. Mounting it is allowed; every fetch cycle
    /// fails and leaves the controller idle.
    pub fn without_operation() -> Self {
        Self {
            operation: None,
            variables: None,
            token: None,
            passive: false,
            endpoint: None,
            order: CompletionOrder::default(),
        }
    }
}

impl<V> RequestSpec<V> {
    pub fn variables<W>(self, variables: W) -> RequestSpec<W> {
        RequestSpec {
            operation: self.operation,
            variables: Some(variables),
            token: self.token,
            passive: self.passive,
            endpoint: self.endpoint,
            order: self.order,
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn order(mut self, order: CompletionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }
}

/// Source position attached to a GraphQL error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// A server-reported GraphQL error.
///
/// The entry is kept exactly as the server sent it, so envelopes compare and
/// re-serialize without loss even when the server adds its own keys or
/// leaves out `message`. The accessors read the standard fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphQLError(Value);

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(serde_json::json!({ "message": message.into() }))
    }

    /// The `message` field. A bare string entry is its own message.
    pub fn message(&self) -> Option<&str> {
        match &self.0 {
            Value::String(message) => Some(message),
            other => other.get("message")?.as_str(),
        }
    }

    /// The `locations` field, if present and well formed.
    pub fn locations(&self) -> Option<Vec<ErrorLocation>> {
        serde_json::from_value(self.0.get("locations")?.clone()).ok()
    }

    pub fn path(&self) -> Option<&[Value]> {
        self.0.get("path")?.as_array().map(Vec::as_slice)
    }

    pub fn extensions(&self) -> Option<&Value> {
        self.0.get("extensions")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for GraphQLError {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The parsed `{data, errors}` payload of a settled request.
///
/// Both fields serialize as `null` when absent, matching what GraphQL
/// servers send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<D = Value> {
    pub data: Option<D>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc(&'static str);

    impl QueryDocument for Doc {
        fn render(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn text_operations_compare_by_value() {
        assert_eq!(Operation::from("query { a }"), Operation::from("query { a }".to_string()));
        assert_ne!(Operation::from("query { a }"), Operation::from("query { b }"));
    }

    #[test]
    fn document_operations_compare_by_identity() {
        let doc = Arc::new(Doc("query { a }"));
        let a = Operation::from(Arc::clone(&doc));
        let b = Operation::from(doc);
        let other = Operation::document(Doc("query { a }"));
        assert_eq!(a, b);
        assert_ne!(a, other);
        assert_ne!(a, Operation::from("query { a }"));
    }

    #[test]
    fn document_renders_to_text() {
        assert_eq!(Operation::document(Doc("{ x }")).to_query_text(), "{ x }");
    }

    #[test]
    fn spec_defaults() {
        let spec = RequestSpec::new("query { a }");
        assert!(spec.variables.is_none());
        assert!(spec.token.is_none());
        assert!(!spec.passive);
        assert_eq!(spec.endpoint_or_default(), "/graphql");
        assert_eq!(spec.order, CompletionOrder::LastWriteWins);
    }

    #[test]
    fn spec_builder_sets_fields() {
        let spec = RequestSpec::new("query { a }")
            .variables(serde_json::json!({"id": 1}))
            .token("secret")
            .passive(true)
            .endpoint("http://localhost:3000/graphql");
        assert_eq!(spec.variables, Some(serde_json::json!({"id": 1})));
        assert_eq!(spec.token.as_deref(), Some("secret"));
        assert!(spec.passive);
        assert_eq!(spec.endpoint_or_default(), "http://localhost:3000/graphql");
    }

    #[test]
    fn envelope_tolerates_missing_and_extra_keys() {
        let env: ResponseEnvelope = serde_json::from_str(r#"{"extensions":{"cost":1}}"#).unwrap();
        assert!(env.data.is_none());
        assert!(env.errors.is_none());
    }

    #[test]
    fn envelope_serializes_absent_fields_as_null() {
        let env: ResponseEnvelope = ResponseEnvelope {
            data: Some(serde_json::json!({"a": 1})),
            errors: None,
        };
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            serde_json::json!({"data": {"a": 1}, "errors": null})
        );
    }

    #[test]
    fn graphql_error_keeps_optional_fields() {
        let err: GraphQLError = serde_json::from_str(
            r#"{"message":"boom","locations":[{"line":1,"column":9}],"path":["a",0]}"#,
        )
        .unwrap();
        assert_eq!(err.message(), Some("boom"));
        assert_eq!(err.locations(), Some(vec![ErrorLocation { line: 1, column: 9 }]));
        assert_eq!(err.path(), Some(&[serde_json::json!("a"), serde_json::json!(0)][..]));
        assert!(err.extensions().is_none());
    }

    #[test]
    fn graphql_error_reads_standard_fields() {
        let err: GraphQLError = serde_json::from_value(serde_json::json!({
            "message": "boom",
            "locations": [{"line": 2, "column": 5}],
            "path": ["viewer", 0],
            "extensions": {"code": "E1"}
        }))
        .unwrap();
        assert_eq!(err.message(), Some("boom"));
        assert_eq!(err.locations(), Some(vec![ErrorLocation { line: 2, column: 5 }]));
        assert_eq!(err.path(), Some(&[serde_json::json!("viewer"), serde_json::json!(0)][..]));
        assert_eq!(err.extensions(), Some(&serde_json::json!({"code": "E1"})));
    }

    #[test]
    fn graphql_error_keeps_nonstandard_entries() {
        let raw = serde_json::json!([{"code": "E1"}, "boom"]);
        let errors: Vec<GraphQLError> = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(errors[0].message(), None);
        assert_eq!(errors[1].message(), Some("boom"));
        assert_eq!(serde_json::to_value(&errors).unwrap(), raw);

        let other: GraphQLError = serde_json::from_value(serde_json::json!({"code": "E2"})).unwrap();
        assert_ne!(errors[0], other);
    }
}
