//! GraphQL-over-HTTP request builder and response parser.
//!
//! # Design
//! Both halves are pure functions: `build_request` turns the derived request
//! identity into an `HttpRequest`, `parse_envelope` turns an `HttpResponse`
//! into a `ResponseEnvelope`. The controller runs the transport between them.
//!
//! The `variables` member is sent as the serialized JSON *string*, not as a
//! nested object. Existing servers for this client depend on that shape.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::ResponseEnvelope;
use crate::variables::NO_VARIABLES;

#[derive(Serialize)]
struct WireBody<'a> {
    query: &'a str,
    variables: Option<&'a str>,
}

/// Build the POST request for one fetch cycle.
///
/// `variables` is a stabilizer identity; the absent-variables sentinel is
/// sent as JSON `null`. `authorization` is the full header value.
pub fn build_request(
    endpoint: &str,
    query: &str,
    variables: &str,
    authorization: Option<&str>,
) -> Result<HttpRequest, ClientError> {
    let body = WireBody {
        query,
        variables: (variables != NO_VARIABLES).then_some(variables),
    };
    let body = serde_json::to_string(&body).map_err(|e| ClientError::Serialization(e.to_string()))?;

    let mut headers = Vec::with_capacity(3);
    if let Some(value) = authorization {
        headers.push(("Authorization".to_string(), value.to_string()));
    }
    headers.push(("Content-Type".to_string(), "application/json".to_string()));
    headers.push(("Accept".to_string(), "application/json".to_string()));

    Ok(HttpRequest {
        method: HttpMethod::Post,
        url: endpoint.to_string(),
        headers,
        body,
    })
}

/// Decode a response body as a `{data, errors}` envelope.
///
/// The status code is not inspected: a GraphQL server may answer 4xx/5xx
/// with a perfectly good envelope, and anything that is not one fails to
/// decode anyway.
pub fn parse_envelope<D: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<ResponseEnvelope<D>, ClientError> {
    serde_json::from_str(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn build_request_without_variables_or_auth() {
        let req = build_request("/graphql", "query { argTest }", NO_VARIABLES, None).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "/graphql");
        assert_eq!(
            req.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]
        );
        let body: Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body, json!({"query": "query { argTest }", "variables": null}));
    }

    #[test]
    fn variables_travel_as_a_string() {
        let req = build_request("/graphql", "query($id: ID) { a(id: $id) }", r#"{"id":"7"}"#, None).unwrap();
        let body: Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["variables"], json!(r#"{"id":"7"}"#));
        assert!(body["variables"].is_string());
    }

    #[test]
    fn authorization_header_comes_first() {
        let req = build_request("/graphql", "{ a }", NO_VARIABLES, Some("bearer t0k")).unwrap();
        assert_eq!(req.headers[0], ("Authorization".to_string(), "bearer t0k".to_string()));
        assert_eq!(req.headers.len(), 3);
    }

    #[test]
    fn parse_envelope_with_data() {
        let env: ResponseEnvelope = parse_envelope(&HttpResponse::ok(
            r#"{"data":{"argTest":"TEST OK. NO ARGS PASSED"},"errors":null}"#,
        ))
        .unwrap();
        assert_eq!(env.data, Some(json!({"argTest": "TEST OK. NO ARGS PASSED"})));
        assert!(env.errors.is_none());
    }

    #[test]
    fn parse_envelope_with_errors() {
        let env: ResponseEnvelope = parse_envelope(&HttpResponse::ok(
            r#"{"data":null,"errors":[{"message":"Cannot query field \"nope\""}]}"#,
        ))
        .unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.errors.unwrap()[0].message(), Some("Cannot query field \"nope\""));
    }

    #[test]
    fn parse_envelope_ignores_status() {
        let response = HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: r#"{"data":{"a":1}}"#.to_string(),
        };
        let env: ResponseEnvelope = parse_envelope(&response).unwrap();
        assert_eq!(env.data, Some(json!({"a": 1})));
    }

    #[test]
    fn parse_envelope_bad_json() {
        let err = parse_envelope::<Value>(&HttpResponse::ok("<html>502</html>")).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn parse_envelope_into_typed_data() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Data {
            test: String,
        }
        let env: ResponseEnvelope<Data> =
            parse_envelope(&HttpResponse::ok(r#"{"data":{"test":"test OK."},"errors":null}"#)).unwrap();
        assert_eq!(env.data, Some(Data { test: "test OK.".to_string() }));
    }
}
