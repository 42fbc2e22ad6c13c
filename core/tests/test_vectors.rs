//! Verify request building and response handling against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Request vectors describe a `RequestSpec` and the exact request a fetch
//! cycle must produce. Response vectors describe a simulated response and
//! the view the controller must expose afterwards. Bodies and views are
//! compared as parsed JSON, not raw strings.

use gql_core::{Completion, HttpMethod, HttpResponse, RequestLifecycle, RequestSpec};
use serde_json::Value;

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn parse_completion(s: &str) -> Completion {
    match s {
        "Settled" => Completion::Settled,
        "Unchanged" => Completion::Unchanged,
        "Failed" => Completion::Failed,
        "Discarded" => Completion::Discarded,
        other => panic!("unknown completion: {other}"),
    }
}

/// Build a passive spec from a vector's `spec` object.
fn spec_from(case: &Value) -> RequestSpec {
    let mut spec = RequestSpec::new(case["operation"].as_str().unwrap()).passive(true);
    if let Some(variables) = case.get("variables") {
        spec = spec.variables(variables.clone());
    }
    if let Some(token) = case.get("token") {
        spec = spec.token(token.as_str().unwrap());
    }
    if let Some(endpoint) = case.get("endpoint") {
        spec = spec.endpoint(endpoint.as_str().unwrap());
    }
    spec
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected_request"];

        let (lifecycle, trigger) = RequestLifecycle::<Value>::mount(&spec_from(&case["spec"])).unwrap();
        assert!(trigger.is_none(), "{name}: passive spec must not trigger");

        let pending = lifecycle.begin();
        let req = pending.request().unwrap();
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");

        let expected_headers: Vec<(String, String)> = expected["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| {
                let arr = h.as_array().unwrap();
                (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
            })
            .collect();
        assert_eq!(req.headers, expected_headers, "{name}: headers");

        let body: Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body, expected["body"], "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let (lifecycle, _) =
            RequestLifecycle::<Value>::mount(&RequestSpec::new("{ test }").passive(true)).unwrap();

        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().to_string(),
        };
        let completion = lifecycle.begin().complete(Ok(response));
        assert_eq!(
            completion,
            parse_completion(case["expected_completion"].as_str().unwrap()),
            "{name}: completion"
        );

        let view = serde_json::to_value(lifecycle.view()).unwrap();
        assert_eq!(view, case["expected_view"], "{name}: view");
    }
}
