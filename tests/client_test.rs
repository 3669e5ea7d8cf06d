//! End-to-end client behavior against a scripted transport

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use quaero::{
    EndpointConfig, HeaderMap, HeaderValue, Response, RetryPolicy, SparqlClient, SparqlError,
    SparqlTerm, StatusCode, Transport, TransportError,
};

const ENTITY_URL: &str = "http://www.wikidata.org/entity/";

const SELECT_BODY: &str = r#"{
    "head": {"vars": ["item", "itemLabel"]},
    "results": {"bindings": [
        {
            "item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q42"},
            "itemLabel": {"type": "literal", "value": "Douglas Adams", "xml:lang": "en"}
        },
        {
            "item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q5"}
        }
    ]}
}"#;

const ITEMS_BODY: &str = r#"{
    "head": {"vars": ["item"]},
    "results": {"bindings": [
        {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q42"}},
        {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q42"}},
        {"item": {"type": "uri", "value": "http://example.org/other/X"}},
        {"item": {"type": "bnode", "value": "b0"}},
        {},
        {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q5"}}
    ]}
}"#;

const UNKNOWN_TAG_BODY: &str = r#"{
    "head": {"vars": ["x"]},
    "results": {"bindings": [
        {"x": {"type": "triple", "value": "t0"}}
    ]}
}"#;

const ASK_BODY: &str = r#"{"head": {}, "boolean": true}"#;

const LOGIN_WALL_BODY: &str = "<!DOCTYPE html>\n<html><body>\n\
     <a href=\"/wiki/Special:UserLogin\">Log in</a>\n</body></html>";

/// Transport replaying a scripted sequence of outcomes, recording every
/// request it receives.
struct ScriptedTransport {
    script: RefCell<VecDeque<Result<Response, TransportError>>>,
    requests: RefCell<Vec<String>>,
    accept: RefCell<Vec<Option<String>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Response, TransportError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            requests: RefCell::new(Vec::new()),
            accept: RefCell::new(Vec::new()),
        }
    }

    fn ok(body: &str) -> Result<Response, TransportError> {
        Ok(Response::new(StatusCode::OK, body.to_string()))
    }

    fn timeout() -> Result<Response, TransportError> {
        Err(TransportError::Timeout("deadline has elapsed".to_string()))
    }
}

impl Transport for ScriptedTransport {
    fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Response, TransportError> {
        self.requests.borrow_mut().push(url.to_string());
        self.accept.borrow_mut().push(
            headers
                .get("accept")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        );
        self.script
            .borrow_mut()
            .pop_front()
            .expect("transport script exhausted")
    }
}

fn client_with(script: Vec<Result<Response, TransportError>>) -> SparqlClient<ScriptedTransport> {
    let config = EndpointConfig::new("https://query.example.org/sparql", ENTITY_URL).unwrap();
    SparqlClient::with_transport(config, ScriptedTransport::new(script))
}

fn commons_client(
    script: Vec<Result<Response, TransportError>>,
) -> SparqlClient<ScriptedTransport> {
    let config =
        EndpointConfig::new("https://commons-query.wikimedia.org/sparql", ENTITY_URL).unwrap();
    SparqlClient::with_transport(config, ScriptedTransport::new(script))
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_wait: Duration::from_millis(1),
        retry_max: Duration::from_millis(2),
    }
}

#[test]
fn test_select_projects_rows_in_declared_order() {
    let mut client = client_with(vec![ScriptedTransport::ok(SELECT_BODY)]);
    let rows = client
        .select("SELECT ?item ?itemLabel WHERE { ?item wdt:P31 wd:Q5 }", None)
        .unwrap()
        .unwrap();

    assert_eq!(rows.len(), 2);
    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(columns, ["item", "itemLabel"]);
    assert_eq!(
        rows[0]["item"].as_deref(),
        Some("http://www.wikidata.org/entity/Q42")
    );
    assert_eq!(rows[0]["itemLabel"].as_deref(), Some("Douglas Adams"));

    // Second row leaves itemLabel unbound but the column is still there.
    assert_eq!(rows[1].len(), 2);
    assert!(rows[1]["itemLabel"].is_none());
}

#[test]
fn test_select_full_decodes_typed_terms() {
    let mut client = client_with(vec![ScriptedTransport::ok(SELECT_BODY)]);
    let rows = client
        .select_full("SELECT ?item ?itemLabel WHERE { ?item wdt:P31 wd:Q5 }", None)
        .unwrap()
        .unwrap();

    let item = rows[0]["item"].as_ref().unwrap();
    assert!(item.is_uri());
    assert_eq!(item.entity_id(), Some("Q42"));

    match rows[0]["itemLabel"].as_ref().unwrap() {
        SparqlTerm::Literal(label) => {
            assert_eq!(label.value(), "Douglas Adams");
            assert_eq!(label.language(), Some("en"));
        }
        other => panic!("Expected a literal, got {other:?}"),
    }
    assert!(rows[1]["itemLabel"].is_none());
}

#[test]
fn test_unknown_term_tag_fails_full_decoding() {
    let mut client = client_with(vec![ScriptedTransport::ok(UNKNOWN_TAG_BODY)]);
    let err = client.select_full("SELECT ?x WHERE {}", None).unwrap_err();
    match err {
        SparqlError::UnknownTermType(tag) => assert_eq!(tag, "triple"),
        other => panic!("Expected UnknownTermType, got {other:?}"),
    }
}

#[test]
fn test_unknown_term_tag_is_fine_in_raw_mode() {
    let mut client = client_with(vec![ScriptedTransport::ok(UNKNOWN_TAG_BODY)]);
    let rows = client.select("SELECT ?x WHERE {}", None).unwrap().unwrap();
    assert_eq!(rows[0]["x"].as_deref(), Some("t0"));
}

#[test]
fn test_repeated_queries_are_independent() {
    let mut client = client_with(vec![
        ScriptedTransport::ok(SELECT_BODY),
        ScriptedTransport::ok(SELECT_BODY),
    ]);
    let query = "SELECT ?item ?itemLabel WHERE { ?item wdt:P31 wd:Q5 }";

    let first = client.select(query, None).unwrap();
    let second = client.select(query, None).unwrap();
    assert_eq!(first, second);

    let requests = client.transport().requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[test]
fn test_query_is_percent_encoded_into_the_url() {
    let mut client = client_with(vec![ScriptedTransport::ok(ASK_BODY)]);
    client.query("ASK { ?x ?p \"a b\" }", None).unwrap();

    let requests = client.transport().requests.borrow();
    assert_eq!(
        requests[0],
        "https://query.example.org/sparql?query=ASK%20%7B%20%3Fx%20%3Fp%20%22a%20b%22%20%7D"
    );
}

#[test]
fn test_default_and_custom_headers_reach_the_transport() {
    let mut client = client_with(vec![
        ScriptedTransport::ok(ASK_BODY),
        ScriptedTransport::ok(ASK_BODY),
    ]);

    client.query("ASK { }", None).unwrap();

    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("text/plain"));
    client.query("ASK { }", Some(&headers)).unwrap();

    let accepts = client.transport().accept.borrow();
    assert_eq!(accepts[0].as_deref(), Some("application/sparql-results+json"));
    assert_eq!(accepts[1].as_deref(), Some("text/plain"));
}

#[test]
fn test_last_response_is_kept_after_success() {
    let mut client = client_with(vec![ScriptedTransport::ok(SELECT_BODY)]);
    assert!(client.last_response().is_none());

    client.select("SELECT ?item WHERE {}", None).unwrap();

    let response = client.last_response().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().contains("Douglas Adams"));
}

#[test]
fn test_last_response_is_reset_when_transport_fails() {
    let mut client = client_with(vec![
        ScriptedTransport::ok(SELECT_BODY),
        Err(TransportError::Http("connection refused".to_string())),
    ]);
    let query = "SELECT ?item WHERE {}";

    client.select(query, None).unwrap();
    assert!(client.last_response().is_some());

    let err = client.select(query, None).unwrap_err();
    assert!(matches!(err, SparqlError::Transport(_)));
    assert!(client.last_response().is_none());
}

#[test]
fn test_non_json_body_yields_no_result_but_keeps_the_body() {
    let mut client = client_with(vec![ScriptedTransport::ok(
        "<!DOCTYPE html>\n<html>service maintenance page</html>",
    )]);

    let result = client.query("SELECT ?x WHERE {}", None).unwrap();
    assert!(result.is_none());
    assert!(client
        .last_response()
        .unwrap()
        .text()
        .contains("maintenance"));
}

#[test]
fn test_select_returns_none_without_results_section() {
    let mut client = client_with(vec![ScriptedTransport::ok(ASK_BODY)]);
    assert!(client.select("SELECT ?x WHERE {}", None).unwrap().is_none());
}

#[test]
fn test_login_wall_on_commons_is_reported() {
    let mut client = commons_client(vec![ScriptedTransport::ok(LOGIN_WALL_BODY)]);
    let err = client.query("SELECT ?x WHERE {}", None).unwrap_err();

    assert!(matches!(err, SparqlError::NotLoggedIn));
    assert!(err.to_string().contains("log in to Wikimedia Commons"));
    // The offending body stays inspectable.
    assert!(client
        .last_response()
        .unwrap()
        .text()
        .contains("Special:UserLogin"));
}

#[test]
fn test_login_wall_oauth_marker_is_recognized() {
    let body = "<!DOCTYPE html>\n<html>Authorize via Special:OAuth to continue</html>";
    let mut client = commons_client(vec![ScriptedTransport::ok(body)]);
    let err = client.query("SELECT ?x WHERE {}", None).unwrap_err();
    assert!(matches!(err, SparqlError::NotLoggedIn));
}

#[test]
fn test_login_wall_detection_is_limited_to_the_commons_host() {
    let mut client = client_with(vec![ScriptedTransport::ok(LOGIN_WALL_BODY)]);
    let result = client.query("SELECT ?x WHERE {}", None).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_login_wall_detection_requires_the_doctype_prefix() {
    let body = "<html>Please visit Special:UserLogin</html>";
    let mut client = commons_client(vec![ScriptedTransport::ok(body)]);
    let result = client.query("SELECT ?x WHERE {}", None).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_ask_returns_the_boolean() {
    let mut client = client_with(vec![
        ScriptedTransport::ok(ASK_BODY),
        ScriptedTransport::ok(r#"{"head": {}, "boolean": false}"#),
    ]);
    assert!(client.ask("ASK { ?x wdt:P31 wd:Q5 }", None).unwrap());
    assert!(!client.ask("ASK { ?x wdt:P31 wd:Q5 }", None).unwrap());
}

#[test]
#[should_panic(expected = "boolean")]
fn test_ask_panics_without_a_boolean_field() {
    let mut client = client_with(vec![ScriptedTransport::ok("{}")]);
    let _ = client.ask("ASK { }", None);
}

#[test]
fn test_get_items_into_a_set_dedups() {
    let mut client = client_with(vec![ScriptedTransport::ok(ITEMS_BODY)]);
    let items: HashSet<String> = client.get_items("SELECT ?item WHERE {}", "item").unwrap();
    assert_eq!(
        items,
        HashSet::from(["Q42".to_string(), "Q5".to_string()])
    );
}

#[test]
fn test_get_items_into_a_vec_keeps_duplicates() {
    let mut client = client_with(vec![ScriptedTransport::ok(ITEMS_BODY)]);
    let items: Vec<String> = client.get_items("SELECT ?item WHERE {}", "item").unwrap();
    // Foreign URIs, blank nodes and unbound rows contribute nothing.
    assert_eq!(items, ["Q42", "Q42", "Q5"]);
}

#[test]
fn test_get_items_for_an_unknown_variable_is_empty() {
    let mut client = client_with(vec![ScriptedTransport::ok(ITEMS_BODY)]);
    let items: Vec<String> = client.get_items("SELECT ?item WHERE {}", "nope").unwrap();
    assert!(items.is_empty());
}

#[test]
fn test_timeouts_are_retried_with_the_same_request() {
    let mut client = client_with(vec![
        ScriptedTransport::timeout(),
        ScriptedTransport::timeout(),
        ScriptedTransport::ok(SELECT_BODY),
    ])
    .retry_policy(fast_retries(5));

    let rows = client
        .select("SELECT ?item WHERE {}", None)
        .unwrap()
        .unwrap();
    assert_eq!(rows.len(), 2);

    let requests = client.transport().requests.borrow();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|url| url == &requests[0]));
}

#[test]
fn test_persistent_timeouts_exhaust_the_retry_budget() {
    let mut client = client_with(vec![
        ScriptedTransport::timeout(),
        ScriptedTransport::timeout(),
        ScriptedTransport::timeout(),
    ])
    .retry_policy(fast_retries(2));

    let err = client.select("SELECT ?item WHERE {}", None).unwrap_err();
    assert!(matches!(err, SparqlError::RetriesExhausted));
    // Initial attempt plus two retries.
    assert_eq!(client.transport().requests.borrow().len(), 3);
    assert!(client.last_response().is_none());
}

#[test]
fn test_non_timeout_transport_errors_are_not_retried() {
    let mut client = client_with(vec![Err(TransportError::Http(
        "connection refused".to_string(),
    ))])
    .retry_policy(fast_retries(5));

    let err = client.select("SELECT ?item WHERE {}", None).unwrap_err();
    assert!(matches!(
        err,
        SparqlError::Transport(TransportError::Http(_))
    ));
    assert_eq!(client.transport().requests.borrow().len(), 1);
}

#[test]
fn test_bound_cell_without_a_value_is_malformed() {
    let body = r#"{
        "head": {"vars": ["x"]},
        "results": {"bindings": [{"x": {"type": "literal"}}]}
    }"#;
    let mut client = client_with(vec![
        ScriptedTransport::ok(body),
        ScriptedTransport::ok(body),
    ]);

    let err = client.select("SELECT ?x WHERE {}", None).unwrap_err();
    match err {
        SparqlError::MalformedBinding { var, .. } => assert_eq!(var, "x"),
        other => panic!("Expected MalformedBinding, got {other:?}"),
    }

    let err = client.select_full("SELECT ?x WHERE {}", None).unwrap_err();
    assert!(matches!(err, SparqlError::MalformedBinding { .. }));
}
