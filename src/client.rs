//! SPARQL query client
//!
//! [`SparqlClient`] runs SELECT and ASK queries against a SPARQL endpoint
//! over HTTP, retries timed-out requests with capped exponential backoff,
//! and projects SPARQL Results JSON bindings into rows of raw values or
//! typed [`SparqlTerm`]s.

use std::sync::Arc;

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;
use tracing::debug;

use crate::config::{EndpointConfig, SparqlSite};
use crate::error::{SparqlError, SparqlResult};
use crate::retry::RetryPolicy;
use crate::term::{SparqlTerm, TermDescriptor};
use crate::transport::{HeaderMap, HeaderValue, HttpTransport, Response, Transport};

/// Characters escaped when the query text is embedded in the request URL:
/// everything except alphanumerics, `_`, `.`, `-`, `~` and `/`
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Host whose login walls the not-logged-in heuristic recognizes
const COMMONS_QUERY_HOST: &str = "https://commons-query.wikimedia.org";

/// Prefix a login-wall body starts with
const HTML_DOCTYPE: &str = "<!DOCTYPE html>";

/// Marker substrings a login-wall body contains
const LOGIN_MARKERS: [&str; 2] = ["Special:UserLogin", "Special:OAuth"];

/// One SELECT row in raw mode: declared variable to scalar value
pub type ValueRow = IndexMap<String, Option<String>>;

/// One SELECT row in full-data mode: declared variable to typed term
pub type TermRow = IndexMap<String, Option<SparqlTerm>>;

/// Default request headers: caching disabled, SPARQL Results JSON requested
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/sparql-results+json"),
    );
    headers
}

/// SPARQL query client.
///
/// Operations take `&mut self`: every call resets the last-response handle,
/// so one client instance must not be shared between concurrent queries.
/// Use one instance per thread or serialize access externally.
///
/// The transport is a type parameter so tests and instrumented callers can
/// substitute their own; the default is the blocking [`HttpTransport`].
pub struct SparqlClient<T: Transport = HttpTransport> {
    config: EndpointConfig,
    transport: T,
    retry: RetryPolicy,
    last_response: Option<Response>,
}

impl SparqlClient<HttpTransport> {
    /// Client for the given endpoint configuration, over the default
    /// blocking HTTP transport
    pub fn new(config: EndpointConfig) -> SparqlResult<Self> {
        Ok(Self::with_transport(config, HttpTransport::new()?))
    }

    /// Client for the Wikidata Query Service
    pub fn wikidata() -> SparqlResult<Self> {
        Self::new(EndpointConfig::wikidata())
    }

    /// Client configured from a site object
    pub fn from_site(site: &impl SparqlSite) -> SparqlResult<Self> {
        Self::new(EndpointConfig::from_site(site)?)
    }
}

impl<T: Transport> SparqlClient<T> {
    /// Client over a caller-supplied transport
    pub fn with_transport(config: EndpointConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            retry: RetryPolicy::default(),
            last_response: None,
        }
    }

    /// Replace the retry policy
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The endpoint configuration this client queries
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// The transport this client fetches through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The response received by the most recent query call, if any.
    ///
    /// Reset at the start of every call, and set before the call returns
    /// whenever a transport response arrived, decodable or not. Read it
    /// before issuing the next query.
    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Run a SPARQL query and return the parsed JSON document.
    ///
    /// The query is percent-encoded into the request URL. Timed-out
    /// requests are retried under the client's retry policy; any other
    /// transport failure is returned as is. A response body that is not
    /// valid JSON yields `Ok(None)`, except for the recognized Wikimedia
    /// Commons login wall, which fails with [`SparqlError::NotLoggedIn`];
    /// either way the raw body stays available through
    /// [`last_response`](Self::last_response).
    pub fn query(
        &mut self,
        query: &str,
        headers: Option<&HeaderMap>,
    ) -> SparqlResult<Option<Value>> {
        let default = default_headers();
        let headers = headers.unwrap_or(&default);

        self.last_response = None;
        let url = format!(
            "{}?query={}",
            self.config.endpoint(),
            utf8_percent_encode(query, QUERY_ENCODE_SET)
        );
        debug!("Running SPARQL query against {}", self.config.endpoint());

        let mut backoff = self.retry.backoff();
        let response = loop {
            match self.transport.fetch(&url, headers) {
                Ok(response) => break response,
                Err(error) if error.is_timeout() => backoff.wait()?,
                Err(error) => return Err(error.into()),
            }
        };

        match response.json() {
            Ok(document) => {
                self.last_response = Some(response);
                Ok(Some(document))
            }
            Err(_) => {
                // The endpoint gives no structured auth error; a Commons
                // login wall is the one non-JSON body we recognize.
                let login_wall = {
                    let content = response.text();
                    content.starts_with(HTML_DOCTYPE)
                        && url.contains(COMMONS_QUERY_HOST)
                        && LOGIN_MARKERS.iter().any(|marker| content.contains(marker))
                };
                self.last_response = Some(response);
                if login_wall {
                    Err(SparqlError::NotLoggedIn)
                } else {
                    debug!("Response body was not valid JSON; returning no result");
                    Ok(None)
                }
            }
        }
    }

    /// Run a SELECT query and project each binding to its raw scalar values.
    ///
    /// Returns one row per binding with every declared variable present, in
    /// declared order; variables a row leaves unbound map to `None`.
    /// `Ok(None)` means the response carried no `results` section (or was
    /// not JSON at all).
    pub fn select(
        &mut self,
        query: &str,
        headers: Option<&HeaderMap>,
    ) -> SparqlResult<Option<Vec<ValueRow>>> {
        let data = match self.query(query, headers)? {
            Some(data) => data,
            None => return Ok(None),
        };
        project_rows(&data, |var, cell| {
            cell.get("value")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| SparqlError::MalformedBinding {
                    var: var.to_string(),
                    reason: "missing value field".to_string(),
                })
        })
    }

    /// Run a SELECT query and decode each binding into typed terms.
    ///
    /// Same row shape as [`select`](Self::select), but every bound cell is
    /// decoded into a [`SparqlTerm`]; a cell with an unrecognized type tag
    /// fails the whole call with [`SparqlError::UnknownTermType`].
    pub fn select_full(
        &mut self,
        query: &str,
        headers: Option<&HeaderMap>,
    ) -> SparqlResult<Option<Vec<TermRow>>> {
        let data = match self.query(query, headers)? {
            Some(data) => data,
            None => return Ok(None),
        };
        let entity_url = Arc::clone(self.config.entity_url_handle());
        project_rows(&data, |var, cell| {
            let descriptor: TermDescriptor =
                serde_json::from_value(cell.clone()).map_err(|error| {
                    SparqlError::MalformedBinding {
                        var: var.to_string(),
                        reason: error.to_string(),
                    }
                })?;
            SparqlTerm::from_descriptor(descriptor, &entity_url)
        })
    }

    /// Run an ASK query and return its boolean result.
    ///
    /// # Panics
    ///
    /// Panics when the response is not an ASK result carrying a `boolean`
    /// field, including when the body did not decode as JSON at all.
    pub fn ask(&mut self, query: &str, headers: Option<&HeaderMap>) -> SparqlResult<bool> {
        let data = self.query(query, headers)?;
        let boolean = data
            .as_ref()
            .and_then(|document| document.get("boolean"))
            .and_then(Value::as_bool)
            .expect("ASK response did not carry a boolean field");
        Ok(boolean)
    }

    /// Run a SELECT query and collect the entity identifiers bound to
    /// `item_name` across all rows.
    ///
    /// One identifier candidate is produced per row, so sequence containers
    /// such as `Vec<String>` keep duplicates while set containers
    /// deduplicate. Rows where the variable is unbound, not a URI, or
    /// outside the entity namespace contribute nothing.
    pub fn get_items<C>(&mut self, query: &str, item_name: &str) -> SparqlResult<C>
    where
        C: FromIterator<String> + Default,
    {
        let rows = match self.select_full(query, None)? {
            Some(rows) => rows,
            None => return Ok(C::default()),
        };
        Ok(rows
            .iter()
            .filter_map(|row| row.get(item_name).and_then(|cell| cell.as_ref()))
            .filter_map(|term| term.entity_id())
            .map(str::to_owned)
            .collect())
    }
}

/// Walk a SPARQL Results JSON document into rows keyed by the declared
/// variable list. `decode` turns each bound cell into a value; unbound
/// variables become `None`. `Ok(None)` when the document has no `results`
/// section.
fn project_rows<V>(
    data: &Value,
    mut decode: impl FnMut(&str, &Value) -> SparqlResult<V>,
) -> SparqlResult<Option<Vec<IndexMap<String, Option<V>>>>> {
    if data.get("results").is_none() {
        return Ok(None);
    }

    let vars = data
        .get("head")
        .and_then(|head| head.get("vars"))
        .and_then(Value::as_array)
        .ok_or_else(|| SparqlError::MalformedResults("missing head.vars".to_string()))?;
    let mut names = Vec::with_capacity(vars.len());
    for var in vars {
        names.push(var.as_str().ok_or_else(|| {
            SparqlError::MalformedResults("non-string variable in head.vars".to_string())
        })?);
    }

    let bindings = data
        .get("results")
        .and_then(|results| results.get("bindings"))
        .and_then(Value::as_array)
        .ok_or_else(|| SparqlError::MalformedResults("missing results.bindings".to_string()))?;

    let mut rows = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let mut row = IndexMap::with_capacity(names.len());
        for &name in &names {
            let value = match binding.get(name) {
                // Not bound in this row; OPTIONAL is probably used.
                None => None,
                Some(cell) => Some(decode(name, cell)?),
            };
            row.insert(name.to_string(), value);
        }
        rows.push(row);
    }
    Ok(Some(rows))
}
