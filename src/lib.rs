//! Quaero — SPARQL query client for Wikibase-style knowledge bases
//!
//! Quaero runs SPARQL SELECT and ASK queries against endpoints such as the
//! Wikidata Query Service and turns SPARQL Results JSON into typed RDF
//! terms:
//!
//! - **[`SparqlClient`]** — blocking HTTP query executor with timeout
//!   retries, a last-response handle, and login-wall detection for the
//!   Wikimedia Commons query service
//! - **[`SparqlTerm`]** — typed decoding of result bindings (URIs,
//!   literals, blank nodes) with short entity identifier extraction
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use quaero::SparqlClient;
//!
//! fn main() -> quaero::SparqlResult<()> {
//!     let mut client = SparqlClient::wikidata()?;
//!     let rows = client.select(
//!         "SELECT ?cat WHERE { ?cat wdt:P31 wd:Q146 } LIMIT 5",
//!         None,
//!     )?;
//!     for row in rows.unwrap_or_default() {
//!         println!("{:?}", row.get("cat"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod term;
pub mod transport;

// ============================================================
// Client surface
// ============================================================

pub use client::{default_headers, SparqlClient, TermRow, ValueRow};
pub use config::{
    EndpointConfig, SparqlSite, SparqlUnsupported, WIKIDATA_ENTITY_URL, WIKIDATA_SPARQL_ENDPOINT,
};
pub use error::{SparqlError, SparqlResult};
pub use retry::{Backoff, RetryPolicy};

// ============================================================
// Result model
// ============================================================

pub use term::{BnodeTerm, LiteralTerm, SparqlTerm, TermDescriptor, UriTerm};

// ============================================================
// Transport seam
// ============================================================

pub use transport::{
    HeaderMap, HeaderValue, HttpTransport, Response, StatusCode, Transport, TransportError,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert_eq!(version(), VERSION);
    }
}
