//! Error types for the quaero SPARQL client

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the SPARQL client
#[derive(Error, Debug)]
pub enum SparqlError {
    /// Endpoint configuration problem (empty endpoint, missing entity URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured site cannot serve SPARQL queries at all
    #[error("SPARQL not supported: {0}")]
    Unsupported(String),

    /// Transport failure other than a timeout
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Timeout retry budget spent by the wait primitive
    #[error("Maximum retries attempted without success")]
    RetriesExhausted,

    /// The endpoint answered with a login page instead of results
    #[error(
        "User not logged in. You need to log in to Wikimedia Commons and give \
         OAuth permission. Open https://commons-query.wikimedia.org with a \
         browser to log in and give permission."
    )]
    NotLoggedIn,

    /// A term descriptor carried a type tag outside uri/literal/bnode
    #[error("Unknown term type: {0}")]
    UnknownTermType(String),

    /// A bound cell in a result row did not have the expected shape
    #[error("Malformed binding for variable ?{var}: {reason}")]
    MalformedBinding {
        /// Variable whose cell could not be read
        var: String,
        /// What was wrong with it
        reason: String,
    },

    /// The document has a `results` section but an unusable header
    #[error("Malformed results document: {0}")]
    MalformedResults(String),
}

pub type SparqlResult<T> = Result<T, SparqlError>;
