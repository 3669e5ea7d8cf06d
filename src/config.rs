//! Endpoint configuration
//!
//! A client needs two pieces of configuration: the SPARQL endpoint URL and
//! the entity URI prefix under which the knowledge base mints item
//! identifiers. Both can be given explicitly, taken from the Wikidata
//! defaults, or derived from a [`SparqlSite`].

use std::sync::Arc;

use thiserror::Error;

use crate::error::{SparqlError, SparqlResult};

/// SPARQL endpoint of the Wikidata Query Service
pub const WIKIDATA_SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

/// Entity URI prefix under which Wikidata mints item identifiers
pub const WIKIDATA_ENTITY_URL: &str = "http://www.wikidata.org/entity/";

/// Returned by [`SparqlSite::sparql_endpoint`] when the site software
/// predates SPARQL endpoint metadata
#[derive(Error, Debug, Clone, Copy)]
#[error("The site API does not expose SPARQL endpoint metadata")]
pub struct SparqlUnsupported;

/// A wiki site from which SPARQL configuration can be derived.
///
/// The client only needs the advertised query endpoint and the concept base
/// URI; anything else about the site stays behind this trait.
pub trait SparqlSite {
    /// Site identifier used in error messages
    fn name(&self) -> String;

    /// The SPARQL endpoint the site advertises, if any.
    ///
    /// `Ok(None)` means the site software could advertise an endpoint but
    /// does not; `Err` means the software cannot express SPARQL support
    /// at all.
    fn sparql_endpoint(&self) -> Result<Option<String>, SparqlUnsupported>;

    /// Base URI under which the site mints entity identifiers
    fn concept_base_uri(&self) -> String;
}

/// Immutable endpoint configuration for a [`SparqlClient`](crate::SparqlClient)
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    endpoint: String,
    entity_url: Arc<str>,
}

impl EndpointConfig {
    /// Configuration from an explicit endpoint URL and entity URI prefix.
    ///
    /// Both must be non-empty.
    pub fn new(endpoint: impl Into<String>, entity_url: impl Into<String>) -> SparqlResult<Self> {
        let endpoint = endpoint.into();
        let entity_url = entity_url.into();
        if endpoint.is_empty() {
            return Err(SparqlError::Config(
                "endpoint URL must not be empty".to_string(),
            ));
        }
        if entity_url.is_empty() {
            return Err(SparqlError::Config(
                "if initialised with an endpoint, entity_url must be provided".to_string(),
            ));
        }
        Ok(Self {
            endpoint,
            entity_url: Arc::from(entity_url),
        })
    }

    /// Configuration for Wikidata, the default knowledge base
    pub fn wikidata() -> Self {
        Self {
            endpoint: WIKIDATA_SPARQL_ENDPOINT.to_string(),
            entity_url: Arc::from(WIKIDATA_ENTITY_URL),
        }
    }

    /// Derive a configuration from a site object.
    ///
    /// Fails with [`SparqlError::Unsupported`] when the site software cannot
    /// express SPARQL support, and with [`SparqlError::Config`] when it could
    /// but advertises no endpoint.
    pub fn from_site(site: &impl SparqlSite) -> SparqlResult<Self> {
        let endpoint = site.sparql_endpoint().map_err(|_| {
            SparqlError::Unsupported(format!(
                "wiki version of {} must be 1.28-wmf.23 or newer to automatically \
                 extract the SPARQL endpoint; provide the endpoint and entity_url \
                 parameters instead of a site",
                site.name()
            ))
        })?;
        match endpoint {
            Some(endpoint) if !endpoint.is_empty() => Self::new(endpoint, site.concept_base_uri()),
            _ => Err(SparqlError::Config(format!(
                "the site {} does not provide a SPARQL endpoint",
                site.name()
            ))),
        }
    }

    /// The endpoint URL queries are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The entity URI prefix used to derive short entity identifiers
    pub fn entity_url(&self) -> &str {
        &self.entity_url
    }

    /// Shared handle to the entity URI prefix, attached to decoded URI terms
    pub(crate) fn entity_url_handle(&self) -> &Arc<str> {
        &self.entity_url
    }
}
