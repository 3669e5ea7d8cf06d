//! Typed RDF terms decoded from SPARQL Results JSON
//!
//! Each bound variable in a SELECT binding arrives as a term descriptor:
//! a type tag plus a lexical value and optional datatype/language
//! annotations. Full-data decoding turns descriptors into [`SparqlTerm`]
//! values. The tag dispatch is total; an unrecognized tag fails decoding
//! instead of being skipped or coerced to a default.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{SparqlError, SparqlResult};

/// Wire-format term descriptor from a SPARQL Results JSON document
#[derive(Debug, Clone, Deserialize)]
pub struct TermDescriptor {
    /// Term type tag: `uri`, `literal` or `bnode`
    #[serde(rename = "type")]
    pub term_type: String,
    /// Lexical value
    pub value: String,
    /// Datatype IRI, when the source carried one
    pub datatype: Option<String>,
    /// Language tag, when the source carried one
    #[serde(rename = "xml:lang")]
    pub language: Option<String>,
}

/// An RDF term bound to a query variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SparqlTerm {
    /// URI reference
    Uri(UriTerm),
    /// Literal value with optional datatype or language tag
    Literal(LiteralTerm),
    /// Blank node with an opaque label
    Bnode(BnodeTerm),
}

impl SparqlTerm {
    /// Decode a wire descriptor into a typed term.
    ///
    /// URI terms keep a shared handle to the `entity_url` prefix so they can
    /// derive short entity identifiers later. An unrecognized type tag is a
    /// hard failure carrying the offending tag.
    pub fn from_descriptor(descriptor: TermDescriptor, entity_url: &Arc<str>) -> SparqlResult<Self> {
        match descriptor.term_type.as_str() {
            "uri" => Ok(SparqlTerm::Uri(UriTerm {
                value: descriptor.value,
                entity_url: Arc::clone(entity_url),
            })),
            "literal" => Ok(SparqlTerm::Literal(LiteralTerm {
                value: descriptor.value,
                datatype: descriptor.datatype,
                language: descriptor.language,
            })),
            "bnode" => Ok(SparqlTerm::Bnode(BnodeTerm {
                value: descriptor.value,
            })),
            other => Err(SparqlError::UnknownTermType(other.to_string())),
        }
    }

    /// The lexical value of the term
    pub fn value(&self) -> &str {
        match self {
            SparqlTerm::Uri(uri) => uri.value(),
            SparqlTerm::Literal(literal) => literal.value(),
            SparqlTerm::Bnode(bnode) => bnode.value(),
        }
    }

    /// Short entity identifier, for URI terms under the entity prefix
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            SparqlTerm::Uri(uri) => uri.entity_id(),
            _ => None,
        }
    }

    /// Check if this term is a URI reference
    pub fn is_uri(&self) -> bool {
        matches!(self, SparqlTerm::Uri(_))
    }

    /// Check if this term is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, SparqlTerm::Literal(_))
    }

    /// Check if this term is a blank node
    pub fn is_bnode(&self) -> bool {
        matches!(self, SparqlTerm::Bnode(_))
    }
}

impl fmt::Display for SparqlTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SparqlTerm::Uri(uri) => uri.fmt(f),
            SparqlTerm::Literal(literal) => literal.fmt(f),
            SparqlTerm::Bnode(bnode) => bnode.fmt(f),
        }
    }
}

impl From<UriTerm> for SparqlTerm {
    fn from(uri: UriTerm) -> Self {
        SparqlTerm::Uri(uri)
    }
}

impl From<LiteralTerm> for SparqlTerm {
    fn from(literal: LiteralTerm) -> Self {
        SparqlTerm::Literal(literal)
    }
}

impl From<BnodeTerm> for SparqlTerm {
    fn from(bnode: BnodeTerm) -> Self {
        SparqlTerm::Bnode(bnode)
    }
}

/// URI reference term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTerm {
    value: String,
    entity_url: Arc<str>,
}

impl UriTerm {
    /// Create a URI term under the given entity URI prefix
    pub fn new(value: impl Into<String>, entity_url: impl Into<Arc<str>>) -> Self {
        Self {
            value: value.into(),
            entity_url: entity_url.into(),
        }
    }

    /// The raw URI string
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Identifier of the entity this URI names, e.g. `Q1234`.
    ///
    /// `None` when the URI does not start with the configured entity prefix.
    /// The match is an exact string prefix match with no normalization.
    pub fn entity_id(&self) -> Option<&str> {
        self.value.strip_prefix(self.entity_url.as_ref())
    }
}

impl fmt::Display for UriTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

/// Literal term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralTerm {
    value: String,
    datatype: Option<String>,
    language: Option<String>,
}

impl LiteralTerm {
    /// Create a simple literal without datatype or language tag
    pub fn simple(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a language-tagged literal
    pub fn language_tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Create a typed literal
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// The lexical value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Datatype IRI, if any
    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    /// Language tag, if any
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

impl fmt::Display for LiteralTerm {
    /// Renders `value^^datatype`, `value@language`, or the bare value.
    /// A datatype wins over a language tag when both are present.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(datatype) = &self.datatype {
            write!(f, "{}^^{}", self.value, datatype)
        } else if let Some(language) = &self.language {
            write!(f, "{}@{}", self.value, language)
        } else {
            f.write_str(&self.value)
        }
    }
}

/// Blank node term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BnodeTerm {
    value: String,
}

impl BnodeTerm {
    /// Create a blank node term from its label
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The blank node label
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for BnodeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.value)
    }
}
