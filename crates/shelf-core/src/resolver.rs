//! Reference resolution
//!
//! Turns a typed reference (`{"type": "titulo", "value": "Ethics"}`) into
//! exactly one record id. Titles, authors and years repeat across a catalog,
//! so anything other than a single match is refused rather than guessed:
//! mutating the wrong record is worse than asking again.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{Criteria, Field, Record};
use crate::storage::StorageError;
use crate::store::CatalogStore;

/// How many candidates a search-based resolution looks at
pub const CANDIDATE_LIMIT: usize = 10;

/// What a reference points by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Id,
    Isbn,
    Year,
    Title,
    Author,
    Publisher,
}

impl RefKind {
    /// Parse a reference type as sent by the intent translator
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "id" => Some(RefKind::Id),
            "isbn" => Some(RefKind::Isbn),
            "ano" | "año" | "year" => Some(RefKind::Year),
            "titulo" | "título" | "title" => Some(RefKind::Title),
            "autor" | "author" => Some(RefKind::Author),
            "editorial" | "publisher" => Some(RefKind::Publisher),
            _ => None,
        }
    }

    /// Field searched for this kind
    pub fn field(self) -> Field {
        match self {
            RefKind::Id => Field::Id,
            RefKind::Isbn => Field::Isbn,
            RefKind::Year => Field::Year,
            RefKind::Title => Field::Title,
            RefKind::Author => Field::Author,
            RefKind::Publisher => Field::Publisher,
        }
    }

    /// Kinds that commonly match several records
    pub fn is_descriptive(self) -> bool {
        matches!(
            self,
            RefKind::Year | RefKind::Title | RefKind::Author | RefKind::Publisher
        )
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.field(), f)
    }
}

/// A typed pointer to a record, as received in an intent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Reference {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Some translators put the id here instead of in `value`
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl Reference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: Some(serde_json::Value::String(value.into())),
            id: None,
        }
    }

    /// Reference by id
    pub fn by_id(id: u32) -> Self {
        Self::new("id", id.to_string())
    }

    /// Parsed kind, or the unknown raw kind
    pub fn kind(&self) -> Result<RefKind, ResolveError> {
        RefKind::parse(&self.kind).ok_or_else(|| ResolveError::UnknownKind(self.kind.clone()))
    }

    /// Trimmed value text; `None` when missing or blank
    pub fn value_text(&self) -> Option<String> {
        let raw = match (&self.value, RefKind::parse(&self.kind)) {
            (Some(v), _) if !v.is_null() => Some(v),
            (_, Some(RefKind::Id)) => self.id.as_ref(),
            _ => None,
        }?;

        let text = match raw {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(text).filter(|t| !t.is_empty())
    }
}

/// Why a reference did not resolve to a single record
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unknown reference type '{0}'")]
    UnknownKind(String),

    #[error("reference has no value")]
    MissingValue,

    #[error("'{0}' is not a record id")]
    InvalidId(String),

    #[error("no record with {kind} matching '{value}'")]
    NotFound { kind: RefKind, value: String },

    #[error("{} records match {kind} '{value}'", .candidates.len())]
    Ambiguous {
        kind: RefKind,
        value: String,
        candidates: Vec<Record>,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Resolves references against a store
pub struct ReferenceResolver<'a> {
    store: &'a CatalogStore,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a CatalogStore) -> Self {
        Self { store }
    }

    /// Resolve `reference` to exactly one record id
    ///
    /// Id references are parsed but not checked for existence; the caller's
    /// store operation reports a missing id. Every other kind searches its
    /// field and succeeds only on a single match.
    pub fn resolve(&self, reference: &Reference) -> Result<u32, ResolveError> {
        let kind = reference.kind()?;
        let value = reference.value_text().ok_or(ResolveError::MissingValue)?;

        if kind == RefKind::Id {
            return value
                .parse::<u32>()
                .map_err(|_| ResolveError::InvalidId(value.clone()));
        }

        let candidates = self.candidates(kind, &value)?;
        debug!(
            "Reference {:?} '{}' matched {} record(s)",
            kind,
            value,
            candidates.len()
        );

        match candidates.as_slice() {
            [only] => Ok(only.id),
            [] => Err(ResolveError::NotFound { kind, value }),
            _ => Err(ResolveError::Ambiguous {
                kind,
                value,
                candidates,
            }),
        }
    }

    /// Records a search-based reference matches, up to [`CANDIDATE_LIMIT`]
    pub fn candidates(&self, kind: RefKind, value: &str) -> Result<Vec<Record>, StorageError> {
        let criteria = Criteria::new().with(kind.field(), value);
        self.store.find(&criteria, CANDIDATE_LIMIT)
    }
}
