//! Intent wire types
//!
//! Intents arrive as JSON objects tagged by `op`, produced by an upstream
//! translator. Payload values stay loosely typed (`serde_json::Value`) here
//! because the translator is not consistent about strings versus numbers;
//! the normalization step turns them into typed values.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::DispatchError;
use crate::resolver::Reference;

/// Every `op` tag the dispatcher understands
pub const OPS: &[&str] = &[
    "add",
    "get",
    "find",
    "last",
    "set_position",
    "set_pos",
    "set_isbn",
    "update",
    "delete",
    "chat",
];

/// A structured operation request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Intent {
    /// Add a record; the payload is one of several shapes (see `AddShape`)
    Add(Map<String, Value>),

    /// Show one record by id, or by reference
    Get {
        #[serde(default)]
        id: Option<Value>,
        #[serde(default, rename = "ref")]
        reference: Option<Reference>,
    },

    /// Substring search, key to needle
    Find {
        #[serde(default)]
        query: Map<String, Value>,
        #[serde(default)]
        limit: Option<Value>,
    },

    /// The newest `n` records
    Last {
        #[serde(default)]
        n: Option<Value>,
    },

    /// Place a record on the shelf
    #[serde(alias = "set_pos")]
    SetPosition {
        #[serde(default, rename = "ref")]
        reference: Option<Reference>,
        #[serde(default)]
        pos: Option<Position>,
        /// Root-level placement, when `pos` is absent
        #[serde(default, alias = "row")]
        fila: Option<Value>,
        #[serde(default, alias = "column")]
        columna: Option<Value>,
    },

    SetIsbn {
        #[serde(default, rename = "ref")]
        reference: Option<Reference>,
        #[serde(default)]
        isbn: Option<Value>,
    },

    Update {
        #[serde(default, rename = "ref")]
        reference: Option<Reference>,
        #[serde(default)]
        changes: Option<Map<String, Value>>,
    },

    Delete {
        #[serde(default, rename = "ref")]
        reference: Option<Reference>,
    },

    /// Conversational reply, passed back untouched
    Chat {
        #[serde(default)]
        message: String,
    },
}

/// Shelf placement inside a `set_position` intent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Position {
    #[serde(default, alias = "row")]
    pub fila: Option<Value>,
    #[serde(default, alias = "column")]
    pub columna: Option<Value>,
}

impl Intent {
    /// Parse an intent from JSON text
    pub fn parse(text: &str) -> Result<Self, DispatchError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DispatchError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse an intent from an already decoded JSON value
    ///
    /// An object without a string `op` is malformed; an `op` outside
    /// [`OPS`] is unsupported.
    pub fn from_value(value: Value) -> Result<Self, DispatchError> {
        let op = match value.get("op") {
            Some(Value::String(op)) => op.clone(),
            Some(_) => return Err(DispatchError::Malformed("'op' is not a string".into())),
            None => return Err(DispatchError::Malformed("missing 'op'".into())),
        };

        if !OPS.contains(&op.as_str()) {
            return Err(DispatchError::Unsupported(op));
        }

        serde_json::from_value(value)
            .map_err(|e| DispatchError::Malformed(format!("{} intent: {}", op, e)))
    }

    /// The operation name, as used in logs
    pub fn op(&self) -> &'static str {
        match self {
            Intent::Add(_) => "add",
            Intent::Get { .. } => "get",
            Intent::Find { .. } => "find",
            Intent::Last { .. } => "last",
            Intent::SetPosition { .. } => "set_position",
            Intent::SetIsbn { .. } => "set_isbn",
            Intent::Update { .. } => "update",
            Intent::Delete { .. } => "delete",
            Intent::Chat { .. } => "chat",
        }
    }
}
