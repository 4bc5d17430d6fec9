//! Dispatch responses

use serde::Serialize;

use super::error::{DispatchError, ErrorKind};
use crate::models::Record;

/// Outcome of one intent, ready to be rendered or serialized
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// A record was appended
    Added { record: Record },

    /// A single record was looked up
    Record { record: Record },

    /// Search results, newest records, or a `get` that matched several
    List { records: Vec<Record> },

    /// A record was changed; carries its refreshed state
    Updated { record: Record },

    /// A record was removed and later ids shifted down
    Deleted { id: u32 },

    Chat { message: String },

    Failed {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        candidates: Vec<Record>,
    },
}

impl Response {
    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failed { .. })
    }
}

impl From<DispatchError> for Response {
    fn from(error: DispatchError) -> Self {
        let kind = error.kind();
        let message = error.to_string();
        let candidates = match error {
            DispatchError::Ambiguous { candidates, .. } => candidates,
            _ => Vec::new(),
        };
        Response::Failed {
            kind,
            message,
            candidates,
        }
    }
}
