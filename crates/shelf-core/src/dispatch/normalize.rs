//! Payload normalization
//!
//! Pure functions that turn loosely typed intent payloads into the store's
//! typed values. Keys are matched through the same synonym table as the
//! table header, so the translator's internal keys (`titulo`, `ano`,
//! `f_revision`), the display headers (`Título`, `Año`) and the English
//! logical names all land on the same field.

use chrono::NaiveDate;
use serde_json::{Map, Value as Json};
use tracing::debug;

use super::error::DispatchError;
use crate::models::{Changes, Criteria, Field, NewRecord, Value, CLEAR_SENTINEL, REVIEW_DATE_FORMAT};
use crate::storage::schema;

/// Review values that mean "reviewed today"
pub const REVIEWED_TODAY: &[&str] = &[
    "", "revisado", "revisada", "reviewed", "true", "sí", "si", "yes", "hoy", "today",
];

/// Where the fields of an `add` payload live
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddShape<'a> {
    /// `{"book": {"titulo": ..}}`
    Book(&'a Map<String, Json>),
    /// `{"data": {"titulo": ..}}`
    Data(&'a Map<String, Json>),
    /// `{"data": {"Título": ..}}`, display headers from older translators
    LegacyData(&'a Map<String, Json>),
    /// `{"titulo": ..}` at the root
    Flat(&'a Map<String, Json>),
}

impl<'a> AddShape<'a> {
    /// Work out the shape of an `add` payload
    ///
    /// Returns `None` for a `data` object that names no title column at all.
    pub fn detect(payload: &'a Map<String, Json>) -> Option<Self> {
        if let Some(Json::Object(book)) = payload.get("book") {
            return Some(AddShape::Book(book));
        }

        match payload.get("data") {
            Some(Json::Object(data)) => {
                if data.contains_key("titulo") || data.contains_key("title") {
                    Some(AddShape::Data(data))
                } else if data.keys().any(|k| schema::resolve(k) == Some(Field::Title)) {
                    Some(AddShape::LegacyData(data))
                } else {
                    None
                }
            }
            _ => Some(AddShape::Flat(payload)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AddShape::Book(_) => "book",
            AddShape::Data(_) => "data",
            AddShape::LegacyData(_) => "legacy data",
            AddShape::Flat(_) => "flat",
        }
    }

    pub fn fields(&self) -> &'a Map<String, Json> {
        match *self {
            AddShape::Book(m) | AddShape::Data(m) | AddShape::LegacyData(m) | AddShape::Flat(m) => m,
        }
    }
}

/// Build the record an `add` intent describes
///
/// Unknown keys are ignored. A missing or blank title is a validation error.
pub fn normalize_add(payload: &Map<String, Json>) -> Result<NewRecord, DispatchError> {
    let shape = AddShape::detect(payload)
        .ok_or_else(|| DispatchError::validation("cannot tell which fields the new record has"))?;
    debug!("add payload shape: {}", shape.name());

    let mut record = NewRecord::default();
    for (key, raw) in shape.fields() {
        let Some(field) = schema::resolve(key) else {
            continue;
        };
        let Some(text) = scalar_text(raw) else {
            continue;
        };
        assign(&mut record, field, &text)?;
    }

    if record.title.trim().is_empty() {
        return Err(DispatchError::validation("a title is required to add a record"));
    }
    Ok(record)
}

fn assign(record: &mut NewRecord, field: Field, text: &str) -> Result<(), DispatchError> {
    let text = text.trim();
    match field {
        Field::Id => {}
        Field::Title => record.title = text.to_string(),
        Field::Author => record.author = text.to_string(),
        Field::Provenance => record.provenance = text.to_string(),
        Field::Category => record.category = text.to_string(),
        Field::Publisher => record.publisher = text.to_string(),
        Field::Isbn => record.isbn = text.to_string(),
        Field::Comments => record.comments = text.to_string(),
        Field::LastReviewed => {
            record.last_reviewed = Some(text.to_string()).filter(|t| !t.is_empty())
        }
        Field::Year => record.year = integer_in(field, text)?,
        Field::Column => record.column = integer_in(field, text)?,
        Field::Row => record.row = integer_in(field, text)?,
    }
    Ok(())
}

/// Parse an integer field value, `None` when blank
fn integer_in<T: TryFrom<i64>>(field: Field, text: &str) -> Result<Option<T>, DispatchError> {
    match Value::coerce(field, Value::Text(text.to_string()))? {
        Value::Integer(n) => T::try_from(n).map(Some).map_err(|_| {
            DispatchError::validation(format!("{} is out of range for {}", n, field))
        }),
        _ => Ok(None),
    }
}

/// Build the change set of an `update` intent
///
/// `null` clears a field, `""` clears a text field, and the literal
/// `"EMPTY"` clears any field. `last_reviewed` goes through
/// [`review_value`]. Keys that name no field are skipped.
pub fn changes_from(map: &Map<String, Json>, today: NaiveDate) -> Result<Changes, DispatchError> {
    let mut changes = Changes::new();

    for (key, raw) in map {
        let Some(field) = schema::resolve(key) else {
            debug!("Skipping unknown change key '{}'", key);
            continue;
        };

        if field == Field::LastReviewed {
            match review_value(raw, today) {
                Some(date) => changes.set_text(field, date)?,
                None => changes.clear(field),
            };
            continue;
        }

        match raw {
            Json::Null => {
                changes.clear(field);
            }
            Json::String(s) => {
                changes.set_text(field, s.trim())?;
            }
            Json::Number(n) => {
                match n.as_i64() {
                    Some(i) => changes.set(field, Value::Integer(i))?,
                    None => changes.set_text(field, n.to_string())?,
                };
            }
            Json::Bool(b) => {
                changes.set_text(field, b.to_string())?;
            }
            Json::Array(_) | Json::Object(_) => {
                return Err(DispatchError::validation(format!(
                    "'{}' must be a single value",
                    key
                )));
            }
        }
    }

    Ok(changes)
}

/// Normalize a review-date change
///
/// Returns the text to store, or `None` to clear the field. The clear
/// sentinel, `null` and `false` clear; blank and affirmative values
/// ("revisado", "sí", `true`, ..) become `today` as `dd/mm/YYYY`; anything
/// else is kept exactly as given.
pub fn review_value(raw: &Json, today: NaiveDate) -> Option<String> {
    match raw {
        Json::Null | Json::Bool(false) => None,
        Json::Bool(true) => Some(today_stamp(today)),
        Json::String(s) => {
            let normalized = s.trim().to_lowercase();
            if s.trim() == CLEAR_SENTINEL {
                None
            } else if REVIEWED_TODAY.contains(&normalized.as_str()) {
                Some(today_stamp(today))
            } else {
                Some(s.clone())
            }
        }
        other => Some(other.to_string()),
    }
}

/// `today` in the review date format
pub fn today_stamp(today: NaiveDate) -> String {
    today.format(REVIEW_DATE_FORMAT).to_string()
}

/// Build `find` criteria from a query object
pub fn criteria_from(query: &Map<String, Json>) -> Criteria {
    let mut criteria = Criteria::new();
    for (key, raw) in query {
        match (schema::resolve(key), scalar_text(raw)) {
            (Some(field), Some(needle)) => criteria.push(field, needle),
            _ => debug!("Skipping query key '{}'", key),
        }
    }
    criteria
}

/// Text of a scalar JSON value; `None` for null, arrays and objects
pub fn scalar_text(raw: &Json) -> Option<String> {
    match raw {
        Json::String(s) => Some(s.trim().to_string()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer carried by a number or numeric string
pub fn integer_of(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
