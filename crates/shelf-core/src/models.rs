//! Data models for shelf
//!
//! Defines the catalog record, the logical fields it is made of, and the
//! typed change sets used to mutate a record in place.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal value that clears a field when used as a change.
pub const CLEAR_SENTINEL: &str = "EMPTY";

/// Format used when the catalog stamps a review date.
pub const REVIEW_DATE_FORMAT: &str = "%d/%m/%Y";

/// A logical column of the catalog table
///
/// Variants are declared in canonical header order; `Field::ALL` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    Title,
    Author,
    Provenance,
    Category,
    Publisher,
    Year,
    Column,
    Row,
    Isbn,
    LastReviewed,
    Comments,
}

impl Field {
    /// Every field, in canonical header order
    pub const ALL: [Field; 12] = [
        Field::Id,
        Field::Title,
        Field::Author,
        Field::Provenance,
        Field::Category,
        Field::Publisher,
        Field::Year,
        Field::Column,
        Field::Row,
        Field::Isbn,
        Field::LastReviewed,
        Field::Comments,
    ];

    /// Header written when the table is created from scratch
    pub fn header(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Title => "Título",
            Field::Author => "Autor",
            Field::Provenance => "Procedencia",
            Field::Category => "Categoría",
            Field::Publisher => "Editorial",
            Field::Year => "Año",
            Field::Column => "Columna",
            Field::Row => "Fila",
            Field::Isbn => "ISBN",
            Field::LastReviewed => "F_revision",
            Field::Comments => "Comentarios",
        }
    }

    /// Logical (English) name, as used in serialized records
    pub fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Title => "title",
            Field::Author => "author",
            Field::Provenance => "provenance",
            Field::Category => "category",
            Field::Publisher => "publisher",
            Field::Year => "year",
            Field::Column => "column",
            Field::Row => "row",
            Field::Isbn => "isbn",
            Field::LastReviewed => "last_reviewed",
            Field::Comments => "comments",
        }
    }

    /// Whether the field holds an integer rather than free text
    pub fn is_integer(self) -> bool {
        matches!(self, Field::Id | Field::Year | Field::Column | Field::Row)
    }

    /// Whether `n` fits the integer type this field is read back as
    pub fn accepts(self, n: i64) -> bool {
        match self {
            Field::Year => i32::try_from(n).is_ok(),
            Field::Id | Field::Column | Field::Row => u32::try_from(n).is_ok(),
            _ => true,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One catalog entry (a book)
///
/// `id` is positional: it equals the record's 1-based position in the
/// table and shifts down when an earlier record is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u32,
    pub title: String,
    pub author: String,
    pub provenance: String,
    pub category: String,
    pub publisher: String,
    pub year: Option<i32>,
    pub column: Option<u32>,
    pub row: Option<u32>,
    pub isbn: String,
    /// Review date as written in the table, normally `dd/mm/YYYY`
    pub last_reviewed: Option<String>,
    pub comments: String,
}

impl Record {
    /// Text of a field as it would appear in its cell
    pub fn text(&self, field: Field) -> String {
        match field {
            Field::Id => self.id.to_string(),
            Field::Title => self.title.clone(),
            Field::Author => self.author.clone(),
            Field::Provenance => self.provenance.clone(),
            Field::Category => self.category.clone(),
            Field::Publisher => self.publisher.clone(),
            Field::Year => int_text(self.year),
            Field::Column => int_text(self.column),
            Field::Row => int_text(self.row),
            Field::Isbn => self.isbn.clone(),
            Field::LastReviewed => self.last_reviewed.clone().unwrap_or_default(),
            Field::Comments => self.comments.clone(),
        }
    }

    /// Review date parsed from `last_reviewed`
    ///
    /// Accepts `dd/mm/YYYY` (with or without leading zeros) and ISO dates.
    /// Returns `None` when the record was never reviewed or the cell holds
    /// free text.
    pub fn reviewed_on(&self) -> Option<NaiveDate> {
        let raw = self.last_reviewed.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, REVIEW_DATE_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .ok()
    }
}

fn int_text<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Field values for a record that has not been stored yet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub title: String,
    pub author: String,
    pub provenance: String,
    pub category: String,
    pub publisher: String,
    pub year: Option<i32>,
    pub column: Option<u32>,
    pub row: Option<u32>,
    pub isbn: String,
    pub last_reviewed: Option<String>,
    pub comments: String,
}

impl NewRecord {
    /// Create a draft with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Attach the id the store assigned
    pub fn into_record(self, id: u32) -> Record {
        Record {
            id,
            title: self.title,
            author: self.author,
            provenance: self.provenance,
            category: self.category,
            publisher: self.publisher,
            year: self.year,
            column: self.column,
            row: self.row,
            isbn: self.isbn,
            last_reviewed: self.last_reviewed,
            comments: self.comments,
        }
    }
}

/// A new value for a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    /// Blank the cell
    Empty,
}

impl Value {
    /// Cell text for this value
    pub fn to_cell(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Empty => String::new(),
        }
    }

    /// Coerce a value to the kind `field` holds
    ///
    /// Integer fields accept integers or numeric text within the field's
    /// range; blank text and the clear sentinel become `Empty`. Text fields accept anything, with
    /// integers written in decimal and the sentinel clearing the cell.
    pub fn coerce(field: Field, value: Value) -> Result<Value, InvalidValue> {
        match value {
            Value::Text(s) if s.trim() == CLEAR_SENTINEL => Ok(Value::Empty),
            Value::Text(s) if field.is_integer() => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(Value::Empty);
                }
                match trimmed.parse::<i64>() {
                    Ok(n) if field.accepts(n) => Ok(Value::Integer(n)),
                    _ => Err(InvalidValue { field, value: s }),
                }
            }
            Value::Integer(n) if !field.is_integer() => Ok(Value::Text(n.to_string())),
            Value::Integer(n) if !field.accepts(n) => Err(InvalidValue {
                field,
                value: n.to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// A value that cannot be stored in its target field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid integer for {field}")]
pub struct InvalidValue {
    pub field: Field,
    pub value: String,
}

/// An ordered set of field changes for one record
///
/// Values are coerced on insertion, so a `Changes` never carries a
/// non-numeric or out-of-range value for an integer field. The id column is
/// not editable and is silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    entries: Vec<(Field, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier change to the same field
    pub fn set(&mut self, field: Field, value: Value) -> Result<&mut Self, InvalidValue> {
        if field == Field::Id {
            return Ok(self);
        }
        let value = Value::coerce(field, value)?;
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
        Ok(self)
    }

    /// Set a field from raw text
    pub fn set_text(&mut self, field: Field, text: impl Into<String>) -> Result<&mut Self, InvalidValue> {
        self.set(field, Value::Text(text.into()))
    }

    /// Blank a field
    pub fn clear(&mut self, field: Field) -> &mut Self {
        if field != Field::Id {
            self.entries.retain(|(f, _)| *f != field);
            self.entries.push((field, Value::Empty));
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Field, Value)> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[(Field, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Substring criteria for `find`
///
/// A record matches when every criterion is a case-insensitive substring of
/// its field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    terms: Vec<(Field, String)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion; blank needles are dropped
    pub fn with(mut self, field: Field, needle: impl AsRef<str>) -> Self {
        self.push(field, needle);
        self
    }

    pub fn push(&mut self, field: Field, needle: impl AsRef<str>) {
        let needle = needle.as_ref().trim().to_lowercase();
        if !needle.is_empty() {
            self.terms.push((field, needle));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `text_of` satisfies every criterion
    pub fn matches(&self, text_of: impl Fn(Field) -> String) -> bool {
        self.terms
            .iter()
            .all(|(field, needle)| text_of(*field).to_lowercase().contains(needle.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_matches_index() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }

    #[test]
    fn test_record_serializes_every_field() {
        let record = NewRecord::new("Ethics").into_record(1);
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 12);
        for field in Field::ALL {
            assert!(obj.contains_key(field.name()), "missing {}", field);
        }
        assert_eq!(obj["year"], serde_json::Value::Null);
        assert_eq!(obj["author"], "");
    }

    #[test]
    fn test_reviewed_on_formats() {
        let mut record = Record::default();
        assert!(record.reviewed_on().is_none());

        record.last_reviewed = Some("12/03/2022".to_string());
        assert_eq!(record.reviewed_on(), NaiveDate::from_ymd_opt(2022, 3, 12));

        record.last_reviewed = Some("2/3/2022".to_string());
        assert_eq!(record.reviewed_on(), NaiveDate::from_ymd_opt(2022, 3, 2));

        record.last_reviewed = Some("2022-03-12".to_string());
        assert_eq!(record.reviewed_on(), NaiveDate::from_ymd_opt(2022, 3, 12));

        record.last_reviewed = Some("last spring".to_string());
        assert!(record.reviewed_on().is_none());
    }

    #[test]
    fn test_coerce_integer_fields() {
        assert_eq!(
            Value::coerce(Field::Row, Value::Text(" 3 ".into())).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            Value::coerce(Field::Year, Value::Text("".into())).unwrap(),
            Value::Empty
        );
        assert_eq!(
            Value::coerce(Field::Column, Value::Text("EMPTY".into())).unwrap(),
            Value::Empty
        );

        let err = Value::coerce(Field::Year, Value::Text("s.f.".into())).unwrap_err();
        assert_eq!(err.field, Field::Year);
        assert!(err.to_string().contains("s.f."));
    }

    #[test]
    fn test_coerce_rejects_out_of_range_integers() {
        let err = Value::coerce(Field::Row, Value::Integer(-3)).unwrap_err();
        assert_eq!(err.field, Field::Row);
        assert_eq!(err.value, "-3");

        assert!(Value::coerce(Field::Column, Value::Text("-1".into())).is_err());
        assert!(Value::coerce(Field::Year, Value::Text("9999999999".into())).is_err());
        assert!(Value::coerce(Field::Row, Value::Integer(i64::from(u32::MAX) + 1)).is_err());

        assert_eq!(
            Value::coerce(Field::Year, Value::Integer(-350)).unwrap(),
            Value::Integer(-350)
        );
        assert_eq!(
            Value::coerce(Field::Row, Value::Integer(0)).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_coerce_text_fields() {
        assert_eq!(
            Value::coerce(Field::Isbn, Value::Integer(978)).unwrap(),
            Value::Text("978".into())
        );
        assert_eq!(
            Value::coerce(Field::LastReviewed, Value::Text("EMPTY".into())).unwrap(),
            Value::Empty
        );
        assert_eq!(
            Value::coerce(Field::Title, Value::Text("".into())).unwrap(),
            Value::Text("".into())
        );
    }

    #[test]
    fn test_changes_ignore_id_and_dedupe() {
        let mut changes = Changes::new();
        changes.set_text(Field::Id, "99").unwrap();
        assert!(changes.is_empty());

        changes.set_text(Field::Author, "Plato").unwrap();
        changes.set_text(Field::Author, "Platón").unwrap();
        changes.clear(Field::Year);

        let entries: Vec<_> = changes.iter().cloned().collect();
        assert_eq!(
            entries,
            vec![
                (Field::Author, Value::Text("Platón".into())),
                (Field::Year, Value::Empty),
            ]
        );
    }

    #[test]
    fn test_criteria_drop_blank_needles() {
        let criteria = Criteria::new().with(Field::Title, "   ").with(Field::Isbn, "");
        assert!(criteria.is_empty());
    }

    #[test]
    fn test_criteria_all_must_match() {
        let record = Record {
            title: "Ética a Nicómaco".into(),
            author: "Aristóteles".into(),
            ..Record::default()
        };

        let hit = Criteria::new()
            .with(Field::Author, " ARIST ")
            .with(Field::Title, "ética");
        assert!(hit.matches(|f| record.text(f)));

        let miss = Criteria::new()
            .with(Field::Author, "arist")
            .with(Field::Title, "república");
        assert!(!miss.matches(|f| record.text(f)));
    }
}
