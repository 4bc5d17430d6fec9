//! Header schema for the catalog table
//!
//! The table is edited by hand, so header cells drift: accents come and go,
//! capitalization changes, separators vary ("F.revisión", "f_revision",
//! "fecha revision"). Every header is normalized and looked up in a synonym
//! table to find the logical field it holds.

use tracing::warn;

use super::error::SchemaError;
use crate::models::Field;

/// Normalized header spellings and the field each one names
///
/// Keys are in the form produced by [`normalize_header`].
pub const SYNONYMS: &[(&str, Field)] = &[
    ("id", Field::Id),
    ("titulo", Field::Title),
    ("title", Field::Title),
    ("autor", Field::Author),
    ("author", Field::Author),
    ("procedencia", Field::Provenance),
    ("provenance", Field::Provenance),
    ("categoria", Field::Category),
    ("category", Field::Category),
    ("editorial", Field::Publisher),
    ("publisher", Field::Publisher),
    ("ano", Field::Year),
    ("year", Field::Year),
    ("columna", Field::Column),
    ("column", Field::Column),
    ("fila", Field::Row),
    ("row", Field::Row),
    ("isbn", Field::Isbn),
    ("f_revision", Field::LastReviewed),
    ("frevision", Field::LastReviewed),
    ("fecha_revision", Field::LastReviewed),
    ("last_reviewed", Field::LastReviewed),
    ("comentarios", Field::Comments),
    ("comentario", Field::Comments),
    ("comments", Field::Comments),
];

/// Canonical header row for a fresh table
pub fn canonical_header() -> Vec<String> {
    Field::ALL.iter().map(|f| f.header().to_string()).collect()
}

/// Normalize a header cell for synonym lookup
///
/// Lowercases, folds Spanish accents, and collapses runs of `.`, `_`, `-`
/// and whitespace into a single `_`. Leading and trailing separators are
/// dropped.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for ch in raw.trim_start_matches('\u{feff}').chars().flat_map(char::to_lowercase) {
        if matches!(ch, '.' | '_' | '-') || ch.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.push(fold_accent(ch));
    }

    out
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Resolve a header (or any field name) to its logical field
pub fn resolve(raw: &str) -> Option<Field> {
    let key = normalize_header(raw);
    SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, field)| *field)
}

/// Position of each logical field within a concrete header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    columns: [Option<usize>; 12],
}

impl ColumnMap {
    /// Map a header row; when two columns name the same field the first wins
    pub fn from_header(header: &[String]) -> Self {
        let mut columns = [None; 12];
        for (position, cell) in header.iter().enumerate() {
            let Some(field) = resolve(cell) else {
                continue;
            };
            match columns[field.index()] {
                Some(first) => warn!(
                    "Header '{}' in column {} duplicates {} (column {}); ignoring it",
                    cell,
                    position + 1,
                    field,
                    first + 1
                ),
                None => columns[field.index()] = Some(position),
            }
        }
        Self { columns }
    }

    /// Column index holding `field`
    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns[field.index()]
    }

    /// Fields with no column, in canonical order
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.column(*f).is_none())
            .collect()
    }

    /// Fail unless every field has a column
    pub fn validate(&self) -> Result<(), SchemaError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { missing })
        }
    }
}
