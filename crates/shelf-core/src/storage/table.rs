//! In-memory catalog table
//!
//! A `Table` keeps the header row and every data row as raw cells, so
//! columns the catalog does not know about survive a load/save cycle
//! untouched. Typed access goes through the resolved [`ColumnMap`].

use tracing::warn;

use super::error::SchemaError;
use super::schema::{canonical_header, ColumnMap};
use crate::models::{Field, NewRecord, Record, Value};

/// Header plus ordered data rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    header: Vec<String>,
    columns: ColumnMap,
    rows: Vec<Vec<String>>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Empty table with the canonical header
    pub fn new() -> Self {
        let header = canonical_header();
        Self {
            columns: ColumnMap::from_header(&header),
            header,
            rows: Vec::new(),
        }
    }

    /// Build a table from raw rows, the first of which is the header
    ///
    /// No rows at all yields an empty canonical table. Data rows shorter than
    /// the header are padded with blanks.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self, SchemaError> {
        let mut rows = rows.into_iter();
        let Some(header) = rows.next() else {
            return Ok(Self::new());
        };

        let columns = ColumnMap::from_header(&header);
        columns.validate()?;

        let width = header.len();
        let rows = rows
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        let table = Self {
            header,
            columns,
            rows,
        };
        let misnumbered = table.misnumbered();
        if let Some(&first) = misnumbered.first() {
            warn!(
                "{} row(s) carry an id that differs from their position (first at row {}); deleting a record renumbers them",
                misnumbered.len(),
                first + 2
            );
        }
        Ok(table)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Raw data rows, in table order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Trimmed cell text for a field
    pub fn cell(&self, index: usize, field: Field) -> &str {
        self.columns
            .column(field)
            .and_then(|c| self.rows[index].get(c))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// Id of the record at `index`
    ///
    /// Falls back to the positional id when the cell is blank or not a
    /// number, so a hand-edited row is still addressable.
    pub fn id_at(&self, index: usize) -> u32 {
        self.cell(index, Field::Id)
            .parse::<u32>()
            .unwrap_or(index as u32 + 1)
    }

    /// Indexes of rows whose id cell holds a number other than their position
    pub fn misnumbered(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&i| self.id_at(i) != i as u32 + 1)
            .collect()
    }

    /// Index of the first record whose id equals `id`
    pub fn position(&self, id: u32) -> Option<usize> {
        (0..self.rows.len()).find(|&i| self.id_at(i) == id)
    }

    /// Decode the record at `index`
    pub fn record(&self, index: usize) -> Record {
        let text = |field| self.cell(index, field).to_string();
        let integer = |field| parse_int(self.cell(index, field));

        Record {
            id: self.id_at(index),
            title: text(Field::Title),
            author: text(Field::Author),
            provenance: text(Field::Provenance),
            category: text(Field::Category),
            publisher: text(Field::Publisher),
            year: integer(Field::Year).and_then(|n| i32::try_from(n).ok()),
            column: integer(Field::Column).and_then(|n| u32::try_from(n).ok()),
            row: integer(Field::Row).and_then(|n| u32::try_from(n).ok()),
            isbn: text(Field::Isbn),
            last_reviewed: Some(text(Field::LastReviewed)).filter(|s| !s.is_empty()),
            comments: text(Field::Comments),
        }
    }

    /// Decode every record, in table order
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.rows.len()).map(move |i| self.record(i))
    }

    /// Append a record and return its positional id
    pub fn push(&mut self, draft: &NewRecord) -> u32 {
        let id = self.rows.len() as u32 + 1;
        let mut row = vec![String::new(); self.header.len()];

        let cells = [
            (Field::Id, id.to_string()),
            (Field::Title, draft.title.clone()),
            (Field::Author, draft.author.clone()),
            (Field::Provenance, draft.provenance.clone()),
            (Field::Category, draft.category.clone()),
            (Field::Publisher, draft.publisher.clone()),
            (Field::Year, opt_text(draft.year)),
            (Field::Column, opt_text(draft.column)),
            (Field::Row, opt_text(draft.row)),
            (Field::Isbn, draft.isbn.clone()),
            (Field::LastReviewed, draft.last_reviewed.clone().unwrap_or_default()),
            (Field::Comments, draft.comments.clone()),
        ];
        for (field, value) in cells {
            if let Some(c) = self.columns.column(field) {
                row[c] = value;
            }
        }

        self.rows.push(row);
        id
    }

    /// Write one field of the record at `index`
    pub fn set(&mut self, index: usize, field: Field, value: &Value) {
        if let Some(c) = self.columns.column(field) {
            self.rows[index][c] = value.to_cell();
        }
    }

    /// Remove the record at `index`, shifting later records up
    pub fn remove(&mut self, index: usize) -> Vec<String> {
        self.rows.remove(index)
    }

    /// Rewrite every id cell to its 1-based position
    pub fn renumber(&mut self) {
        if let Some(c) = self.columns.column(Field::Id) {
            for (i, row) in self.rows.iter_mut().enumerate() {
                row[c] = (i + 1).to_string();
            }
        }
    }
}

fn parse_int(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok()
}

fn opt_text<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn seeded(titles: &[&str]) -> Table {
        let mut table = Table::new();
        for title in titles {
            table.push(&NewRecord::new(*title));
        }
        table
    }

    #[test]
    fn test_new_table_is_empty_canonical() {
        let table = Table::new();
        assert!(table.is_empty());
        assert_eq!(table.header()[0], "id");
        assert_eq!(table.header().len(), 12);
    }

    #[test]
    fn test_no_rows_means_canonical_header() {
        let table = Table::from_rows(Vec::new()).unwrap();
        assert_eq!(table, Table::new());
    }

    #[test]
    fn test_push_assigns_next_position() {
        let mut table = seeded(&["A", "B"]);
        let id = table.push(&NewRecord::new("C"));
        assert_eq!(id, 3);
        assert_eq!(table.record(2).title, "C");
        assert_eq!(table.record(2).id, 3);
    }

    #[test]
    fn test_push_writes_blank_cells() {
        let table = seeded(&["Ethics"]);
        let raw = &table.rows()[0];
        assert_eq!(raw.len(), 12);
        assert_eq!(raw[0], "1");
        assert_eq!(raw[1], "Ethics");
        assert!(raw[2..].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_remove_and_renumber() {
        let mut table = seeded(&["A", "B", "C", "D"]);
        table.remove(1);
        table.renumber();

        let ids: Vec<u32> = table.records().map(|r| r.id).collect();
        let titles: Vec<String> = table.records().map(|r| r.title).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(titles, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_integers_decode_from_cells() {
        let mut table = seeded(&["Ethics"]);
        table.set(0, Field::Row, &Value::Integer(3));
        table.set(0, Field::Column, &Value::Integer(4));
        table.set(0, Field::Year, &Value::Text("s.f.".into()));

        let record = table.record(0);
        assert_eq!(record.row, Some(3));
        assert_eq!(record.column, Some(4));
        assert_eq!(record.year, None);
        assert_eq!(table.cell(0, Field::Year), "s.f.");
    }

    #[test]
    fn test_custom_layout_with_extra_column() {
        let table = Table::from_rows(vec![
            row(&[
                "Título", "Notas", "id", "Autor", "Procedencia", "Categoria", "Editorial", "Ano",
                "Columna", "Fila", "ISBN", "F.revisión", "Comentarios",
            ]),
            row(&["Ethics", "keep me", "1", "Spinoza"]),
        ])
        .unwrap();

        let record = table.record(0);
        assert_eq!(record.id, 1);
        assert_eq!(record.title, "Ethics");
        assert_eq!(record.author, "Spinoza");
        assert_eq!(table.rows()[0][1], "keep me");
        assert_eq!(table.rows()[0].len(), 13);
    }

    #[test]
    fn test_non_numeric_id_falls_back_to_position() {
        let mut table = seeded(&["A", "B"]);
        table.rows[1][0] = "B000002".to_string();

        assert_eq!(table.id_at(1), 2);
        assert_eq!(table.position(2), Some(1));
    }

    #[test]
    fn test_hand_edited_id_wins_and_is_reported() {
        let table = Table::from_rows(vec![
            canonical_header(),
            row(&["1", "Ethics"]),
            row(&["7", "Timeo"]),
            row(&["", "Política"]),
        ])
        .unwrap();

        assert_eq!(table.id_at(1), 7);
        assert_eq!(table.position(7), Some(1));
        assert_eq!(table.position(2), None);
        assert_eq!(table.id_at(2), 3);
        assert_eq!(table.misnumbered(), vec![1]);

        assert!(seeded(&["A", "B"]).misnumbered().is_empty());
    }

    #[test]
    fn test_missing_columns_rejected() {
        let err = Table::from_rows(vec![row(&["id", "Título", "Autor"])]).unwrap_err();
        assert!(err.missing.contains(&Field::Isbn));
        assert!(!err.missing.contains(&Field::Title));
    }
}
