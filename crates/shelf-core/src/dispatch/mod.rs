//! Intent dispatch
//!
//! Maps structured intents from the upstream translator onto store and
//! resolver calls. This is the only layer that knows the translator's field
//! names; everything below it works with [`Field`](crate::models::Field).
//!
//! ## Usage
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(CatalogStore::open(&config)?);
//! let response = dispatcher.respond_json(r#"{"op":"last","n":5}"#);
//! ```

mod error;
mod intent;
mod normalize;
mod response;

pub use error::{DispatchError, ErrorKind};
pub use intent::{Intent, Position, OPS};
pub use normalize::{
    changes_from, criteria_from, normalize_add, review_value, today_stamp, AddShape,
    REVIEWED_TODAY,
};
pub use response::Response;

use chrono::{Local, NaiveDate};
use serde_json::{Map, Value as Json};
use tracing::{debug, info, warn};

use crate::models::{Criteria, Record};
use crate::resolver::{Reference, ReferenceResolver};
use crate::store::CatalogStore;

/// Result cap for `find` and for a `get` that degrades to a list
pub const FIND_LIMIT: usize = 20;

/// Records returned by `last` when the intent gives no count
pub const DEFAULT_LAST: usize = 10;

/// Carries out intents against one catalog store
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: CatalogStore,
}

impl Dispatcher {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Parse and carry out one intent, never failing
    pub fn respond_json(&self, text: &str) -> Response {
        match Intent::parse(text) {
            Ok(intent) => self.respond(intent),
            Err(e) => {
                warn!("Rejected intent: {}", e);
                e.into()
            }
        }
    }

    /// Carry out an intent, turning any failure into `Response::Failed`
    pub fn respond(&self, intent: Intent) -> Response {
        let op = intent.op();
        match self.dispatch(intent) {
            Ok(response) => response,
            Err(e) => {
                warn!("{} failed: {}", op, e);
                e.into()
            }
        }
    }

    /// Carry out an intent, stamping reviews with the local date
    pub fn dispatch(&self, intent: Intent) -> Result<Response, DispatchError> {
        self.dispatch_on(intent, Local::now().date_naive())
    }

    /// Carry out an intent, stamping reviews with `today`
    pub fn dispatch_on(&self, intent: Intent, today: NaiveDate) -> Result<Response, DispatchError> {
        debug!("Dispatching {}", intent.op());

        match intent {
            Intent::Add(payload) => self.add(&payload),
            Intent::Get { id, reference } => self.get(id.as_ref(), reference.as_ref()),
            Intent::Find { query, limit } => self.find(&query, limit.as_ref()),
            Intent::Last { n } => self.last(n.as_ref()),
            Intent::SetPosition {
                reference,
                pos,
                fila,
                columna,
            } => {
                let pos = pos.unwrap_or(Position { fila, columna });
                self.set_position(reference.as_ref(), &pos)
            }
            Intent::SetIsbn { reference, isbn } => self.set_isbn(reference.as_ref(), isbn.as_ref()),
            Intent::Update { reference, changes } => {
                self.update(reference.as_ref(), changes.as_ref(), today)
            }
            Intent::Delete { reference } => self.delete(reference.as_ref()),
            Intent::Chat { message } => Ok(Response::Chat { message }),
        }
    }

    fn add(&self, payload: &Map<String, Json>) -> Result<Response, DispatchError> {
        let draft = normalize_add(payload)?;
        let id = self.store.add(&draft)?;
        let record = match self.store.get_by_id(id)? {
            Some(record) => record,
            None => draft.into_record(id),
        };
        Ok(Response::Added { record })
    }

    fn get(&self, id: Option<&Json>, reference: Option<&Reference>) -> Result<Response, DispatchError> {
        if let Some(text) = id.and_then(normalize::scalar_text).filter(|t| !t.is_empty()) {
            let id = text
                .parse::<u32>()
                .map_err(|_| DispatchError::not_found(format!("'{}' is not a record id", text)))?;
            return self.fetch(id).map(|record| Response::Record { record });
        }

        let reference =
            reference.ok_or_else(|| DispatchError::validation("get needs an id or a reference"))?;
        let kind = reference.kind()?;

        if kind.is_descriptive() {
            let value = reference
                .value_text()
                .ok_or_else(|| DispatchError::not_found("the reference has no value"))?;
            let mut records = self
                .store
                .find(&Criteria::new().with(kind.field(), &value), FIND_LIMIT)?;
            return match records.len() {
                0 => Err(DispatchError::not_found(format!(
                    "no record with {} matching '{}'",
                    kind, value
                ))),
                1 => Ok(Response::Record {
                    record: records.remove(0),
                }),
                _ => Ok(Response::List { records }),
            };
        }

        let id = self.resolve(reference)?;
        self.fetch(id).map(|record| Response::Record { record })
    }

    fn find(&self, query: &Map<String, Json>, limit: Option<&Json>) -> Result<Response, DispatchError> {
        let criteria = criteria_from(query);
        let records = self.store.find(&criteria, count(limit, FIND_LIMIT)?)?;
        Ok(Response::List { records })
    }

    fn last(&self, n: Option<&Json>) -> Result<Response, DispatchError> {
        let records = self.store.last(count(n, DEFAULT_LAST)?)?;
        Ok(Response::List { records })
    }

    fn set_position(&self, reference: Option<&Reference>, pos: &Position) -> Result<Response, DispatchError> {
        let reference = required(reference)?;
        let (Some(fila), Some(columna)) = (
            pos.fila.as_ref().filter(|v| !v.is_null()),
            pos.columna.as_ref().filter(|v| !v.is_null()),
        ) else {
            return Err(DispatchError::validation(
                "both a row and a column are needed to place a record",
            ));
        };
        let row = placement(fila, "row")?;
        let column = placement(columna, "column")?;

        let id = self.resolve(reference)?;
        if !self.store.set_position(id, row, column)? {
            return Err(missing(id));
        }
        self.refreshed(id)
    }

    fn set_isbn(&self, reference: Option<&Reference>, isbn: Option<&Json>) -> Result<Response, DispatchError> {
        let reference = required(reference)?;
        let isbn = isbn
            .and_then(normalize::scalar_text)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DispatchError::validation("the ISBN is empty"))?;

        let id = self.resolve(reference)?;
        if !self.store.set_isbn(id, &isbn)? {
            return Err(missing(id));
        }
        self.refreshed(id)
    }

    fn update(
        &self,
        reference: Option<&Reference>,
        changes: Option<&Map<String, Json>>,
        today: NaiveDate,
    ) -> Result<Response, DispatchError> {
        let reference = required(reference)?;
        let changes = match changes {
            Some(map) if !map.is_empty() => changes_from(map, today)?,
            _ => return Err(DispatchError::validation("there are no changes to apply")),
        };

        let id = self.resolve(reference)?;
        if !self.store.update_fields(id, &changes)? {
            return Err(missing(id));
        }
        self.refreshed(id)
    }

    fn delete(&self, reference: Option<&Reference>) -> Result<Response, DispatchError> {
        let reference = required(reference)?;
        let id = self.resolve(reference)?;
        if !self.store.delete_and_compact(id)? {
            return Err(missing(id));
        }
        info!("Dispatcher deleted record {}", id);
        Ok(Response::Deleted { id })
    }

    fn resolve(&self, reference: &Reference) -> Result<u32, DispatchError> {
        Ok(ReferenceResolver::new(&self.store).resolve(reference)?)
    }

    fn fetch(&self, id: u32) -> Result<Record, DispatchError> {
        self.store.get_by_id(id)?.ok_or_else(|| missing(id))
    }

    fn refreshed(&self, id: u32) -> Result<Response, DispatchError> {
        self.fetch(id).map(|record| Response::Updated { record })
    }
}

fn required(reference: Option<&Reference>) -> Result<&Reference, DispatchError> {
    reference.ok_or_else(|| DispatchError::validation("which record? give an id or a reference"))
}

fn missing(id: u32) -> DispatchError {
    DispatchError::not_found(format!("no record with id {}", id))
}

/// A result count, `default` when absent; the store clamps it
fn count(raw: Option<&Json>, default: usize) -> Result<usize, DispatchError> {
    match raw {
        None | Some(Json::Null) => Ok(default),
        Some(raw) => {
            let n = normalize::integer_of(raw)
                .ok_or_else(|| DispatchError::validation(format!("'{}' is not a count", raw)))?;
            Ok(usize::try_from(n.max(1)).unwrap_or(default))
        }
    }
}

fn placement(raw: &Json, what: &str) -> Result<u32, DispatchError> {
    normalize::integer_of(raw)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| DispatchError::validation(format!("'{}' is not a valid {}", raw, what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRecord;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(temp_dir: &TempDir) -> Dispatcher {
        let store =
            CatalogStore::with_path(temp_dir.path().join("Catalogo.csv"), Duration::from_secs(5));
        Dispatcher::new(store)
    }

    fn seed(dispatcher: &Dispatcher, books: &[(&str, &str)]) {
        for (title, author) in books {
            let mut draft = NewRecord::new(*title);
            draft.author = author.to_string();
            dispatcher.store().add(&draft).unwrap();
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()
    }

    fn run(dispatcher: &Dispatcher, intent: Json) -> Result<Response, DispatchError> {
        dispatcher.dispatch_on(Intent::from_value(intent)?, today())
    }

    fn ids(records: &[Record]) -> Vec<u32> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_add_each_shape() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);

        let payloads = [
            json!({"op": "add", "book": {"titulo": "Ethics", "fila": 2}}),
            json!({"op": "add", "data": {"titulo": "Timeo"}}),
            json!({"op": "add", "data": {"Título": "Fedón", "Año": "1871"}}),
            json!({"op": "add", "titulo": "Critón", "autor": "Platón"}),
        ];

        for (i, payload) in payloads.into_iter().enumerate() {
            match run(&dispatcher, payload).unwrap() {
                Response::Added { record } => assert_eq!(record.id, i as u32 + 1),
                other => panic!("expected added, got {:?}", other),
            }
        }

        let all = dispatcher.store().all().unwrap();
        assert_eq!(all[0].row, Some(2));
        assert_eq!(all[2].year, Some(1871));
        assert_eq!(all[3].author, "Platón");
    }

    #[test]
    fn test_add_without_title_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);

        let err = run(&dispatcher, json!({"op": "add", "book": {"autor": "Spinoza"}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!dispatcher.store().path().exists());
    }

    #[test]
    fn test_get_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza")]);

        match run(&dispatcher, json!({"op": "get", "id": "1"})).unwrap() {
            Response::Record { record } => assert_eq!(record.title, "Ethics"),
            other => panic!("expected record, got {:?}", other),
        }

        let err = run(&dispatcher, json!({"op": "get", "id": 7})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = run(&dispatcher, json!({"op": "get"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_get_degrades_to_list() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(
            &dispatcher,
            &[("Ethics", "Spinoza"), ("Ethics", "Aristotle"), ("Timeo", "Platón")],
        );

        match run(&dispatcher, json!({"op": "get", "ref": {"type": "titulo", "value": "ethics"}}))
            .unwrap()
        {
            Response::List { records } => assert_eq!(ids(&records), vec![1, 2]),
            other => panic!("expected list, got {:?}", other),
        }

        match run(&dispatcher, json!({"op": "get", "ref": {"type": "autor", "value": "plat"}}))
            .unwrap()
        {
            Response::Record { record } => assert_eq!(record.id, 3),
            other => panic!("expected record, got {:?}", other),
        }

        let err = run(&dispatcher, json!({"op": "get", "ref": {"type": "autor", "value": "Kant"}}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_get_by_duplicated_isbn_is_ambiguous() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        for title in ["Ethics", "Ethica"] {
            let mut draft = NewRecord::new(title);
            draft.isbn = "978".into();
            dispatcher.store().add(&draft).unwrap();
        }

        let err = run(&dispatcher, json!({"op": "get", "ref": {"type": "isbn", "value": "978"}}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
        assert_eq!(ids(err.candidates()), vec![1, 2]);
    }

    #[test]
    fn test_find_and_last() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(
            &dispatcher,
            &[("República", "Platón"), ("Política", "Aristóteles"), ("Timeo", "Platón")],
        );

        match run(&dispatcher, json!({"op": "find", "query": {"autor": "plat"}})).unwrap() {
            Response::List { records } => assert_eq!(ids(&records), vec![1, 3]),
            other => panic!("expected list, got {:?}", other),
        }

        match run(&dispatcher, json!({"op": "find", "query": {"autor": "plat"}, "limit": 1})).unwrap() {
            Response::List { records } => assert_eq!(ids(&records), vec![1]),
            other => panic!("expected list, got {:?}", other),
        }

        match run(&dispatcher, json!({"op": "find", "query": {}})).unwrap() {
            Response::List { records } => assert!(records.is_empty()),
            other => panic!("expected list, got {:?}", other),
        }

        match run(&dispatcher, json!({"op": "last", "n": "2"})).unwrap() {
            Response::List { records } => assert_eq!(ids(&records), vec![2, 3]),
            other => panic!("expected list, got {:?}", other),
        }

        match run(&dispatcher, json!({"op": "last", "n": -4})).unwrap() {
            Response::List { records } => assert_eq!(ids(&records), vec![3]),
            other => panic!("expected list, got {:?}", other),
        }

        match run(&dispatcher, json!({"op": "last"})).unwrap() {
            Response::List { records } => assert_eq!(records.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }

        let err = run(&dispatcher, json!({"op": "last", "n": "muchos"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_set_position() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza"), ("Timeo", "Platón")]);

        let response = run(
            &dispatcher,
            json!({"op": "set_pos", "ref": {"type": "titulo", "value": "timeo"}, "pos": {"fila": 3, "columna": "4"}}),
        )
        .unwrap();
        match response {
            Response::Updated { record } => {
                assert_eq!(record.id, 2);
                assert_eq!(record.row, Some(3));
                assert_eq!(record.column, Some(4));
            }
            other => panic!("expected updated, got {:?}", other),
        }

        // Root-level placement
        run(
            &dispatcher,
            json!({"op": "set_position", "ref": {"type": "id", "value": "1"}, "fila": 1, "columna": 2}),
        )
        .unwrap();
        let first = dispatcher.store().get_by_id(1).unwrap().unwrap();
        assert_eq!((first.row, first.column), (Some(1), Some(2)));
    }

    #[test]
    fn test_set_position_needs_both_values() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza")]);

        let err = run(
            &dispatcher,
            json!({"op": "set_pos", "ref": {"type": "id", "value": "1"}, "pos": {"fila": 3}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = run(
            &dispatcher,
            json!({"op": "set_pos", "ref": {"type": "id", "value": "9"}, "fila": 1, "columna": 1}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_set_isbn() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza")]);

        let err = run(
            &dispatcher,
            json!({"op": "set_isbn", "ref": {"type": "id", "value": "1"}, "isbn": "  "}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        match run(
            &dispatcher,
            json!({"op": "set_isbn", "ref": {"type": "autor", "value": "spinoza"}, "isbn": " 978-0140435719 "}),
        )
        .unwrap()
        {
            Response::Updated { record } => assert_eq!(record.isbn, "978-0140435719"),
            other => panic!("expected updated, got {:?}", other),
        }
    }

    #[test]
    fn test_update_review_date() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza")]);

        let reviewed = run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "id", "value": "1"}, "changes": {"f_revision": "revisado", "comentarios": "tapa dura"}}),
        )
        .unwrap();
        match reviewed {
            Response::Updated { record } => {
                assert_eq!(record.last_reviewed.as_deref(), Some("07/05/2024"));
                assert_eq!(record.comments, "tapa dura");
            }
            other => panic!("expected updated, got {:?}", other),
        }

        run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "id", "value": "1"}, "changes": {"f_revision": "EMPTY"}}),
        )
        .unwrap();
        let record = dispatcher.store().get_by_id(1).unwrap().unwrap();
        assert!(record.last_reviewed.is_none());
    }

    #[test]
    fn test_update_rejections_leave_table_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza"), ("Ethics", "Aristotle")]);
        let before = std::fs::read(dispatcher.store().path()).unwrap();

        let err = run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "titulo", "value": "Ethics"}, "changes": {"fila": 1}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
        assert_eq!(err.candidates().len(), 2);

        let err = run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "id", "value": "1"}, "changes": {}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "id", "value": "1"}, "changes": {"ano": "s.f."}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "estante", "value": "B"}, "changes": {"fila": 1}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(std::fs::read(dispatcher.store().path()).unwrap(), before);
    }

    #[test]
    fn test_update_rejects_integers_the_record_cannot_hold() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(&dispatcher, &[("Ethics", "Spinoza")]);
        let before = std::fs::read(dispatcher.store().path()).unwrap();

        let err = run(
            &dispatcher,
            json!({"op": "update", "ref": {"type": "id", "value": "1"},
                   "changes": {"fila": -3, "ano": "9999999999"}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(std::fs::read(dispatcher.store().path()).unwrap(), before);

        let record = dispatcher.store().get_by_id(1).unwrap().unwrap();
        assert_eq!(record.row, None);
        assert_eq!(record.year, None);
    }

    #[test]
    fn test_delete_renumbers() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);
        seed(
            &dispatcher,
            &[("Ethics", "Spinoza"), ("Timeo", "Platón"), ("Política", "Aristóteles")],
        );

        let response = run(
            &dispatcher,
            json!({"op": "delete", "ref": {"type": "titulo", "value": "timeo"}}),
        )
        .unwrap();
        assert_eq!(response, Response::Deleted { id: 2 });

        let all = dispatcher.store().all().unwrap();
        assert_eq!(ids(&all), vec![1, 2]);
        assert_eq!(all[1].title, "Política");

        let err = run(&dispatcher, json!({"op": "delete", "ref": {"type": "id", "value": "3"}}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_respond_never_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = setup(&temp_dir);

        assert_eq!(
            dispatcher.respond_json(r#"{"op":"chat","message":"¿Qué tal?"}"#),
            Response::Chat {
                message: "¿Qué tal?".into()
            }
        );

        for text in [
            "{",
            r#"{"op":"export"}"#,
            r#"{"op":"delete"}"#,
            r#"{"op":"add","data":{"nombre":"x"}}"#,
        ] {
            match dispatcher.respond_json(text) {
                Response::Failed { kind, .. } => assert_eq!(kind, ErrorKind::Validation, "{}", text),
                other => panic!("expected failure for {}, got {:?}", text, other),
            }
        }
    }
}
