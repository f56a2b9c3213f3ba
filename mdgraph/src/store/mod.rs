//! In-memory document store for content items.
//!
//! Documents are JSON objects kept in an in-memory SQLite database, one row
//! per document with an insertion sequence. Queries are [`StoreQuery`] trees
//! rendered to SQL over `json_each`/`json_extract`, with every field path and
//! value bound as a parameter.

use crate::error::{MdGraphError, Result};
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Internal identifier assigned on insert.
pub const INTERNAL_ID: &str = "_id";

/// Fields removed from every query result.
pub const PROJECTED_OUT: &[&str] = &[INTERNAL_ID, "markdown", "assetDir", "images"];

// ── Queries ─────────────────────────────────────────────────────

/// A filter over stored documents.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreQuery {
    /// Every document.
    All,
    /// `field == value`. A list-valued field matches when any element does.
    /// A null value matches documents where the field is null or missing.
    Eq { field: String, value: Value },
    /// `field` equals one of `values`.
    In { field: String, values: Vec<Value> },
    And(Vec<StoreQuery>),
    Or(Vec<StoreQuery>),
}

impl StoreQuery {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        StoreQuery::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        StoreQuery::In {
            field: field.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// `1` for ascending, `-1` for descending.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Sort, skip and limit for [`ContentStore::find`]. Ties in the sort are
/// broken by insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<SortKey>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

static FIELD_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Whether `name` is usable as a field name (a GraphQL name).
pub fn is_field_name(name: &str) -> bool {
    FIELD_NAME_REGEX
        .get_or_init(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").unwrap())
        .is_match(name)
}

fn json_path(field: &str) -> Result<String> {
    if is_field_name(field) {
        Ok(format!("$.\"{field}\""))
    } else {
        Err(MdGraphError::invalid_query(field, "not a valid field name"))
    }
}

/// Render `query` as a SQL condition over the `data` column, pushing its
/// parameters in order.
fn render_condition(query: &StoreQuery, params: &mut Vec<SqlValue>) -> Result<String> {
    match query {
        StoreQuery::All => Ok("1".to_string()),
        StoreQuery::Eq { field, value } => {
            let path = json_path(field)?;
            render_eq(path, value, params)
        }
        StoreQuery::In { field, values } => {
            if values.is_empty() {
                return Ok("0".to_string());
            }
            let path = json_path(field)?;
            let parts = values
                .iter()
                .map(|value| render_eq(path.clone(), value, params))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }
        StoreQuery::And(queries) => render_junction(queries, " AND ", "1", params),
        StoreQuery::Or(queries) => render_junction(queries, " OR ", "0", params),
    }
}

fn render_junction(
    queries: &[StoreQuery],
    separator: &str,
    empty: &str,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    if queries.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = queries
        .iter()
        .map(|q| render_condition(q, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", parts.join(separator)))
}

fn render_eq(path: String, value: &Value, params: &mut Vec<SqlValue>) -> Result<String> {
    const MATCH: &str = "EXISTS (SELECT 1 FROM json_each(documents.data, ?) AS e WHERE ";
    match value {
        Value::Null => {
            params.push(SqlValue::Text(path.clone()));
            params.push(SqlValue::Text(path));
            Ok("(json_type(documents.data, ?) IS NULL OR json_type(documents.data, ?) = 'null')"
                .to_string())
        }
        Value::Bool(b) => {
            params.push(SqlValue::Text(path));
            let ty = if *b { "true" } else { "false" };
            Ok(format!("{MATCH}e.type = '{ty}')"))
        }
        Value::Number(n) => {
            params.push(SqlValue::Text(path));
            if let Some(i) = n.as_i64() {
                params.push(SqlValue::Integer(i));
            } else {
                params.push(SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)));
            }
            Ok(format!("{MATCH}e.type IN ('integer', 'real') AND e.value = ?)"))
        }
        Value::String(s) => {
            params.push(SqlValue::Text(path));
            params.push(SqlValue::Text(s.clone()));
            Ok(format!("{MATCH}e.type = 'text' AND e.value = ?)"))
        }
        Value::Array(_) | Value::Object(_) => Err(MdGraphError::invalid_query(
            "value",
            "only scalar values can be matched",
        )),
    }
}

/// Drop the fields listed in [`PROJECTED_OUT`].
pub fn project(mut document: Value) -> Value {
    if let Value::Object(map) = &mut document {
        for field in PROJECTED_OUT {
            map.shift_remove(*field);
        }
    }
    document
}

// ── Store ───────────────────────────────────────────────────────

/// A handle to one in-memory store. Handles are independent of each other.
pub struct ContentStore {
    conn: Mutex<Connection>,
}

impl ContentStore {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY,
                data TEXT NOT NULL
            );
            ",
        )?;
        Ok(ContentStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MdGraphError::Other("content store lock poisoned".into()))
    }

    /// Insert documents in one transaction. Returns them as stored, with their
    /// internal id.
    pub fn insert(&self, documents: &[Value]) -> Result<Vec<Value>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut seq: i64 =
            tx.query_row("SELECT COALESCE(MAX(seq), 0) FROM documents", [], |row| {
                row.get(0)
            })?;

        let mut inserted = Vec::with_capacity(documents.len());
        for document in documents {
            let Value::Object(map) = document else {
                return Err(MdGraphError::Other(format!(
                    "only objects can be stored, got {document}"
                )));
            };
            seq += 1;
            let mut map = map.clone();
            map.insert(INTERNAL_ID.to_string(), Value::String(format!("{seq:016x}")));
            let stored = Value::Object(map);
            tx.execute(
                "INSERT INTO documents (seq, data) VALUES (?1, ?2)",
                params![seq, serde_json::to_string(&stored)?],
            )?;
            inserted.push(stored);
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Documents matching `query`, projected.
    pub fn find(&self, query: &StoreQuery, options: &FindOptions) -> Result<Vec<Value>> {
        let mut params = Vec::new();
        let condition = render_condition(query, &mut params)?;
        let mut sql = format!("SELECT data FROM documents WHERE {condition} ORDER BY ");
        if let Some(sort) = &options.sort {
            params.push(SqlValue::Text(json_path(&sort.field)?));
            sql.push_str(&format!("json_extract(data, ?) {}, ", sort.order.sql()));
        }
        sql.push_str("seq ASC LIMIT ? OFFSET ?");
        params.push(SqlValue::Integer(
            options.limit.map(|l| l as i64).unwrap_or(-1),
        ));
        params.push(SqlValue::Integer(options.skip.unwrap_or(0) as i64));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            row.get::<_, String>(0)
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let document: Value = serde_json::from_str(&row?)?;
            documents.push(project(document));
        }
        Ok(documents)
    }

    /// The first document, in insertion order, matching `query`, projected.
    pub fn find_one(&self, query: &StoreQuery) -> Result<Option<Value>> {
        let mut params = Vec::new();
        let condition = render_condition(query, &mut params)?;
        let sql = format!("SELECT data FROM documents WHERE {condition} ORDER BY seq ASC LIMIT 1");

        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
            .optional()?;
        match data {
            Some(data) => Ok(Some(project(serde_json::from_str(&data)?))),
            None => Ok(None),
        }
    }

    /// Number of stored documents.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
