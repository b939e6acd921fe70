use anyhow::{Result, anyhow, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use chatsync_realtime::{CollectionQuery, FilterOp};
use chatsync_types::ChangeKind;

use crate::MemoryStore;
use crate::models::{DocumentPath, StoreChange, collection_path};

impl MemoryStore {
    // -- Documents --

    pub fn get_document(&self, path: &str) -> Result<Option<Value>> {
        let path = DocumentPath::parse(path)?;
        self.with_conn(|conn| query_document(conn, &path))
    }

    /// Create or overwrite the document at `path`. Returns whether it was
    /// added or modified.
    pub fn set_document(&self, path: &str, data: Value) -> Result<ChangeKind> {
        let path = DocumentPath::parse(path)?;
        if !data.is_object() {
            bail!("Document at '{}/{}' must be a JSON object", path.collection, path.id);
        }
        let text = serde_json::to_string(&data)?;

        // Publish under the connection lock so listeners see changes in
        // commit order
        self.with_conn(|conn| {
            let existed = query_document(conn, &path)?.is_some();
            conn.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id)
                 DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
                rusqlite::params![path.collection, path.id, text],
            )?;
            let kind = if existed { ChangeKind::Modified } else { ChangeKind::Added };
            self.publish(StoreChange {
                collection: path.collection.clone(),
                id: path.id.clone(),
                kind,
                data,
            });
            Ok(kind)
        })
    }

    /// Delete the document at `path`. Returns false if there was none.
    pub fn delete_document(&self, path: &str) -> Result<bool> {
        let path = DocumentPath::parse(path)?;

        self.with_conn(|conn| {
            let Some(data) = query_document(conn, &path)? else {
                return Ok(false);
            };
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![path.collection, path.id],
            )?;
            self.publish(StoreChange {
                collection: path.collection.clone(),
                id: path.id.clone(),
                kind: ChangeKind::Removed,
                data,
            });
            Ok(true)
        })
    }

    /// Append `data` under a generated id. Returns `(id, data)`.
    pub fn add_document(&self, collection: &str, data: Value) -> Result<(String, Value)> {
        let collection = collection_path(collection)?;
        let id = Uuid::new_v4().to_string();
        self.set_document(&DocumentPath::join(&collection, &id), data.clone())?;
        Ok((id, data))
    }

    /// Append a chat message, filling in `key` and a store-assigned,
    /// strictly increasing `createdAt` when they are missing.
    pub fn append_message(&self, collection: &str, message: Value) -> Result<Value> {
        let collection = collection_path(collection)?;
        let mut fields: Map<String, Value> = match message {
            Value::Object(fields) => fields,
            _ => bail!("Message must be a JSON object"),
        };

        let key = match fields.get("key").and_then(Value::as_str) {
            Some(key) => key.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        fields.insert("key".into(), Value::String(key.clone()));
        if !fields.contains_key("createdAt") {
            fields.insert("createdAt".into(), Value::from(self.next_timestamp()));
        }

        let message = Value::Object(fields);
        self.set_document(&DocumentPath::join(&collection, &key), message.clone())?;
        Ok(message)
    }

    // -- Queries --

    pub fn query(&self, query: &CollectionQuery) -> Result<Vec<Value>> {
        let (sql, params) = build_select(query)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            debug!("{} -> {} document(s)", query.path, rows.len());
            rows.iter()
                .map(|text| serde_json::from_str::<Value>(text).map_err(anyhow::Error::from))
                .collect()
        })
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        let collection = collection_path(collection)?;
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [&collection],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }
}

fn query_document(conn: &Connection, path: &DocumentPath) -> Result<Option<Value>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            rusqlite::params![path.collection, path.id],
            |row| row.get(0),
        )
        .optional()?;

    text.map(|t| serde_json::from_str::<Value>(&t).map_err(anyhow::Error::from))
        .transpose()
}

/// Translate a collection query into SQL over the `documents` table.
///
/// Fields are read with `json_extract`, so only plain dotted field names
/// are accepted. Ties on the order fields fall back to insertion order.
pub(crate) fn build_select(query: &CollectionQuery) -> Result<(String, Vec<SqlValue>)> {
    let collection = collection_path(&query.path)?;
    let mut sql = String::from("SELECT data FROM documents WHERE collection = ?1");
    let mut params = vec![SqlValue::Text(collection)];

    for filter in &query.filters {
        let field = json_field(&filter.field)?;
        params.push(sql_value(&filter.value)?);
        let n = params.len();
        match filter.op {
            FilterOp::Equal => {
                sql.push_str(&format!(" AND json_extract(data, '{}') = ?{}", field, n));
            }
            FilterOp::ArrayContains => {
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM json_each(data, '{}') WHERE json_each.value = ?{})",
                    field, n
                ));
            }
        }
    }

    match query.order_by.first() {
        Some(first) => {
            let field = json_field(&first.field)?;
            // Cursors are read in the direction of the ordering
            let (start_op, end_op) = if first.desc { ("<=", ">=") } else { (">=", "<=") };
            for (cursor, op) in [(&query.start_at, start_op), (&query.end_at, end_op)] {
                if let Some(cursor) = cursor {
                    params.push(sql_value(cursor)?);
                    sql.push_str(&format!(
                        " AND json_extract(data, '{}') {} ?{}",
                        field,
                        op,
                        params.len()
                    ));
                }
            }
        }
        None if query.start_at.is_some() || query.end_at.is_some() => {
            bail!("Cursor on '{}' requires an order_by field", query.path);
        }
        None => {}
    }

    let mut order: Vec<String> = Vec::with_capacity(query.order_by.len() + 1);
    for o in &query.order_by {
        order.push(format!(
            "json_extract(data, '{}') {}",
            json_field(&o.field)?,
            if o.desc { "DESC" } else { "ASC" }
        ));
    }
    let tie_break = match query.order_by.first() {
        Some(first) if first.desc => "seq DESC",
        _ => "seq ASC",
    };
    order.push(tie_break.to_string());
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    if let Some(limit) = query.limit {
        params.push(SqlValue::Integer(i64::from(limit)));
        sql.push_str(&format!(" LIMIT ?{}", params.len()));
    }

    Ok((sql, params))
}

fn json_field(field: &str) -> Result<String> {
    let valid = !field.is_empty()
        && field
            .split('.')
            .all(|part| {
                !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            });
    if !valid {
        bail!("Unsupported field name '{}'", field);
    }
    Ok(format!("$.{}", field))
}

fn sql_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => {
                SqlValue::Real(n.as_f64().ok_or_else(|| anyhow!("Unsupported number {}", n))?)
            }
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => {
            bail!("Only scalar values can be compared, got {}", value)
        }
    })
}
