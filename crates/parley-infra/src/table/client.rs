//! Generic key/value client over the single `records` table.
//!
//! Mirrors a document-store contract: `put`, `get`, `query` (main key or
//! one of four secondary indexes, with opaque continuation tokens), and
//! `update` with an optional row-exists precondition. Callers own retry
//! policy; this layer performs none.
//!
//! Records may carry an `expires_at` epoch; expired rows are filtered at
//! read time rather than deleted eagerly.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;

use parley_types::error::TableError;

use super::pool::DatabasePool;

/// One secondary-index key pair on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub partition: String,
    pub sort: String,
}

/// A full record: canonical key pair, entity kind tag, JSON body, and up
/// to four secondary-index projections.
#[derive(Debug, Clone)]
pub struct TableRecord {
    pub pk: String,
    pub sk: String,
    pub kind: String,
    pub body: Value,
    pub gsi1: Option<IndexKey>,
    pub gsi2: Option<IndexKey>,
    pub gsi3: Option<IndexKey>,
    pub gsi4: Option<IndexKey>,
    /// Unix epoch after which the record is invisible to reads.
    pub expires_at: Option<i64>,
}

impl TableRecord {
    pub fn new(
        pk: impl Into<String>,
        sk: impl Into<String>,
        kind: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            kind: kind.into(),
            body,
            gsi1: None,
            gsi2: None,
            gsi3: None,
            gsi4: None,
            expires_at: None,
        }
    }

    pub fn with_gsi1(mut self, partition: impl Into<String>, sort: impl Into<String>) -> Self {
        self.gsi1 = Some(IndexKey {
            partition: partition.into(),
            sort: sort.into(),
        });
        self
    }

    pub fn with_gsi2(mut self, partition: impl Into<String>, sort: impl Into<String>) -> Self {
        self.gsi2 = Some(IndexKey {
            partition: partition.into(),
            sort: sort.into(),
        });
        self
    }

    pub fn with_gsi3(mut self, partition: impl Into<String>, sort: impl Into<String>) -> Self {
        self.gsi3 = Some(IndexKey {
            partition: partition.into(),
            sort: sort.into(),
        });
        self
    }

    pub fn with_gsi4(mut self, partition: impl Into<String>, sort: impl Into<String>) -> Self {
        self.gsi4 = Some(IndexKey {
            partition: partition.into(),
            sort: sort.into(),
        });
        self
    }

    pub fn with_expires_at(mut self, epoch: i64) -> Self {
        self.expires_at = Some(epoch);
        self
    }
}

/// Which key pair a query ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableIndex {
    Gsi1,
    Gsi2,
    Gsi3,
    Gsi4,
}

impl TableIndex {
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            TableIndex::Gsi1 => ("gsi1pk", "gsi1sk"),
            TableIndex::Gsi2 => ("gsi2pk", "gsi2sk"),
            TableIndex::Gsi3 => ("gsi3pk", "gsi3sk"),
            TableIndex::Gsi4 => ("gsi4pk", "gsi4sk"),
        }
    }
}

/// A range query over one partition of the main key or an index.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// `None` queries the main (pk, sk) key.
    pub index: Option<TableIndex>,
    pub partition: String,
    /// Restrict to sort keys starting with this prefix.
    pub sort_prefix: Option<String>,
    /// Ascending sort order when true.
    pub forward: bool,
    pub limit: i64,
    /// Continuation token from a previous page.
    pub cursor: Option<String>,
}

/// One page of query results.
#[derive(Debug)]
pub struct QueryPage {
    pub records: Vec<TableRecord>,
    pub next_cursor: Option<String>,
}

/// A mutation carried by `update`: body field edits or a whole-body
/// replace, plus index key column reassignments. All parts apply in one
/// statement, which is what keeps status changes and index relocation
/// atomic.
#[derive(Debug, Clone, Default)]
pub struct UpdatePatch {
    set_body_fields: Vec<(String, Value)>,
    replace_body: Option<Value>,
    set_index_keys: Vec<(IndexColumn, String)>,
}

impl UpdatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole JSON body (used for embedded-document rewrites
    /// that must avoid partial-path update hazards).
    pub fn replace_body(body: Value) -> Self {
        Self {
            replace_body: Some(body),
            ..Self::default()
        }
    }

    /// Set one top-level field of the JSON body.
    pub fn set_field(mut self, field: &str, value: Value) -> Self {
        debug_assert!(
            !field.contains('\'') && !field.contains('.'),
            "field names are plain identifiers"
        );
        self.set_body_fields.push((field.to_string(), value));
        self
    }

    /// Reassign one index key column.
    pub fn set_index(mut self, column: IndexColumn, value: impl Into<String>) -> Self {
        self.set_index_keys.push((column, value.into()));
        self
    }

    fn is_empty(&self) -> bool {
        self.set_body_fields.is_empty()
            && self.replace_body.is_none()
            && self.set_index_keys.is_empty()
    }
}

/// Addressable index key columns for `UpdatePatch::set_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexColumn {
    Gsi1Pk,
    Gsi1Sk,
    Gsi2Pk,
    Gsi2Sk,
    Gsi3Pk,
    Gsi3Sk,
    Gsi4Pk,
    Gsi4Sk,
}

impl IndexColumn {
    fn column(self) -> &'static str {
        match self {
            IndexColumn::Gsi1Pk => "gsi1pk",
            IndexColumn::Gsi1Sk => "gsi1sk",
            IndexColumn::Gsi2Pk => "gsi2pk",
            IndexColumn::Gsi2Sk => "gsi2sk",
            IndexColumn::Gsi3Pk => "gsi3pk",
            IndexColumn::Gsi3Sk => "gsi3sk",
            IndexColumn::Gsi4Pk => "gsi4pk",
            IndexColumn::Gsi4Sk => "gsi4sk",
        }
    }
}

/// Optimistic precondition for `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The row must already exist; otherwise `PreconditionFailed`.
    RowExists,
    /// No existence check; updating a missing row is a no-op.
    Unconditional,
}

/// Client for the shared single table.
#[derive(Clone)]
pub struct TableClient {
    pool: DatabasePool,
}

impl TableClient {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Unconditional upsert of a full record (canonical row and all index
    /// key columns in one statement).
    pub async fn put(&self, record: &TableRecord) -> Result<(), TableError> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO records
               (pk, sk, kind, body, gsi1pk, gsi1sk, gsi2pk, gsi2sk, gsi3pk, gsi3sk, gsi4pk, gsi4sk, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.pk)
        .bind(&record.sk)
        .bind(&record.kind)
        .bind(record.body.to_string())
        .bind(record.gsi1.as_ref().map(|k| k.partition.as_str()))
        .bind(record.gsi1.as_ref().map(|k| k.sort.as_str()))
        .bind(record.gsi2.as_ref().map(|k| k.partition.as_str()))
        .bind(record.gsi2.as_ref().map(|k| k.sort.as_str()))
        .bind(record.gsi3.as_ref().map(|k| k.partition.as_str()))
        .bind(record.gsi3.as_ref().map(|k| k.sort.as_str()))
        .bind(record.gsi4.as_ref().map(|k| k.partition.as_str()))
        .bind(record.gsi4.as_ref().map(|k| k.sort.as_str()))
        .bind(record.expires_at)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| TableError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Point lookup by the canonical key pair. Expired rows read as
    /// absent.
    pub async fn get(&self, pk: &str, sk: &str) -> Result<Option<TableRecord>, TableError> {
        let row = sqlx::query(
            r#"SELECT * FROM records
               WHERE pk = ? AND sk = ? AND (expires_at IS NULL OR expires_at > ?)"#,
        )
        .bind(pk)
        .bind(sk)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| TableError::Backend(e.to_string()))?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    /// Lexicographic range scan over one partition.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryPage, TableError> {
        let (pk_col, sk_col) = match request.index {
            Some(index) => index.columns(),
            None => ("pk", "sk"),
        };

        let after = request
            .cursor
            .as_deref()
            .map(decode_cursor)
            .transpose()?;

        let mut sql = format!(
            "SELECT * FROM records WHERE {pk_col} = ? AND (expires_at IS NULL OR expires_at > ?)"
        );
        if request.sort_prefix.is_some() {
            sql.push_str(&format!(" AND {sk_col} LIKE ? ESCAPE '\\'"));
        }
        if after.is_some() {
            let op = if request.forward { ">" } else { "<" };
            sql.push_str(&format!(" AND {sk_col} {op} ?"));
        }
        let dir = if request.forward { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY {sk_col} {dir} LIMIT ?"));

        let mut query = sqlx::query(&sql)
            .bind(&request.partition)
            .bind(Utc::now().timestamp());
        if let Some(prefix) = &request.sort_prefix {
            query = query.bind(format!("{}%", escape_like(prefix)));
        }
        if let Some(after) = &after {
            query = query.bind(after);
        }
        query = query.bind(request.limit);

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| TableError::Backend(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }

        let next_cursor = if records.len() == request.limit as usize {
            records
                .last()
                .and_then(|record| sort_value(record, request.index))
                .map(encode_cursor)
        } else {
            None
        };

        Ok(QueryPage {
            records,
            next_cursor,
        })
    }

    /// Apply a patch to one record in a single statement.
    ///
    /// With `Precondition::RowExists`, a missing row surfaces as
    /// `TableError::PreconditionFailed`.
    pub async fn update(
        &self,
        pk: &str,
        sk: &str,
        patch: UpdatePatch,
        precondition: Precondition,
    ) -> Result<(), TableError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut sets: Vec<String> = Vec::new();
        if patch.replace_body.is_some() {
            sets.push("body = ?".to_string());
        } else if !patch.set_body_fields.is_empty() {
            let paths: Vec<String> = patch
                .set_body_fields
                .iter()
                .map(|(field, _)| format!("'$.{field}', json(?)"))
                .collect();
            sets.push(format!("body = json_set(body, {})", paths.join(", ")));
        }
        for (column, _) in &patch.set_index_keys {
            sets.push(format!("{} = ?", column.column()));
        }

        let sql = format!(
            "UPDATE records SET {} WHERE pk = ? AND sk = ?",
            sets.join(", ")
        );

        let mut query = sqlx::query(&sql);
        if let Some(body) = &patch.replace_body {
            query = query.bind(body.to_string());
        } else {
            for (_, value) in &patch.set_body_fields {
                query = query.bind(value.to_string());
            }
        }
        for (_, value) in &patch.set_index_keys {
            query = query.bind(value);
        }
        query = query.bind(pk).bind(sk);

        let result = query
            .execute(&self.pool.writer)
            .await
            .map_err(|e| TableError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 && precondition == Precondition::RowExists {
            return Err(TableError::PreconditionFailed);
        }

        Ok(())
    }
}

impl std::fmt::Debug for TableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableClient").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TableRecord, TableError> {
    fn get<'a, T: sqlx::Decode<'a, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>>(
        row: &'a sqlx::sqlite::SqliteRow,
        column: &str,
    ) -> Result<T, TableError> {
        row.try_get(column)
            .map_err(|e| TableError::Backend(e.to_string()))
    }

    fn index_key(
        row: &sqlx::sqlite::SqliteRow,
        pk_col: &str,
        sk_col: &str,
    ) -> Result<Option<IndexKey>, TableError> {
        let partition: Option<String> = get(row, pk_col)?;
        let sort: Option<String> = get(row, sk_col)?;
        Ok(match (partition, sort) {
            (Some(partition), Some(sort)) => Some(IndexKey { partition, sort }),
            _ => None,
        })
    }

    let body_text: String = get(row, "body")?;
    let body: Value =
        serde_json::from_str(&body_text).map_err(|e| TableError::Backend(e.to_string()))?;

    Ok(TableRecord {
        pk: get(row, "pk")?,
        sk: get(row, "sk")?,
        kind: get(row, "kind")?,
        body,
        gsi1: index_key(row, "gsi1pk", "gsi1sk")?,
        gsi2: index_key(row, "gsi2pk", "gsi2sk")?,
        gsi3: index_key(row, "gsi3pk", "gsi3sk")?,
        gsi4: index_key(row, "gsi4pk", "gsi4sk")?,
        expires_at: get(row, "expires_at")?,
    })
}

/// Sort key of a record under the queried index (canonical sk otherwise).
fn sort_value(record: &TableRecord, index: Option<TableIndex>) -> Option<String> {
    match index {
        None => Some(record.sk.clone()),
        Some(TableIndex::Gsi1) => record.gsi1.as_ref().map(|k| k.sort.clone()),
        Some(TableIndex::Gsi2) => record.gsi2.as_ref().map(|k| k.sort.clone()),
        Some(TableIndex::Gsi3) => record.gsi3.as_ref().map(|k| k.sort.clone()),
        Some(TableIndex::Gsi4) => record.gsi4.as_ref().map(|k| k.sort.clone()),
    }
}

fn encode_cursor(sort: String) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::json!({ "s": sort }).to_string())
}

fn decode_cursor(token: &str) -> Result<String, TableError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| TableError::BadCursor)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|_| TableError::BadCursor)?;
    value["s"]
        .as_str()
        .map(str::to_string)
        .ok_or(TableError::BadCursor)
}

fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
