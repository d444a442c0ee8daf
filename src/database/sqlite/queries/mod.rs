
use super::models::*;
use anyhow::{Context, Result};
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Either, Executor, Row, SqlitePool, Statement, TypeInfo, ValueRef};
use std::ffi::CString;
use tracing::debug;

pub struct PassageQueries;

impl PassageQueries {
    /// Insert the passage row and its index entry in one transaction
    #[inline]
    pub async fn create(pool: &SqlitePool, content: &str, embedding: &[f32]) -> Result<i64> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin passage transaction")?;

        let id = sqlx::query("INSERT INTO passages (content) VALUES (?)")
            .bind(content)
            .execute(&mut *tx)
            .await
            .context("Failed to insert passage")?
            .last_insert_rowid();

        sqlx::query("INSERT INTO passage_index (rowid, embedding) VALUES (?, ?)")
            .bind(id)
            .bind(encode_embedding(embedding))
            .execute(&mut *tx)
            .await
            .context("Failed to insert passage embedding")?;

        tx.commit()
            .await
            .context("Failed to commit passage transaction")?;

        debug!("Inserted passage {} ({} chars)", id, content.len());
        Ok(id)
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<StoredPassage>> {
        let row = sqlx::query_as::<_, PassageRow>(
            r#"
            SELECT p.id,
                   p.content,
                   i.embedding,
                   p.created_date
            FROM passages AS p
            JOIN passage_index AS i ON i.rowid = p.id
            WHERE p.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get passage by id")?;

        Ok(row.map(PassageRow::into_passage))
    }

    /// Most recently inserted passages first
    #[inline]
    pub async fn list_recent(pool: &SqlitePool, limit: u32) -> Result<Vec<StoredPassage>> {
        let rows = sqlx::query_as::<_, PassageRow>(
            r#"
            SELECT p.id,
                   p.content,
                   i.embedding,
                   p.created_date
            FROM passages AS p
            JOIN passage_index AS i ON i.rowid = p.id
            ORDER BY p.id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .context("Failed to list passages")?;

        Ok(rows.into_iter().map(PassageRow::into_passage).collect())
    }

    /// Passages that have an index entry, matching what `get_by_id` and `list_recent` return
    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM passages AS p
            JOIN passage_index AS i ON i.rowid = p.id
            "#,
        )
        .fetch_one(pool)
        .await
        .context("Failed to count passages")?;
        Ok(count)
    }

    /// K nearest passages to `embedding`, closest first
    #[inline]
    pub async fn nearest(
        pool: &SqlitePool,
        embedding: &[f32],
        limit: u32,
    ) -> Result<Vec<PassageMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let matches = sqlx::query_as::<_, PassageMatch>(
            r#"
            SELECT p.id,
                   p.content,
                   knn.distance
            FROM (
                SELECT rowid, distance
                FROM passage_index
                WHERE embedding MATCH ?
                ORDER BY distance
                LIMIT ?
            ) AS knn
            JOIN passages AS p ON p.id = knn.rowid
            ORDER BY knn.distance ASC, p.id ASC
            "#,
        )
        .bind(encode_embedding(embedding))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .context("Failed to query nearest passages")?;

        debug!("Nearest-neighbour query returned {} passages", matches.len());
        Ok(matches)
    }
}

pub struct ConsoleQueries;

impl ConsoleQueries {
    /// Run arbitrary SQL text, returning one result set per statement
    ///
    /// Statements run in order on a single connection. Column names come from the
    /// prepared statement, so a query that matches nothing still reports them, and
    /// `rows_affected` is only filled in for statements without result columns.
    #[inline]
    pub async fn execute(pool: &SqlitePool, sql: &str) -> Result<Vec<StatementResult>> {
        let mut conn = pool
            .acquire()
            .await
            .context("Failed to acquire a connection for SQL execution")?;
        let mut results = Vec::new();

        for statement in split_statements(sql)? {
            let prepared = (&mut *conn)
                .prepare(statement)
                .await
                .context("SQL execution failed")?;
            let mut result = StatementResult {
                columns: prepared
                    .columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect(),
                ..StatementResult::default()
            };

            // Comment-only or empty pieces produce no completion marker
            let mut completed = false;
            let mut stream = sqlx::raw_sql(statement).fetch_many(&mut *conn);
            while let Some(step) = stream.try_next().await.context("SQL execution failed")? {
                match step {
                    Either::Left(done) => {
                        completed = true;
                        if result.columns.is_empty() {
                            result.rows_affected = done.rows_affected();
                        }
                    }
                    Either::Right(row) => result.rows.push(row_values(&row)?),
                }
            }

            if completed || !result.columns.is_empty() {
                results.push(result);
            }
        }

        debug!("Executed SQL batch with {} statement(s)", results.len());
        Ok(results)
    }
}

/// Split SQL text at the semicolons sqlite itself considers statement ends
///
/// A semicolon inside a literal, a comment or a trigger body does not end a statement.
/// Trailing text without a semicolon is returned as the last piece.
pub(crate) fn split_statements(sql: &str) -> Result<Vec<&str>> {
    let mut statements = Vec::new();
    let mut start = 0;

    for (offset, _) in sql.match_indices(';') {
        let end = offset + 1;
        let candidate = &sql[start..end];
        let text = CString::new(candidate).context("SQL text contains a NUL byte")?;
        // SAFETY: `text` is NUL-terminated and outlives the call.
        if unsafe { libsqlite3_sys::sqlite3_complete(text.as_ptr()) } != 0 {
            statements.push(candidate);
            start = end;
        }
    }

    let rest = &sql[start..];
    if !rest.trim().is_empty() {
        statements.push(rest);
    }
    Ok(statements)
}

fn row_values(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    (0..row.len())
        .map(|index| {
            let raw: SqliteValueRef<'_> = row
                .try_get_raw(index)
                .with_context(|| format!("Failed to read column {index}"))?;
            if raw.is_null() {
                return Ok(SqlValue::Null);
            }

            let type_name = raw.type_info().name().to_string();
            let value = match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get_unchecked(index)?),
                "REAL" => SqlValue::Real(row.try_get_unchecked(index)?),
                "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
                _ => SqlValue::Text(row.try_get_unchecked(index)?),
            };
            Ok(value)
        })
        .collect()
}
