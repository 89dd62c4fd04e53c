//! Read-only ad-hoc query endpoint (spec.md §6, §8 invariant 11). Exactly
//! one statement, inside a read-only transaction, with a statement
//! timeout, rejecting anything containing a terminator, capped row count.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Column, Row};

use crate::auth::ReadAuth;
use crate::state::ServerState;
use tr_core::{TrError, TrResult};

const STATEMENT_TIMEOUT_MS: i64 = 30_000;
const ROW_CAP: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub capped: bool,
}

/// Rejects a statement terminator outright — this is the single-statement
/// guard, since a genuine SQL parser is out of scope and a terminator is
/// the cheapest reliable signal of "more than one statement."
fn contains_terminator(sql: &str) -> bool {
    // A trailing terminator on an otherwise-single statement is harmless;
    // only an *embedded* one indicates statement stacking.
    sql.trim_end().trim_end_matches(';').contains(';')
}

/// Strips a single trailing terminator (and surrounding whitespace) that
/// `contains_terminator` already allows through, so it doesn't end up
/// embedded inside the `SELECT * FROM (...)` wrapper below.
fn strip_trailing_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

pub async fn run_query(State(state): State<ServerState>, _auth: ReadAuth, Json(req): Json<QueryRequest>) -> TrResult<Json<QueryResponse>> {
    if contains_terminator(&req.sql) {
        return Err(TrError::QueryRejected("statement terminator is not allowed".to_string()));
    }

    let mut tx = state
        .pool()
        .begin()
        .await
        .map_err(TrError::Storage)?;
    sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await.map_err(TrError::Storage)?;
    sqlx::query(&format!("SET LOCAL statement_timeout = {STATEMENT_TIMEOUT_MS}"))
        .execute(&mut *tx)
        .await
        .map_err(TrError::Storage)?;

    let capped_sql = format!("SELECT * FROM ({}) AS query_result LIMIT {}", strip_trailing_terminator(&req.sql), ROW_CAP + 1);
    let rows = sqlx::query(&capped_sql)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| TrError::QueryRejected(e.to_string()))?;

    // The transaction is read-only at the Postgres level, so any mutating
    // statement the caller snuck past the terminator check fails here
    // rather than committing.
    tx.rollback().await.map_err(TrError::Storage)?;

    let capped = rows.len() as i64 > ROW_CAP;
    let columns: Vec<String> = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let out_rows: Vec<Vec<Value>> = rows
        .iter()
        .take(ROW_CAP as usize)
        .map(|row| {
            (0..row.len())
                .map(|i| row.try_get::<Value, _>(i).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(Json(QueryResponse { columns, row_count: out_rows.len(), capped, rows: out_rows }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_embedded_terminator() {
        assert!(contains_terminator("SELECT 1; DROP TABLE calls"));
    }

    #[test]
    fn allows_a_single_trailing_terminator() {
        assert!(!contains_terminator("SELECT 1;"));
    }

    #[test]
    fn allows_a_statement_with_no_terminator() {
        assert!(!contains_terminator("SELECT * FROM calls LIMIT 10"));
    }

    #[test]
    fn strip_trailing_terminator_removes_a_single_trailing_semicolon_and_whitespace() {
        assert_eq!(strip_trailing_terminator("SELECT 1;  \n"), "SELECT 1");
    }

    #[test]
    fn strip_trailing_terminator_is_a_no_op_without_one() {
        assert_eq!(strip_trailing_terminator("SELECT * FROM calls LIMIT 10"), "SELECT * FROM calls LIMIT 10");
    }
}
