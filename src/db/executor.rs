//! Statement execution engine.
//!
//! [`StatementExecutor`] runs one statement per pooled connection:
//! - Read statements return their rows as JSON maps
//! - Write statements return a PostgreSQL-style command tag
//! - Every statement runs under a timeout
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `postgres`: PostgreSQL-specific fetch and execute
//! - `sqlite`: SQLite-specific fetch and execute
//!
//! Parameters are always bound as text. A statement without parameters goes
//! through the unprepared protocol, which allows multi-statement scripts.

use crate::db::pool::{Backend, PooledConnection, ResourcePool};
use crate::db::types::{Row, RowToJson};
use crate::error::{ToolError, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Executes read and write statements against the shared pool.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    pool: Arc<ResourcePool>,
    statement_timeout: Duration,
}

impl StatementExecutor {
    /// Create an executor using the pool's configured statement timeout.
    pub fn new(pool: Arc<ResourcePool>) -> Self {
        let statement_timeout = pool.settings().statement_timeout;
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    pub fn backend(&self) -> Option<Backend> {
        self.pool.backend()
    }

    /// Execute a read statement and return its rows.
    pub async fn execute_query(&self, statement: &str, params: &[String]) -> ToolResult<Vec<Row>> {
        self.ready().await?;

        let start = Instant::now();
        let limit = self.statement_timeout;
        let sql = statement.to_string();
        let params = params.to_vec();

        debug!(sql = %sql, params = params.len(), "Executing query");

        let rows = self
            .pool
            .with_connection(move |conn| {
                Box::pin(async move {
                    match conn {
                        PooledConnection::Postgres(c) => {
                            postgres::fetch_rows(c, &sql, &params, limit).await
                        }
                        PooledConnection::Sqlite(c) => {
                            sqlite::fetch_rows(c, &sql, &params, limit).await
                        }
                    }
                })
            })
            .await?;

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(rows)
    }

    /// Execute a write statement and return its command tag.
    pub async fn execute_command(&self, statement: &str, params: &[String]) -> ToolResult<String> {
        self.ready().await?;

        let start = Instant::now();
        let limit = self.statement_timeout;
        let sql = statement.to_string();
        let params = params.to_vec();

        debug!(sql = %sql, params = params.len(), "Executing command");

        let rows_affected = self
            .pool
            .with_connection({
                let sql = sql.clone();
                move |conn| {
                    Box::pin(async move {
                        match conn {
                            PooledConnection::Postgres(c) => {
                                postgres::execute(c, &sql, &params, limit).await
                            }
                            PooledConnection::Sqlite(c) => {
                                sqlite::execute(c, &sql, &params, limit).await
                            }
                        }
                    })
                }
            })
            .await?;

        let status = command_tag(&sql, rows_affected);
        debug!(
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Command completed"
        );
        Ok(status)
    }

    /// Server version string reported by the database.
    pub async fn driver_version(&self) -> ToolResult<String> {
        let sql = match self.backend() {
            Some(Backend::Sqlite) => "SELECT sqlite_version() AS version",
            _ => "SELECT version() AS version",
        };
        let rows = self.execute_query(sql, &[]).await?;
        rows.first()
            .and_then(|row| row.get("version"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ToolError::query_failed_with("server did not report a version"))
    }

    async fn ready(&self) -> ToolResult<()> {
        if self.pool.ensure_ready().await {
            Ok(())
        } else {
            Err(ToolError::resource_unavailable(format!(
                "could not connect to {} after {} attempt(s)",
                self.pool.settings().redacted_url(),
                self.pool.establish_attempts()
            )))
        }
    }
}

/// Keywords skipped when naming the object of a DDL statement.
const DDL_MODIFIERS: &[&str] = &["OR", "REPLACE", "UNIQUE", "TEMP", "TEMPORARY", "UNLOGGED"];

/// Build a PostgreSQL-style command tag such as `INSERT 0 1` or `CREATE TABLE`.
pub fn command_tag(sql: &str, rows_affected: u64) -> String {
    let mut words = sql
        .split_whitespace()
        .map(|w| w.trim_end_matches(';').to_ascii_uppercase())
        .filter(|w| !w.is_empty());

    let Some(verb) = words.next() else {
        return "EMPTY".to_string();
    };

    match verb.as_str() {
        "INSERT" => format!("INSERT 0 {}", rows_affected),
        "UPDATE" | "DELETE" | "SELECT" | "MERGE" | "COPY" => {
            format!("{} {}", verb, rows_affected)
        }
        _ if rows_affected > 0 => format!("{} {}", verb, rows_affected),
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => {
            match words.find(|w| !DDL_MODIFIERS.contains(&w.as_str())) {
                Some(object) if verb != "TRUNCATE" => format!("{} {}", verb, object),
                _ => verb,
            }
        }
        _ => verb,
    }
}

fn timed_out(limit: Duration) -> String {
    format!("statement timed out after {}s", limit.as_secs())
}

// =============================================================================
// PostgreSQL Implementation
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::PgConnection;

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        params: &[String],
        limit: Duration,
    ) -> ToolResult<Vec<Row>> {
        let fetch = async {
            if params.is_empty() {
                sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query.fetch_all(&mut *conn).await
            }
        };

        let rows = timeout(limit, fetch)
            .await
            .map_err(|_| ToolError::query_failed_with(timed_out(limit)))?
            .map_err(|e| ToolError::query_failed(&e))?;

        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    pub async fn execute(
        conn: &mut PgConnection,
        sql: &str,
        params: &[String],
        limit: Duration,
    ) -> ToolResult<u64> {
        let exec = async {
            if params.is_empty() {
                sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query.execute(&mut *conn).await
            }
        };

        let result = timeout(limit, exec)
            .await
            .map_err(|_| ToolError::command_failed_with(timed_out(limit)))?
            .map_err(|e| ToolError::command_failed(&e))?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// SQLite Implementation
// =============================================================================

mod sqlite {
    use super::*;
    use sqlx::SqliteConnection;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[String],
        limit: Duration,
    ) -> ToolResult<Vec<Row>> {
        let fetch = async {
            if params.is_empty() {
                sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query.fetch_all(&mut *conn).await
            }
        };

        let rows = timeout(limit, fetch)
            .await
            .map_err(|_| ToolError::query_failed_with(timed_out(limit)))?
            .map_err(|e| ToolError::query_failed(&e))?;

        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[String],
        limit: Duration,
    ) -> ToolResult<u64> {
        let exec = async {
            if params.is_empty() {
                sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query.execute(&mut *conn).await
            }
        };

        let result = timeout(limit, exec)
            .await
            .map_err(|_| ToolError::command_failed_with(timed_out(limit)))?
            .map_err(|e| ToolError::command_failed(&e))?;

        Ok(result.rows_affected())
    }
}
