//! SQL statement validation for read-only enforcement.
//!
//! `query_database` only runs read statements (SELECT, VALUES, SHOW, EXPLAIN
//! of a read). Anything that can change data or schema is rejected with a
//! message that points the caller at `execute_command`.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) so formatting tricks or
//! comments cannot smuggle a write past the check.

use crate::db::Backend;
use crate::error::{ToolError, ToolResult};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Coarse classification of a parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, VALUES, SHOW and EXPLAIN of a read
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    Write,
    /// CREATE, ALTER, DROP, TRUNCATE
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK
    Transaction,
    /// Everything else (GRANT, SET, VACUUM, CALL, ...)
    Other,
}

impl StatementKind {
    fn rejection(self) -> &'static str {
        match self {
            StatementKind::Read => "",
            StatementKind::Write => {
                "query_database is read-only. Use execute_command for INSERT/UPDATE/DELETE."
            }
            StatementKind::Ddl => {
                "query_database is read-only. Use execute_command for schema changes."
            }
            StatementKind::Transaction => {
                "Transaction control is not available. Each statement runs on its own connection."
            }
            StatementKind::Other => {
                "query_database only accepts read statements. Use execute_command for anything else."
            }
        }
    }
}

fn dialect_for(backend: Backend) -> Box<dyn Dialect> {
    match backend {
        Backend::Postgres => Box::new(PostgreSqlDialect {}),
        Backend::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Validate that `sql` only contains read statements.
///
/// ```
/// use ops_mcp_server::db::Backend;
/// use ops_mcp_server::tools::sql_validator::validate_readonly;
///
/// assert!(validate_readonly("SELECT * FROM users", Backend::Postgres).is_ok());
/// assert!(validate_readonly("DELETE FROM users", Backend::Postgres).is_err());
/// ```
pub fn validate_readonly(sql: &str, backend: Backend) -> ToolResult<()> {
    let dialect = dialect_for(backend);

    let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        ToolError::invalid_field("query", format!("Failed to parse SQL statement: {}", e))
    })?;

    if statements.is_empty() {
        return Err(ToolError::invalid_field("query", "Empty SQL statement"));
    }

    for stmt in &statements {
        let kind = classify(stmt);
        if kind != StatementKind::Read {
            return Err(ToolError::invalid_field("query", kind.rejection()));
        }
    }

    Ok(())
}

/// Classify a parsed statement.
pub fn classify(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query(query) => classify_query(query),

        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowVariable { .. } => StatementKind::Read,

        // EXPLAIN ANALYZE executes its statement, so the inner kind decides
        Statement::Explain { statement, .. } => classify(statement),

        Statement::Insert { .. }
        | Statement::Update { .. }
        | Statement::Delete { .. }
        | Statement::Merge { .. }
        | Statement::Copy { .. } => StatementKind::Write,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::AlterTable { .. }
        | Statement::Drop { .. }
        | Statement::Truncate { .. } => StatementKind::Ddl,

        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. } => StatementKind::Transaction,

        _ => StatementKind::Other,
    }
}

/// Classify a query by everything it runs, not just its outer SELECT.
///
/// PostgreSQL allows INSERT/UPDATE/DELETE inside `WITH`, and `SELECT ... INTO`
/// creates a table.
fn classify_query(query: &Query) -> StatementKind {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| &with.cte_tables)
        .map(|cte| classify_query(&cte.query));

    ctes.chain(std::iter::once(classify_set_expr(&query.body)))
        .find(|kind| *kind != StatementKind::Read)
        .unwrap_or(StatementKind::Read)
}

fn classify_set_expr(expr: &SetExpr) -> StatementKind {
    match expr {
        SetExpr::Select(select) if select.into.is_some() => StatementKind::Ddl,
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => StatementKind::Read,
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => match classify_set_expr(left) {
            StatementKind::Read => classify_set_expr(right),
            kind => kind,
        },
        SetExpr::Insert(_) | SetExpr::Update(_) | SetExpr::Delete(_) | SetExpr::Merge(_) => {
            StatementKind::Write
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PG: Backend = Backend::Postgres;

    #[test]
    fn test_select_ok() {
        assert!(validate_readonly("SELECT * FROM users", PG).is_ok());
        assert!(validate_readonly("select count(*) from coupons;", PG).is_ok());
    }

    #[test]
    fn test_complex_select_with_subquery() {
        let sql = r#"
            SELECT u.name, (SELECT COUNT(*) FROM redemptions WHERE user_id = u.id) AS redeemed
            FROM users u
            WHERE u.id IN (SELECT user_id FROM raffle_entries)
        "#;
        assert!(validate_readonly(sql, PG).is_ok());
    }

    #[test]
    fn test_explain_select_ok() {
        assert!(validate_readonly("EXPLAIN SELECT * FROM users", PG).is_ok());
    }

    #[test]
    fn test_insert_rejected_mentions_execute_command() {
        let err = validate_readonly("INSERT INTO users VALUES (1)", PG).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid arguments:"), "{}", msg);
        assert!(msg.contains("execute_command"), "{}", msg);
    }

    #[test]
    fn test_ddl_rejected() {
        assert!(validate_readonly("CREATE TABLE t (id INT)", PG).is_err());
        assert!(validate_readonly("DROP TABLE users", PG).is_err());
    }

    #[test]
    fn test_multiple_statements_with_write_rejected() {
        let sql = "SELECT 1; UPDATE users SET name = 'x'";
        assert!(validate_readonly(sql, PG).is_err());
    }

    #[test]
    fn test_insert_select_rejected() {
        let sql = "INSERT INTO archive SELECT * FROM users";
        assert!(validate_readonly(sql, PG).is_err());
    }

    #[test]
    fn test_data_modifying_cte_rejected() {
        let sql = "WITH d AS (DELETE FROM users RETURNING *) SELECT * FROM d";
        let err = validate_readonly(sql, PG).unwrap_err();
        assert!(err.to_string().contains("execute_command"), "{}", err);

        let sql = "WITH moved AS (UPDATE coupons SET used = true RETURNING id) \
                   SELECT count(*) FROM moved";
        assert!(validate_readonly(sql, PG).is_err());
    }

    #[test]
    fn test_read_only_cte_ok() {
        let sql = "WITH weekly AS (SELECT user_id FROM raffle_entries WHERE raffle_type = 'weekly') \
                   SELECT count(*) FROM weekly UNION ALL SELECT count(*) FROM users";
        assert!(validate_readonly(sql, PG).is_ok());
    }

    #[test]
    fn test_select_into_rejected() {
        let err = validate_readonly("SELECT * INTO stolen FROM users", PG).unwrap_err();
        assert!(err.to_string().contains("schema changes"), "{}", err);
    }

    #[test]
    fn test_transaction_control_rejected() {
        assert!(validate_readonly("COMMIT", PG).is_err());
    }

    #[test]
    fn test_unparseable_and_empty_rejected() {
        assert!(validate_readonly("SELEC oops", PG).is_err());
        assert!(validate_readonly("", PG).is_err());
    }

    #[test]
    fn test_sqlite_dialect() {
        assert!(validate_readonly("SELECT name FROM sqlite_master", Backend::Sqlite).is_ok());
        assert!(validate_readonly("DELETE FROM users", Backend::Sqlite).is_err());
    }
}
