//! Database toolset: ad-hoc statements, introspection and business metrics.

use crate::db::{Backend, Row, StatementExecutor};
use crate::error::{ToolError, ToolResult};
use crate::tools::dispatch::{ToolOutput, Toolset};
use crate::tools::metrics::{self, BUSINESS_METRICS, DateRange};
use crate::tools::registry::{ToolDescriptor, ToolRegistry};
use crate::tools::schema::{ArgumentSchema, FieldSpec, FieldType, ValidatedArgs};
use crate::tools::sql_validator::validate_readonly;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::info;

pub const QUERY_DATABASE: &str = "query_database";
pub const EXECUTE_COMMAND: &str = "execute_command";
pub const LIST_TABLES: &str = "list_tables";
pub const DESCRIBE_TABLE: &str = "describe_table";
pub const GET_BUSINESS_METRICS: &str = "get_business_metrics";

static CATALOGUE: LazyLock<ToolRegistry> = LazyLock::new(|| {
    ToolRegistry::new(vec![
        ToolDescriptor::new(
            QUERY_DATABASE,
            "Execute SELECT queries on the Gasolinera JSM database",
            ArgumentSchema::new(vec![
                FieldSpec::required("query", FieldType::String, "SQL SELECT query to execute"),
                FieldSpec::optional(
                    "params",
                    FieldType::StringArray,
                    "Query parameters (optional)",
                ),
            ]),
        ),
        ToolDescriptor::new(
            EXECUTE_COMMAND,
            "Execute INSERT, UPDATE, DELETE commands on the database",
            ArgumentSchema::new(vec![
                FieldSpec::required("query", FieldType::String, "SQL command to execute"),
                FieldSpec::optional(
                    "params",
                    FieldType::StringArray,
                    "Query parameters (optional)",
                ),
            ]),
        ),
        ToolDescriptor::new(
            LIST_TABLES,
            "List all tables in the database",
            ArgumentSchema::empty(),
        ),
        ToolDescriptor::new(
            DESCRIBE_TABLE,
            "Get schema information for a specific table",
            ArgumentSchema::new(vec![FieldSpec::required(
                "table_name",
                FieldType::String,
                "Name of the table to describe",
            )]),
        ),
        ToolDescriptor::new(
            GET_BUSINESS_METRICS,
            "Get key business metrics for the gamification platform",
            ArgumentSchema::new(vec![
                FieldSpec::optional(
                    "date_from",
                    FieldType::String,
                    "Start date (YYYY-MM-DD format, optional)",
                ),
                FieldSpec::optional(
                    "date_to",
                    FieldType::String,
                    "End date (YYYY-MM-DD format, optional)",
                ),
            ]),
        ),
    ])
});

// =============================================================================
// Typed inputs
// =============================================================================

/// Input of `query_database` and `execute_command`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementArgs {
    pub query: String,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeTableArgs {
    pub table_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsArgs {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// A validated call to one of the database tools.
#[derive(Debug, Clone)]
pub enum DatabaseCall {
    Query(StatementArgs),
    Command(StatementArgs),
    ListTables,
    DescribeTable(DescribeTableArgs),
    BusinessMetrics(MetricsArgs),
}

impl DatabaseCall {
    pub fn parse(tool: &str, args: ValidatedArgs) -> ToolResult<Self> {
        match tool {
            QUERY_DATABASE => args.into_typed().map(Self::Query),
            EXECUTE_COMMAND => args.into_typed().map(Self::Command),
            LIST_TABLES => Ok(Self::ListTables),
            DESCRIBE_TABLE => args.into_typed().map(Self::DescribeTable),
            GET_BUSINESS_METRICS => args.into_typed().map(Self::BusinessMetrics),
            other => Err(ToolError::unknown_tool(other)),
        }
    }
}

// =============================================================================
// Introspection statements
// =============================================================================

mod introspection {
    pub mod postgres {
        // information_schema columns are domains; cast them to plain types
        pub const LIST_TABLES: &str = "SELECT table_name::text AS table_name, \
             table_type::text AS table_type \
             FROM information_schema.tables \
             WHERE table_schema = 'public' \
             ORDER BY table_name";

        pub const DESCRIBE_TABLE: &str = "SELECT column_name::text AS column_name, \
             data_type::text AS data_type, \
             is_nullable::text AS is_nullable, \
             column_default::text AS column_default, \
             character_maximum_length::integer AS character_maximum_length \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position";
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = "SELECT name AS table_name, \
             CASE type WHEN 'view' THEN 'VIEW' ELSE 'BASE TABLE' END AS table_type \
             FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name";

        pub const DESCRIBE_TABLE: &str = "SELECT name AS column_name, type AS data_type, \
             CASE \"notnull\" WHEN 0 THEN 'YES' ELSE 'NO' END AS is_nullable, \
             dflt_value AS column_default, NULL AS character_maximum_length \
             FROM pragma_table_info(?1) \
             ORDER BY cid";
    }
}

// =============================================================================
// Toolset
// =============================================================================

/// Tools backed by the shared statement executor.
#[derive(Debug, Clone)]
pub struct DatabaseToolset {
    executor: Arc<StatementExecutor>,
}

impl DatabaseToolset {
    pub fn new(executor: Arc<StatementExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<StatementExecutor> {
        &self.executor
    }

    pub async fn query(&self, args: StatementArgs) -> ToolResult<ToolOutput> {
        if let Some(backend) = self.executor.backend() {
            validate_readonly(&args.query, backend)?;
        }
        let rows = self.executor.execute_query(&args.query, &args.params).await?;
        Ok(rows_output(rows))
    }

    pub async fn command(&self, args: StatementArgs) -> ToolResult<ToolOutput> {
        let status = self
            .executor
            .execute_command(&args.query, &args.params)
            .await?;
        Ok(ToolOutput::text(format!(
            "Command executed successfully: {}",
            status
        )))
    }

    pub async fn list_tables(&self) -> ToolResult<ToolOutput> {
        let sql = match self.executor.backend() {
            Some(Backend::Sqlite) => introspection::sqlite::LIST_TABLES,
            _ => introspection::postgres::LIST_TABLES,
        };
        let rows = self.executor.execute_query(sql, &[]).await?;
        Ok(rows_output(rows))
    }

    pub async fn describe_table(&self, args: DescribeTableArgs) -> ToolResult<ToolOutput> {
        let sql = match self.executor.backend() {
            Some(Backend::Sqlite) => introspection::sqlite::DESCRIBE_TABLE,
            _ => introspection::postgres::DESCRIBE_TABLE,
        };
        let rows = self
            .executor
            .execute_query(sql, &[args.table_name])
            .await?;
        Ok(rows_output(rows))
    }

    pub async fn business_metrics(&self, args: MetricsArgs) -> ToolResult<ToolOutput> {
        let range = DateRange::new(args.date_from, args.date_to);
        info!(date_from = ?range.from, date_to = ?range.to, "Collecting business metrics");

        let report = metrics::collect(&self.executor, BUSINESS_METRICS).await;
        let value = serde_json::to_value(&report)
            .map_err(|e| ToolError::internal(format!("failed to serialize metrics: {}", e)))?;
        Ok(ToolOutput::json(value))
    }
}

fn rows_output(rows: Vec<Row>) -> ToolOutput {
    ToolOutput::json(Value::Array(rows.into_iter().map(Value::Object).collect()))
}

impl Toolset for DatabaseToolset {
    fn server_name(&self) -> &'static str {
        "gasolinera-postgres"
    }

    fn title(&self) -> Option<&'static str> {
        Some("Gasolinera JSM Postgres")
    }

    fn instructions(&self) -> &'static str {
        "Database tools for the Gasolinera JSM gamification platform. \
         Use list_tables and describe_table to explore the schema, query_database for \
         read-only SELECT statements, execute_command for INSERT/UPDATE/DELETE and DDL, \
         and get_business_metrics for platform-wide counts. Statement parameters are \
         positional ($1, $2, ...) and passed as strings."
    }

    fn registry(&self) -> &ToolRegistry {
        &CATALOGUE
    }

    async fn invoke(&self, tool: &str, args: ValidatedArgs) -> ToolResult<ToolOutput> {
        match DatabaseCall::parse(tool, args)? {
            DatabaseCall::Query(args) => self.query(args).await,
            DatabaseCall::Command(args) => self.command(args).await,
            DatabaseCall::ListTables => self.list_tables().await,
            DatabaseCall::DescribeTable(args) => self.describe_table(args).await,
            DatabaseCall::BusinessMetrics(args) => self.business_metrics(args).await,
        }
    }
}
