//! Error types for the MCP servers.
//!
//! Every failure a tool can hit is a [`ToolError`]. Handlers propagate it with
//! `?`; only the dispatcher turns it into the text of a failure response.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {message}")]
    Validation {
        message: String,
        /// Offending argument, when the problem is tied to one field
        field: Option<String>,
    },

    #[error("Database unavailable: {message}")]
    ResourceUnavailable { message: String },

    #[error("Error executing query: {cause}")]
    QueryFailed {
        cause: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Error executing command: {cause}")]
    CommandFailed {
        cause: String,
        sql_state: Option<String>,
    },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ToolError {
    /// Create a validation error that is not tied to a single argument.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific argument.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a validation error for a missing required argument.
    pub fn missing_argument(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Validation {
            message: format!("Missing required argument: {}", field),
            field: Some(field),
        }
    }

    /// Create a resource unavailable error.
    pub fn resource_unavailable(message: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            message: message.into(),
        }
    }

    /// Create a query failure from a driver error.
    pub fn query_failed(err: &sqlx::Error) -> Self {
        let (cause, sql_state) = describe_sqlx_error(err);
        Self::QueryFailed { cause, sql_state }
    }

    /// Create a command failure from a driver error.
    pub fn command_failed(err: &sqlx::Error) -> Self {
        let (cause, sql_state) = describe_sqlx_error(err);
        Self::CommandFailed { cause, sql_state }
    }

    /// Create a command failure with a plain cause (timeouts, subprocesses).
    pub fn command_failed_with(cause: impl Into<String>) -> Self {
        Self::CommandFailed {
            cause: cause.into(),
            sql_state: None,
        }
    }

    /// Create a query failure with a plain cause.
    pub fn query_failed_with(cause: impl Into<String>) -> Self {
        Self::QueryFailed {
            cause: cause.into(),
            sql_state: None,
        }
    }

    /// Create an unknown tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The SQLSTATE code reported by the driver, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::QueryFailed { sql_state, .. } | Self::CommandFailed { sql_state, .. } => {
                sql_state.as_deref()
            }
            _ => None,
        }
    }

    /// Check if the same call may succeed when repeated later.
    ///
    /// Only an unavailable pool qualifies: the next call re-attempts the
    /// connection. Driver errors are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceUnavailable { .. })
    }
}

/// Flatten a sqlx error into a human-readable cause and optional SQLSTATE.
fn describe_sqlx_error(err: &sqlx::Error) -> (String, Option<String>) {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            let message = match &code {
                Some(code) => format!("{} (SQLSTATE: {})", db_err.message(), code),
                None => db_err.message().to_string(),
            };
            (message, code)
        }
        sqlx::Error::RowNotFound => ("No rows returned".to_string(), None),
        sqlx::Error::ColumnNotFound(col) => (format!("Column not found: {}", col), None),
        sqlx::Error::ColumnDecode { index, source } => (
            format!("Failed to decode column {}: {}", index, source),
            None,
        ),
        sqlx::Error::Io(io_err) => (format!("I/O error: {}", io_err), None),
        sqlx::Error::Protocol(msg) => (format!("Protocol error: {}", msg), None),
        other => (other.to_string(), None),
    }
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_display() {
        let err = ToolError::unknown_tool("drop_everything");
        assert_eq!(err.to_string(), "Unknown tool: drop_everything");
    }

    #[test]
    fn test_missing_argument_display() {
        let err = ToolError::missing_argument("query");
        assert_eq!(
            err.to_string(),
            "Invalid arguments: Missing required argument: query"
        );
        assert!(matches!(
            err,
            ToolError::Validation { field: Some(ref f), .. } if f == "query"
        ));
    }

    #[test]
    fn test_query_failed_display() {
        let err = ToolError::query_failed(&sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "Error executing query: No rows returned");
        assert_eq!(err.sql_state(), None);
    }

    #[test]
    fn test_command_failed_display() {
        let err = ToolError::command_failed_with("Lint command failed: boom");
        assert_eq!(
            err.to_string(),
            "Error executing command: Lint command failed: boom"
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(ToolError::resource_unavailable("refused").is_retryable());
        assert!(!ToolError::query_failed_with("syntax").is_retryable());
        assert!(!ToolError::validation("bad").is_retryable());
        assert!(!ToolError::unknown_tool("x").is_retryable());
    }
}
