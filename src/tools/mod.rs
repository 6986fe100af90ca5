//! MCP tool implementations.
//!
//! - `schema`: declarative argument schemas and validation
//! - `registry`: static tool catalogues
//! - `dispatch`: request routing and response normalization
//! - `database`: query, command, introspection and metrics tools
//! - `metrics`: business-metrics fan-out
//! - `devops`: build/lint/test/log/codegen command wrappers
//! - `sql_validator`: read-only enforcement for `query_database`

pub mod database;
pub mod devops;
pub mod dispatch;
pub mod metrics;
pub mod registry;
pub mod schema;
pub mod sql_validator;

pub use database::{DatabaseCall, DatabaseToolset};
pub use devops::{DevopsCall, DevopsToolset};
pub use dispatch::{ContentBlock, Dispatcher, Request, Response, ToolOutput, Toolset};
pub use metrics::{MetricValue, MetricsReport};
pub use registry::{ToolDescriptor, ToolRegistry};
pub use schema::{ArgumentSchema, FieldSpec, FieldType, JsonObject, ValidatedArgs};
