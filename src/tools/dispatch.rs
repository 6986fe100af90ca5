//! Request dispatch.
//!
//! The [`Dispatcher`] turns a `(tool name, argument map)` pair into exactly one
//! [`Response`]: it looks the tool up, validates the arguments against the
//! tool's schema, runs the handler, and folds every error (panics included)
//! into a `Failure`.

use crate::error::{ToolError, ToolResult};
use crate::tools::registry::ToolRegistry;
use crate::tools::schema::{JsonObject, ValidatedArgs};
use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Inbound tool invocation.
#[derive(Debug, Clone)]
pub struct Request {
    pub tool_name: String,
    pub arguments: JsonObject,
}

impl Request {
    pub fn new(tool_name: impl Into<String>, arguments: JsonObject) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Json(Value),
}

impl ContentBlock {
    /// Wire text of this block. JSON is pretty-printed.
    pub fn render(&self) -> String {
        match self {
            ContentBlock::Text(text) => text.clone(),
            ContentBlock::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Content produced by a successful handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            content: vec![ContentBlock::Json(value)],
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success { content: Vec<ContentBlock> },
    Failure { message: String },
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// First content block of a success, if any.
    pub fn first_block(&self) -> Option<&ContentBlock> {
        match self {
            Response::Success { content } => content.first(),
            Response::Failure { .. } => None,
        }
    }

    /// Failure message, if this is a failure.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Response::Failure { message } => Some(message),
            Response::Success { .. } => None,
        }
    }
}

/// A registry plus the handlers bound to its tool names.
pub trait Toolset: Send + Sync + 'static {
    /// Server name reported to clients.
    fn server_name(&self) -> &'static str;

    /// Human-readable server title.
    fn title(&self) -> Option<&'static str> {
        None
    }

    /// Usage instructions reported to clients.
    fn instructions(&self) -> &'static str;

    fn registry(&self) -> &ToolRegistry;

    /// Run the handler bound to `tool` with already-validated arguments.
    fn invoke(
        &self,
        tool: &str,
        args: ValidatedArgs,
    ) -> impl Future<Output = ToolResult<ToolOutput>> + Send;
}

/// Routes requests to a toolset and normalizes the outcome.
pub struct Dispatcher<T: Toolset> {
    toolset: Arc<T>,
}

impl<T: Toolset> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            toolset: Arc::clone(&self.toolset),
        }
    }
}

impl<T: Toolset> Dispatcher<T> {
    pub fn new(toolset: Arc<T>) -> Self {
        Self { toolset }
    }

    pub fn toolset(&self) -> &T {
        &self.toolset
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.toolset.registry()
    }

    /// Dispatch one request. Never fails: errors become `Response::Failure`.
    pub async fn dispatch(&self, request: Request) -> Response {
        let request_id = uuid::Uuid::new_v4();
        let start = Instant::now();
        let tool = request.tool_name.clone();

        let outcome = self.run(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                info!(tool = %tool, request_id = %request_id, elapsed_ms, "Tool call succeeded");
                Response::Success {
                    content: output.content,
                }
            }
            Err(err) => {
                warn!(
                    tool = %tool,
                    request_id = %request_id,
                    elapsed_ms,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Tool call failed"
                );
                Response::Failure {
                    message: err.to_string(),
                }
            }
        }
    }

    async fn run(&self, request: Request) -> ToolResult<ToolOutput> {
        let descriptor = self
            .toolset
            .registry()
            .lookup(&request.tool_name)
            .ok_or_else(|| ToolError::unknown_tool(&request.tool_name))?;

        let args = descriptor.schema.validate(request.arguments)?;

        AssertUnwindSafe(self.toolset.invoke(descriptor.name, args))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ToolError::internal(format!(
                    "handler for {} panicked: {}",
                    descriptor.name,
                    panic_message(panic.as_ref())
                )))
            })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::ToolDescriptor;
    use crate::tools::schema::{ArgumentSchema, FieldSpec, FieldType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoToolset {
        registry: ToolRegistry,
        calls: AtomicUsize,
    }

    impl EchoToolset {
        fn new() -> Self {
            Self {
                registry: ToolRegistry::new(vec![
                    ToolDescriptor::new(
                        "echo",
                        "Echo the message",
                        ArgumentSchema::new(vec![FieldSpec::required(
                            "message",
                            FieldType::String,
                            "Text to echo",
                        )]),
                    ),
                    ToolDescriptor::new("explode", "Always panics", ArgumentSchema::empty()),
                    ToolDescriptor::new("fail", "Always fails", ArgumentSchema::empty()),
                ]),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Toolset for EchoToolset {
        fn server_name(&self) -> &'static str {
            "echo"
        }

        fn instructions(&self) -> &'static str {
            "Echoes things"
        }

        fn registry(&self) -> &ToolRegistry {
            &self.registry
        }

        async fn invoke(&self, tool: &str, args: ValidatedArgs) -> ToolResult<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match tool {
                "echo" => Ok(ToolOutput::json(json!({ "echo": args.get("message") }))),
                "explode" => panic!("kaboom"),
                _ => Err(ToolError::query_failed_with("relation \"x\" does not exist")),
            }
        }
    }

    fn dispatcher() -> (Dispatcher<EchoToolset>, Arc<EchoToolset>) {
        let toolset = Arc::new(EchoToolset::new());
        (Dispatcher::new(toolset.clone()), toolset)
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, toolset) = dispatcher();
        let response = dispatcher
            .dispatch(Request::new("drop_everything", JsonObject::new()))
            .await;
        assert_eq!(
            response.failure_message(),
            Some("Unknown tool: drop_everything")
        );
        assert_eq!(toolset.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_skips_handler() {
        let (dispatcher, toolset) = dispatcher();
        let response = dispatcher
            .dispatch(Request::new("echo", JsonObject::new()))
            .await;
        assert_eq!(
            response.failure_message(),
            Some("Invalid arguments: Missing required argument: message")
        );
        assert_eq!(toolset.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_wraps_content() {
        let (dispatcher, _) = dispatcher();
        let mut args = JsonObject::new();
        args.insert("message".into(), json!("hi"));
        let response = dispatcher.dispatch(Request::new("echo", args)).await;
        assert_eq!(
            response.first_block(),
            Some(&ContentBlock::Json(json!({ "echo": "hi" })))
        );
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let (dispatcher, _) = dispatcher();
        let response = dispatcher
            .dispatch(Request::new("fail", JsonObject::new()))
            .await;
        assert_eq!(
            response.failure_message(),
            Some("Error executing query: relation \"x\" does not exist")
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (dispatcher, _) = dispatcher();
        let response = dispatcher
            .dispatch(Request::new("explode", JsonObject::new()))
            .await;
        let message = response.failure_message().unwrap();
        assert!(message.starts_with("Internal error:"), "{}", message);
        assert!(message.contains("kaboom"), "{}", message);
    }

    #[test]
    fn test_json_block_renders_pretty() {
        let block = ContentBlock::Json(json!([{ "id": 1 }]));
        assert_eq!(block.render(), "[\n  {\n    \"id\": 1\n  }\n]");
    }
}
