//! Devops toolset: build, deploy, lint, test, log and codegen wrappers.
//!
//! Every tool maps to one fixed command line run through [`ProcessRunner`].
//! Arguments are passed as separate argv entries, never through a shell.

use crate::error::ToolResult;
use crate::process::ProcessRunner;
use crate::tools::dispatch::{ToolOutput, Toolset};
use crate::tools::registry::{ToolDescriptor, ToolRegistry};
use crate::tools::schema::{ArgumentSchema, FieldSpec, FieldType, ValidatedArgs};
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;

pub const BUILD_APP: &str = "build_app";
pub const VERCEL_BUILD: &str = "vercel_build";
pub const DEPLOY_PROJECT: &str = "deploy_project";
pub const RUN_LINT: &str = "run_lint";
pub const RUN_FORMAT: &str = "run_format";
pub const GET_DOCKER_LOGS: &str = "get_docker_logs";
pub const RUN_ALL_TESTS: &str = "run_all_tests";
pub const RUN_AFFECTED_TESTS: &str = "run_affected_tests";
pub const GENERATE_API_CLIENT: &str = "generate_api_client";

static CATALOGUE: LazyLock<ToolRegistry> = LazyLock::new(|| {
    let path = || {
        ArgumentSchema::new(vec![
            FieldSpec::optional("path", FieldType::String, "Project path or name")
                .with_default(json!(".")),
        ])
    };

    ToolRegistry::new(vec![
        ToolDescriptor::new(
            BUILD_APP,
            "Builds a specified application using Nx.",
            ArgumentSchema::new(vec![FieldSpec::required(
                "app_name",
                FieldType::String,
                "Nx project to build",
            )]),
        ),
        ToolDescriptor::new(
            VERCEL_BUILD,
            "Triggers the Vercel build process.",
            ArgumentSchema::empty(),
        ),
        ToolDescriptor::new(
            DEPLOY_PROJECT,
            "Executes the project's deploy.sh script. Use with caution!",
            ArgumentSchema::empty(),
        ),
        ToolDescriptor::new(
            RUN_LINT,
            "Runs the Nx lint command for the specified path.",
            path(),
        ),
        ToolDescriptor::new(
            RUN_FORMAT,
            "Runs the Nx format command for the specified path.",
            path(),
        ),
        ToolDescriptor::new(
            GET_DOCKER_LOGS,
            "Retrieves logs from a specified Docker container.",
            ArgumentSchema::new(vec![
                FieldSpec::required("container_name", FieldType::String, "Container name or id"),
                FieldSpec::optional("tail", FieldType::Integer, "Number of lines to show")
                    .with_default(json!(100)),
            ]),
        ),
        ToolDescriptor::new(
            RUN_ALL_TESTS,
            "Runs all Nx tests in the project.",
            ArgumentSchema::empty(),
        ),
        ToolDescriptor::new(
            RUN_AFFECTED_TESTS,
            "Runs Nx tests only for affected projects.",
            ArgumentSchema::empty(),
        ),
        ToolDescriptor::new(
            GENERATE_API_CLIENT,
            "Generates the API client for a given service using Gradle.",
            ArgumentSchema::new(vec![FieldSpec::required(
                "service_name",
                FieldType::String,
                "Service whose client to generate, e.g. auth",
            )]),
        ),
    ])
});

#[derive(Debug, Clone, Deserialize)]
struct AppArgs {
    app_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LogsArgs {
    container_name: String,
    tail: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceArgs {
    service_name: String,
}

/// A validated call to one of the devops tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevopsCall {
    BuildApp { app_name: String },
    VercelBuild,
    DeployProject,
    RunLint { path: String },
    RunFormat { path: String },
    DockerLogs { container_name: String, tail: i64 },
    RunAllTests,
    RunAffectedTests,
    GenerateApiClient { service_name: String },
}

/// Fully resolved command line plus the failure context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: &'static str,
    pub args: Vec<String>,
    pub context: String,
}

impl CommandLine {
    fn new(program: &'static str, args: &[&str], context: impl Into<String>) -> Self {
        Self {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
            context: context.into(),
        }
    }
}

impl DevopsCall {
    pub fn parse(tool: &str, args: ValidatedArgs) -> ToolResult<Self> {
        Ok(match tool {
            BUILD_APP => {
                let AppArgs { app_name } = args.into_typed()?;
                Self::BuildApp { app_name }
            }
            VERCEL_BUILD => Self::VercelBuild,
            DEPLOY_PROJECT => Self::DeployProject,
            RUN_LINT => {
                let PathArgs { path } = args.into_typed()?;
                Self::RunLint { path }
            }
            RUN_FORMAT => {
                let PathArgs { path } = args.into_typed()?;
                Self::RunFormat { path }
            }
            GET_DOCKER_LOGS => {
                let LogsArgs {
                    container_name,
                    tail,
                } = args.into_typed()?;
                Self::DockerLogs {
                    container_name,
                    tail,
                }
            }
            RUN_ALL_TESTS => Self::RunAllTests,
            RUN_AFFECTED_TESTS => Self::RunAffectedTests,
            GENERATE_API_CLIENT => {
                let ServiceArgs { service_name } = args.into_typed()?;
                Self::GenerateApiClient { service_name }
            }
            other => return Err(crate::error::ToolError::unknown_tool(other)),
        })
    }

    /// The command this call runs.
    pub fn command_line(&self) -> CommandLine {
        match self {
            Self::BuildApp { app_name } => CommandLine::new(
                "npx",
                &["nx", "build", app_name.as_str()],
                format!("Build command failed for {}", app_name),
            ),
            Self::VercelBuild => CommandLine::new(
                "npx",
                &["nx", "build", "owner-dashboard", "--prod"],
                "Vercel build command failed",
            ),
            Self::DeployProject => {
                CommandLine::new("bash", &["scripts/deploy.sh"], "Deployment script failed")
            }
            Self::RunLint { path } => {
                CommandLine::new("npx", &["nx", "lint", path.as_str()], "Lint command failed")
            }
            Self::RunFormat { path } => CommandLine::new(
                "npx",
                &["nx", "format:write", path.as_str()],
                "Format command failed",
            ),
            Self::DockerLogs {
                container_name,
                tail,
            } => CommandLine::new(
                "docker",
                &["logs", container_name.as_str(), "--tail", tail.to_string().as_str()],
                format!("Failed to get logs for container {}", container_name),
            ),
            Self::RunAllTests => CommandLine::new(
                "npx",
                &["nx", "run-many", "--target=test", "--all"],
                "Run all tests command failed",
            ),
            Self::RunAffectedTests => CommandLine::new(
                "npx",
                &["nx", "affected", "--target=test"],
                "Run affected tests command failed",
            ),
            Self::GenerateApiClient { service_name } => CommandLine::new(
                "./gradlew",
                &[format!("generate{}Client", capitalize(service_name)).as_str()],
                format!("API client generation failed for {}", service_name),
            ),
        }
    }
}

/// Upper-case the first character and lower-case the rest (`auth` -> `Auth`).
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Tools that wrap the monorepo's build and ops commands.
#[derive(Debug, Clone)]
pub struct DevopsToolset {
    runner: ProcessRunner,
}

impl DevopsToolset {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }
}

impl Toolset for DevopsToolset {
    fn server_name(&self) -> &'static str {
        "gasolinera-devops"
    }

    fn title(&self) -> Option<&'static str> {
        Some("Gasolinera JSM Devops")
    }

    fn instructions(&self) -> &'static str {
        "Build, deploy, lint, format, test, log and API-client generation commands for the \
         Gasolinera JSM monorepo. Commands run in the configured workspace directory and \
         return their standard output."
    }

    fn registry(&self) -> &ToolRegistry {
        &CATALOGUE
    }

    async fn invoke(&self, tool: &str, args: ValidatedArgs) -> ToolResult<ToolOutput> {
        let line = DevopsCall::parse(tool, args)?.command_line();
        let stdout = self
            .runner
            .run(line.program, &line.args, &line.context)
            .await?;
        Ok(ToolOutput::text(stdout))
    }
}
