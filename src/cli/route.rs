//! CLI route: run context and command dispatch.

use crate::cli::parse::{Commands, OutputFormat};
use crate::config::{CollocateConfig, ConfigLoader, PolicyConfig};
use crate::frame::CallStackFrame;
use crate::guard::{Decision, Enforcement, GuardedOperation, OperationGuard};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

/// Exit status when a checked call would be rejected
pub const EXIT_DENIED: i32 = 1;

/// Exit status when no policy covers the checked operation
pub const EXIT_NO_POLICY: i32 = 2;

/// Rendered command result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_code: 0,
        }
    }

    fn failed(text: impl Into<String>, exit_code: i32) -> Self {
        Self {
            text: text.into(),
            exit_code,
        }
    }
}

/// Configured policies, serialized as a `[[policies]]` table array
#[derive(Serialize)]
struct PolicyList<'a> {
    policies: &'a [PolicyConfig],
}

/// Result of `collocate check`
#[derive(Serialize)]
struct CheckReport<'a> {
    owner: &'a str,
    operation: &'a str,
    path: &'a str,
    decision: Decision,
    allowed_paths: &'a BTreeSet<String>,
}

/// Runtime context for CLI execution
pub struct RunContext {
    config: CollocateConfig,
}

impl RunContext {
    /// Load configuration from every source, with `config_path` layered on top
    pub fn new(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = ConfigLoader::load(config_path.as_deref()).with_context(|| match &config_path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: CollocateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollocateConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> anyhow::Result<CommandOutput> {
        match command {
            Commands::Policies { format } => self.list_policies(*format),
            Commands::Check {
                owner,
                operation,
                path,
                format,
            } => self.check(owner, operation, path, *format),
            Commands::Validate => Ok(self.validate()),
        }
    }

    fn list_policies(&self, format: OutputFormat) -> anyhow::Result<CommandOutput> {
        let text = match format {
            OutputFormat::Json => serde_json::to_string_pretty(&self.config.policies)?,
            OutputFormat::Toml => toml::to_string_pretty(&PolicyList {
                policies: &self.config.policies,
            })?,
            OutputFormat::Text if self.config.policies.is_empty() => {
                "No policies configured".to_string()
            }
            OutputFormat::Text => self
                .config
                .policies
                .iter()
                .map(format_policy)
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Ok(CommandOutput::ok(text))
    }

    fn check(
        &self,
        owner: &str,
        operation: &str,
        path: &str,
        format: OutputFormat,
    ) -> anyhow::Result<CommandOutput> {
        let policy = match self.config.find_policy(owner, operation) {
            Some(policy) => policy,
            None => {
                return Ok(CommandOutput::failed(
                    format!("No policy covers {}::{}", owner, operation),
                    EXIT_NO_POLICY,
                ))
            }
        };

        let enforcement = Enforcement::from_settings(&self.config.enforcement)
            .context("Invalid enforcement settings")?;
        let guard = OperationGuard::new(
            GuardedOperation::new(owner, operation, &policy.allowed_paths),
            enforcement,
        );
        let caller = CallStackFrame::new(path);
        let decision = guard.decide(&caller, &[]);
        debug!(owner, operation, path, ?decision, "Checked call site");

        let exit_code = if decision == Decision::Denied {
            EXIT_DENIED
        } else {
            0
        };
        let allowed_paths = guard.operation().allowed_paths();
        let report = CheckReport {
            owner,
            operation,
            path: &caller.path,
            decision,
            allowed_paths,
        };

        let text = match format {
            OutputFormat::Json => serde_json::to_string_pretty(&report)?,
            OutputFormat::Toml => toml::to_string_pretty(&report)?,
            OutputFormat::Text => match decision {
                Decision::Collocated => format!("collocated: {} may be called from {}", operation, caller.path),
                Decision::DebugTool => format!(
                    "debug tool: {} is called from debugging tool frame {}",
                    operation, caller.path
                ),
                Decision::Denied => format!(
                    "denied: {} was called outside of '{}'",
                    operation,
                    allowed_paths.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            },
        };

        Ok(CommandOutput { text, exit_code })
    }

    fn validate(&self) -> CommandOutput {
        match self.config.validate() {
            Ok(()) => CommandOutput::ok(format!(
                "Configuration is valid ({} policies)",
                self.config.policies.len()
            )),
            Err(errors) => {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                CommandOutput::failed(
                    format!("Configuration validation failed:\n{}", messages.join("\n")),
                    1,
                )
            }
        }
    }
}

fn format_policy(policy: &PolicyConfig) -> String {
    format!(
        "{}: {} <- {}",
        policy.owner,
        policy.operations.join(", "),
        policy.allowed_paths.join(", ")
    )
}
