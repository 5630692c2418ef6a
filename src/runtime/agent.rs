// src/runtime/agent.rs — Agent program subprocess harness

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::types::RunContext;
use crate::infra::errors::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(500);

/// Captured output of one agent run.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl AgentOutput {
    /// The agent's final answer: last non-empty stdout line.
    pub fn parsed_answer(&self) -> Option<&str> {
        self.stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }

    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs agent definition files through the interpreter binary, with
/// per-run variable overrides and a hard timeout.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    program: String,
    default_timeout: Duration,
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new("dolphin")
    }
}

impl AgentRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Execute `<program> run <path>` with optional variable overrides,
    /// case id, and knowledge file from the run context. A timeout kills
    /// the process and is reported in the output, not as an error.
    pub async fn run(
        &self,
        agent_path: &Path,
        variables: &HashMap<String, String>,
        ctx: &RunContext,
    ) -> Result<AgentOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("run").arg(agent_path);
        if !variables.is_empty() {
            cmd.arg("--vars").arg(serde_json::to_string(variables)?);
        }
        if let Some(case_id) = &ctx.case_id {
            cmd.arg("--case_id").arg(case_id);
        }
        if let Some(knows) = &ctx.knowledge_file {
            cmd.arg("--knows").arg(knows);
        }
        cmd.kill_on_drop(true);

        let timeout = ctx.timeout.unwrap_or(self.default_timeout);
        debug!(
            program = %self.program,
            path = %agent_path.display(),
            timeout_secs = timeout.as_secs(),
            "running agent"
        );

        let started = Instant::now();
        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(output) => {
                let output = output?;
                Ok(AgentOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                    timed_out: false,
                    duration: started.elapsed(),
                })
            }
            Err(_) => {
                warn!(
                    path = %agent_path.display(),
                    timeout_secs = timeout.as_secs(),
                    "agent run timed out"
                );
                Ok(AgentOutput {
                    stdout: String::new(),
                    stderr: format!("timed out after {}s", timeout.as_secs()),
                    exit_code: None,
                    timed_out: true,
                    duration: started.elapsed(),
                })
            }
        }
    }
}
