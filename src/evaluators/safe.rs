// src/evaluators/safe.rs — Sandboxed execution-backed evaluation
//
// Runs candidates through the agent interpreter with pre-flight context
// validation, injection screening on variables, temp-file lifecycle
// management, and hard timeouts. Every recoverable failure becomes a
// zero-score result; this evaluator only errors on contract violations
// from its collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::context::{sanitize_file_template, validate, variables_are_safe, DEFAULT_FILE_TEMPLATE};
use crate::core::traits::{Evaluator, OutputScorer};
use crate::core::types::{
    Candidate, CleanupPolicy, EvaluationResult, ExecutionContext, RunContext,
};
use crate::infra::errors::Result;
use crate::runtime::agent::{AgentOutput, AgentRuntime};

/// How to treat runs that exit nonzero but still produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeniencyPolicy {
    /// Only clean exits are scoreable.
    Strict,
    /// A nonzero exit with a parsable final answer is still scored.
    #[default]
    AcceptParsableOutput,
}

/// RAII handle for a materialized candidate file. Removal on drop follows
/// the cleanup policy; `Conditional` keeps the file when the run errored
/// so it can be inspected.
pub struct TempFileManager {
    path: PathBuf,
    cleanup_policy: CleanupPolicy,
    had_error: bool,
}

impl TempFileManager {
    pub fn create(
        working_dir: Option<&Path>,
        file_template: Option<&str>,
        cleanup_policy: CleanupPolicy,
        content: &str,
        candidate_id: &str,
    ) -> Result<Self> {
        let template = sanitize_file_template(file_template.unwrap_or(DEFAULT_FILE_TEMPLATE));
        let file_name = template
            .replace("{timestamp}", &chrono::Utc::now().timestamp().to_string())
            .replace("{id}", candidate_id);

        let dir = working_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, content)?;
        debug!(path = %path.display(), "materialized candidate file");

        Ok(Self {
            path,
            cleanup_policy,
            had_error: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mark_error(&mut self) {
        self.had_error = true;
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        let remove = match self.cleanup_policy {
            CleanupPolicy::Keep => false,
            CleanupPolicy::Auto => true,
            CleanupPolicy::Conditional => !self.had_error,
        };
        if remove {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "temp file cleanup failed");
            }
        }
    }
}

pub struct SafeEvaluator {
    runtime: AgentRuntime,
    scorer: Option<Box<dyn OutputScorer>>,
    leniency: LeniencyPolicy,
}

impl SafeEvaluator {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self {
            runtime,
            scorer: None,
            leniency: LeniencyPolicy::default(),
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn OutputScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_leniency(mut self, leniency: LeniencyPolicy) -> Self {
        self.leniency = leniency;
        self
    }

    /// Fill empty variable slots with the candidate content. Non-empty
    /// values are caller-pinned and left alone.
    fn fill_variables(
        variables: &HashMap<String, String>,
        content: &str,
    ) -> HashMap<String, String> {
        variables
            .iter()
            .map(|(k, v)| {
                let value = if v.is_empty() { content.to_string() } else { v.clone() };
                (k.clone(), value)
            })
            .collect()
    }

    async fn score_output(&self, output: &AgentOutput, ctx: &RunContext) -> Result<EvaluationResult> {
        if output.timed_out {
            return Ok(EvaluationResult::failed("agent run timed out")
                .with_meta("duration_ms", output.duration.as_millis().to_string()));
        }

        let scoreable = match self.leniency {
            LeniencyPolicy::Strict => output.exit_code == Some(0),
            LeniencyPolicy::AcceptParsableOutput => {
                output.exit_code == Some(0) || output.parsed_answer().is_some()
            }
        };
        if !scoreable {
            return Ok(EvaluationResult::failed(format!(
                "agent exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let mut result = if let Some(scorer) = &self.scorer {
            scorer.score(&output.stdout, output.exit_code, ctx).await?
        } else {
            default_answer_score(output, ctx)
        };

        result.cost_tokens += (output.stdout.len() / 4) as u64;
        result
            .metadata
            .insert("duration_ms".into(), output.duration.as_millis().to_string());
        if let Some(code) = output.exit_code {
            result.metadata.insert("exit_code".into(), code.to_string());
        }
        Ok(result)
    }
}

/// Fallback scoring when no caller hook is installed: compare the parsed
/// answer against the expected one.
fn default_answer_score(output: &AgentOutput, ctx: &RunContext) -> EvaluationResult {
    let answer = output.parsed_answer().unwrap_or("");
    let expected = ctx.expected.trim();

    let score = if expected.is_empty() {
        0.5
    } else if answer.eq_ignore_ascii_case(expected) {
        1.0
    } else if output.stdout.contains(expected) {
        0.7
    } else {
        strsim::normalized_levenshtein(&answer.to_lowercase(), &expected.to_lowercase()) * 0.5
    };

    EvaluationResult::scored(score)
        .with_meta("answer", answer)
        .with_meta("scoring", "default_answer")
}

#[async_trait]
impl Evaluator for SafeEvaluator {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult> {
        let problems = validate(&candidate.execution, &candidate.content);
        if !problems.is_empty() {
            return Ok(EvaluationResult::failed(format!(
                "validation failed: {}",
                problems.join("; ")
            ))
            .with_meta("mode", candidate.execution.mode()));
        }

        let output = match &candidate.execution {
            ExecutionContext::Variable {
                base_path,
                variables,
            } => {
                let filled = Self::fill_variables(variables, &candidate.content);
                if !variables_are_safe(&filled) {
                    return Ok(EvaluationResult::failed("unsafe variable content")
                        .with_meta("mode", "variable"));
                }
                // validate() guarantees base_path is present
                let path = base_path.as_deref().unwrap_or_else(|| Path::new(""));
                match self.runtime.run(path, &filled, ctx).await {
                    Ok(out) => out,
                    Err(e) => {
                        return Ok(EvaluationResult::failed(format!("agent launch failed: {e}"))
                            .with_meta("mode", "variable"))
                    }
                }
            }
            ExecutionContext::TempFile {
                working_dir,
                file_template,
                cleanup_policy,
                variables,
            } => {
                let mut manager = match TempFileManager::create(
                    working_dir.as_deref(),
                    file_template.as_deref(),
                    *cleanup_policy,
                    &candidate.content,
                    &candidate.id,
                ) {
                    Ok(m) => m,
                    Err(e) => {
                        return Ok(EvaluationResult::failed(format!(
                            "temp file creation failed: {e}"
                        ))
                        .with_meta("mode", "temp_file"))
                    }
                };
                match self.runtime.run(manager.path(), variables, ctx).await {
                    Ok(out) => {
                        if !out.succeeded() {
                            manager.mark_error();
                        }
                        out
                    }
                    Err(e) => {
                        manager.mark_error();
                        return Ok(EvaluationResult::failed(format!("agent launch failed: {e}"))
                            .with_meta("mode", "temp_file"));
                    }
                }
            }
            ExecutionContext::MemoryOverlay { .. } => {
                return Ok(EvaluationResult::failed(
                    "memory_overlay execution is not implemented",
                )
                .with_meta("mode", "memory_overlay"));
            }
        };

        let mut result = self.score_output(&output, ctx).await?;
        result
            .metadata
            .insert("mode".into(), candidate.execution.mode().to_string());
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "safe"
    }
}
