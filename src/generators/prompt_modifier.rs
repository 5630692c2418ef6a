// src/generators/prompt_modifier.rs — Prompt-source rewriting generation
//
// Candidates are full agent source files with one prompt section
// rewritten. An external text rewriter produces section variants from
// failure-driven directions; every variant is checked against length,
// answer-leak, forbidden-pattern, and structure constraints before it
// joins the population.

use async_trait::async_trait;
use minijinja::{context, Environment};
use regex::Regex;
use tracing::{debug, warn};

use crate::core::context::prompt_file_context;
use crate::core::traits::{Generator, TextRewriter};
use crate::core::types::{Candidate, CleanupPolicy, EvaluationResult, RunContext};
use crate::infra::errors::{Result, ShoalError};

const INSTRUCTION_TEMPLATE: &str = "\
You are improving the \"{{ section }}\" section of an agent prompt.

Current section:
{{ current }}
{% if issues %}
Observed issues:
{% for issue in issues %}- {{ issue }}
{% endfor %}{% endif %}
Apply this direction: {{ direction }}

Return only the rewritten section text, nothing else.";

/// Rewrite directions keyed by observed error type.
const DIRECTIONS: &[(&str, &str)] = &[
    (
        "wrong_answer",
        "State the expected output format explicitly and demand a single final answer line.",
    ),
    (
        "missing_constraint",
        "Enumerate every constraint from the question before answering.",
    ),
    (
        "format_error",
        "Specify the exact output format and include one example.",
    ),
    (
        "reasoning_error",
        "Require step-by-step reasoning with verification of each intermediate result.",
    ),
    (
        "timeout",
        "Instruct the agent to answer concisely and avoid unnecessary exploration.",
    ),
];

const GENERIC_DIRECTIONS: &[&str] = &[
    "Make the instructions more specific and actionable.",
    "Add a verification step before the final answer.",
    "Tighten the wording and remove ambiguity.",
    "Emphasize reading the question carefully before acting.",
    "Ask for the reasoning to be laid out before the conclusion.",
];

#[derive(Debug, Clone)]
pub struct PromptModifierConfig {
    /// Name of the triple-quoted section to rewrite.
    pub target_section: String,
    pub initial_size: usize,
    /// Rewritten section may grow to at most this multiple of the original.
    pub max_length_ratio: f64,
    pub forbidden_patterns: Vec<String>,
}

impl Default for PromptModifierConfig {
    fn default() -> Self {
        Self {
            target_section: "system".to_string(),
            initial_size: 5,
            max_length_ratio: 1.3,
            forbidden_patterns: vec![
                r"(?i)correct\s+answer\s+is".to_string(),
                r"(?i)ignore\s+previous\s+instructions".to_string(),
            ],
        }
    }
}

pub struct PromptModifierGenerator {
    rewriter: Box<dyn TextRewriter>,
    config: PromptModifierConfig,
    section_re: Regex,
    forbidden: Vec<Regex>,
    templates: Environment<'static>,
}

impl PromptModifierGenerator {
    pub fn new(rewriter: Box<dyn TextRewriter>, config: PromptModifierConfig) -> Result<Self> {
        let section_re = Regex::new(&format!(
            r#"(?s){}\s*=\s*"""(.*?)""""#,
            regex::escape(&config.target_section)
        ))
        .map_err(|e| ShoalError::Config(e.to_string()))?;

        let forbidden = config
            .forbidden_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| ShoalError::Config(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let mut templates = Environment::new();
        templates.add_template("instruction", INSTRUCTION_TEMPLATE)?;

        Ok(Self {
            rewriter,
            config,
            section_re,
            forbidden,
            templates,
        })
    }

    fn extract_section<'a>(&self, source: &'a str) -> Option<&'a str> {
        self.section_re
            .captures(source)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    fn replace_section(&self, source: &str, new_section: &str) -> String {
        self.section_re
            .replace(source, |caps: &regex::Captures<'_>| {
                let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let old = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                whole.replacen(old, new_section, 1)
            })
            .into_owned()
    }

    /// Directions to try, failure-driven first, generic padding after.
    fn directions(&self, error_types: &[String], count: usize) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in error_types {
            if let Some((_, d)) = DIRECTIONS.iter().find(|(k, _)| k == e) {
                let d = d.to_string();
                if !out.contains(&d) {
                    out.push(d);
                }
            }
        }
        for d in GENERIC_DIRECTIONS {
            if out.len() >= count {
                break;
            }
            let d = d.to_string();
            if !out.contains(&d) {
                out.push(d);
            }
        }
        out.truncate(count);
        out
    }

    /// Why a rewritten section is unacceptable, or `None` if it passes.
    fn rejection_reason(
        &self,
        original_section: &str,
        new_section: &str,
        modified_source: &str,
        ctx: &RunContext,
    ) -> Option<String> {
        if new_section.trim().is_empty() {
            return Some("rewritten section is empty".into());
        }
        let max_len = (original_section.len() as f64 * self.config.max_length_ratio) as usize;
        if new_section.len() > max_len {
            return Some(format!(
                "rewritten section too long: {} > {}",
                new_section.len(),
                max_len
            ));
        }
        let expected = ctx.expected.trim();
        if expected.len() > 2 && new_section.contains(expected) {
            return Some("rewritten section leaks the expected answer".into());
        }
        for re in &self.forbidden {
            if re.is_match(new_section) {
                return Some(format!("rewritten section matches forbidden pattern {re}"));
            }
        }
        // Structure check: the section must still be findable and the
        // quoting must be intact.
        if self.extract_section(modified_source).is_none() {
            return Some("section structure was broken by the rewrite".into());
        }
        None
    }

    async fn rewrite_variant(
        &self,
        source: &str,
        current_section: &str,
        issues: &[String],
        direction: &str,
        ctx: &RunContext,
    ) -> Result<Option<String>> {
        let instruction = self.templates.get_template("instruction")?.render(context! {
            section => self.config.target_section,
            current => current_section,
            issues => issues,
            direction => direction,
        })?;

        let new_section = self.rewriter.rewrite(&instruction).await?;
        let modified = self.replace_section(source, &new_section);
        match self.rejection_reason(current_section, &new_section, &modified, ctx) {
            Some(reason) => {
                warn!(direction, reason, "discarding prompt variant");
                Ok(None)
            }
            None => Ok(Some(modified)),
        }
    }

    fn candidate(content: String) -> Candidate {
        Candidate::new(
            content,
            prompt_file_context(None, None, CleanupPolicy::Auto),
        )
    }
}

#[async_trait]
impl Generator for PromptModifierGenerator {
    async fn initialize(&mut self, target: &str, ctx: &RunContext) -> Result<Vec<Candidate>> {
        let section = self
            .extract_section(target)
            .ok_or_else(|| {
                ShoalError::InvalidTarget(format!(
                    "no \"{}\" section found in prompt source",
                    self.config.target_section
                ))
            })?
            .to_string();

        // The unmodified source is the baseline everything must beat.
        let mut population = vec![Self::candidate(target.to_string()).with_meta("strategy", "baseline")];

        let directions = self.directions(&ctx.error_types, self.config.initial_size);
        for direction in &directions {
            if population.len() > self.config.initial_size {
                break;
            }
            if let Some(modified) = self
                .rewrite_variant(target, &section, &ctx.error_types, direction, ctx)
                .await?
            {
                population.push(
                    Self::candidate(modified)
                        .with_meta("strategy", "rewrite")
                        .with_meta("direction", direction.clone()),
                );
            }
        }

        debug!(count = population.len(), "seeded prompt population");
        Ok(population)
    }

    async fn evolve(
        &mut self,
        selected: &[Candidate],
        evaluations: &[EvaluationResult],
        ctx: &RunContext,
    ) -> Result<Vec<Candidate>> {
        let Some(best_idx) = (0..evaluations.len().min(selected.len())).max_by(|&a, &b| {
            evaluations[a]
                .score
                .partial_cmp(&evaluations[b].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            return Ok(vec![]);
        };
        let best = &selected[best_idx];

        let Some(section) = self.extract_section(&best.content).map(str::to_string) else {
            // Survivor lost its section somehow; nothing to rebase on.
            return Ok(vec![]);
        };

        let issues: Vec<String> = evaluations[best_idx]
            .detail
            .as_ref()
            .map(|d| d.error_types.clone())
            .unwrap_or_default();

        let mut next = vec![best.clone()];
        let directions = self.directions(&issues, self.config.initial_size.saturating_sub(1));
        for direction in &directions {
            if let Some(modified) = self
                .rewrite_variant(&best.content, &section, &issues, direction, ctx)
                .await?
            {
                next.push(
                    Self::candidate(modified)
                        .with_parent(best.id.clone())
                        .with_meta("strategy", "rewrite")
                        .with_meta("direction", direction.clone()),
                );
            }
        }

        if next.len() == 1 {
            debug!("all prompt variants rejected, search stalled");
            return Ok(vec![]);
        }
        Ok(next)
    }

    fn name(&self) -> &'static str {
        "prompt_modifier"
    }
}
