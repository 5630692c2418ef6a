// src/core/context.rs — ExecutionContext construction and pre-flight validation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::types::{CleanupPolicy, ExecutionContext};

pub const DEFAULT_FILE_TEMPLATE: &str = "candidate_{timestamp}_{id}.dph";

/// Variable-mode context for runtime injection. The inject variable starts
/// as an empty placeholder to be filled by the generator.
pub fn injection_context(base_path: impl Into<PathBuf>, inject_var: &str) -> ExecutionContext {
    let mut variables = HashMap::new();
    variables.insert(inject_var.to_string(), String::new());
    ExecutionContext::Variable {
        base_path: Some(base_path.into()),
        variables,
    }
}

/// Temp-file context for prompt-source optimization.
pub fn prompt_file_context(
    working_dir: Option<PathBuf>,
    file_template: Option<String>,
    cleanup_policy: CleanupPolicy,
) -> ExecutionContext {
    ExecutionContext::TempFile {
        working_dir,
        file_template,
        cleanup_policy,
        variables: HashMap::new(),
    }
}

/// Validate an execution context ahead of use. Returns every problem found
/// so the caller can report them all at once.
pub fn validate(execution: &ExecutionContext, content: &str) -> Vec<String> {
    let mut errors = Vec::new();

    match execution {
        ExecutionContext::Variable {
            base_path,
            variables,
        } => {
            match base_path {
                None => errors.push("variable mode requires a base_path".into()),
                Some(p) if !p.exists() => {
                    errors.push(format!("base_path does not exist: {}", p.display()))
                }
                _ => {}
            }
            if variables.is_empty() {
                errors.push("variable mode requires at least one variable".into());
            }
        }
        ExecutionContext::TempFile { working_dir, .. } => {
            if content.trim().is_empty() {
                errors.push("temp_file mode requires non-empty content".into());
            }
            if let Some(wd) = working_dir {
                if wd.exists() {
                    if !is_writable(wd) {
                        errors.push("working directory is not writable".into());
                    }
                } else {
                    match wd.parent() {
                        Some(parent) if parent.exists() => {
                            if !is_writable(parent) {
                                errors.push(format!(
                                    "parent directory {} is not writable",
                                    parent.display()
                                ));
                            }
                        }
                        Some(parent) => errors.push(format!(
                            "parent directory {} does not exist",
                            parent.display()
                        )),
                        None => errors.push("working directory has no parent".into()),
                    }
                }
            }
        }
        ExecutionContext::MemoryOverlay { content_patches } => {
            if content_patches.is_empty() {
                errors.push("memory_overlay mode requires content patches".into());
            }
        }
    }

    errors
}

fn is_writable(path: &Path) -> bool {
    !std::fs::metadata(path)
        .map(|m| m.permissions().readonly())
        .unwrap_or(true)
}

/// Reject variable values that look like shell/SQL injection attempts or
/// carry null bytes. Values are serialized to JSON and handed to a
/// subprocess, so keep this strict.
pub fn variables_are_safe(variables: &HashMap<String, String>) -> bool {
    static INJECTION: OnceLock<Regex> = OnceLock::new();
    let re = INJECTION
        .get_or_init(|| Regex::new(r#"["'];\s*(?i:rm|del|drop|exec|eval)"#).expect("valid regex"));

    variables
        .values()
        .all(|v| !re.is_match(v) && !v.contains('\0'))
}

/// Strip path-traversal characters from a file-name template.
pub fn sanitize_file_template(template: &str) -> String {
    template
        .replace("..", "")
        .replace('/', "_")
        .replace('\\', "_")
}
