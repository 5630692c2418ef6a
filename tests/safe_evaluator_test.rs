// tests/safe_evaluator_test.rs — Sandboxed evaluation against stub programs

use std::collections::HashMap;
use std::path::PathBuf;

use shoal::core::traits::Evaluator;
use shoal::core::types::{CleanupPolicy, ExecutionContext};
use shoal::evaluators::safe::SafeEvaluator;
use shoal::runtime::agent::AgentRuntime;
use shoal::{Candidate, RunContext};

fn variable_candidate(base_path: Option<PathBuf>, content: &str) -> Candidate {
    let mut variables = HashMap::new();
    variables.insert("$injects".to_string(), String::new());
    Candidate::new(
        content,
        ExecutionContext::Variable {
            base_path,
            variables,
        },
    )
}

fn temp_file_candidate(working_dir: PathBuf, cleanup_policy: CleanupPolicy) -> Candidate {
    Candidate::new(
        "name = \"probe\"\nsystem = \"\"\"Answer briefly.\"\"\"",
        ExecutionContext::TempFile {
            working_dir: Some(working_dir),
            file_template: None,
            cleanup_policy,
            variables: HashMap::new(),
        },
    )
}

#[tokio::test]
async fn test_missing_base_path_fails_before_any_subprocess() {
    // The program does not exist; if validation did not short-circuit,
    // evaluation would report a launch failure instead of a validation one.
    let mut eval = SafeEvaluator::new(AgentRuntime::new("no-such-binary-shoal-test"));
    let result = eval
        .evaluate(&variable_candidate(None, "a hint"), &RunContext::new())
        .await
        .unwrap();

    assert_eq!(result.score, 0.0);
    assert!(!result.promising);
    let error = result.error.expect("validation error expected");
    assert!(error.contains("validation failed"));
    assert!(error.contains("base_path"));
}

#[tokio::test]
async fn test_injection_like_content_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let mut eval = SafeEvaluator::new(AgentRuntime::new("no-such-binary-shoal-test"));
    let candidate = variable_candidate(Some(dir.path().to_path_buf()), "\"; rm -rf /tmp #");
    let result = eval.evaluate(&candidate, &RunContext::new()).await.unwrap();

    assert_eq!(result.score, 0.0);
    assert_eq!(result.error.as_deref(), Some("unsafe variable content"));
}

#[tokio::test]
async fn test_temp_file_run_scores_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    // `echo run <path> ...` exits 0 and prints the arguments; with no
    // expected answer the default scoring lands on neutral.
    let mut eval = SafeEvaluator::new(AgentRuntime::new("echo"));
    let candidate = temp_file_candidate(dir.path().to_path_buf(), CleanupPolicy::Auto);

    let result = eval.evaluate(&candidate, &RunContext::new()).await.unwrap();

    assert!(result.error.is_none());
    assert!((result.score - 0.5).abs() < f64::EPSILON);
    assert_eq!(
        result.metadata.get("mode").map(String::as_str),
        Some("temp_file")
    );
    assert_eq!(
        result.metadata.get("exit_code").map(String::as_str),
        Some("0")
    );
    // Auto cleanup leaves nothing behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_keep_policy_preserves_candidate_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut eval = SafeEvaluator::new(AgentRuntime::new("echo"));
    let candidate = temp_file_candidate(dir.path().to_path_buf(), CleanupPolicy::Keep);
    let id = candidate.id.clone();

    eval.evaluate(&candidate, &RunContext::new()).await.unwrap();

    let kept: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].contains(&id));
    assert!(kept[0].ends_with(".dph"));
}

#[tokio::test]
async fn test_expected_answer_in_output_scores_high() {
    let dir = tempfile::tempdir().unwrap();
    let mut eval = SafeEvaluator::new(AgentRuntime::new("echo"));
    let candidate = temp_file_candidate(dir.path().to_path_buf(), CleanupPolicy::Auto);
    // echo prints the temp file path, which contains "candidate_"
    let ctx = RunContext::new().expected("candidate_");

    let result = eval.evaluate(&candidate, &ctx).await.unwrap();
    assert!((result.score - 0.7).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_launch_failure_is_a_result_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut eval = SafeEvaluator::new(AgentRuntime::new("no-such-binary-shoal-test"));
    let candidate = temp_file_candidate(dir.path().to_path_buf(), CleanupPolicy::Auto);

    let result = eval.evaluate(&candidate, &RunContext::new()).await.unwrap();
    assert_eq!(result.score, 0.0);
    assert!(result.error.as_deref().unwrap().contains("launch failed"));
}
