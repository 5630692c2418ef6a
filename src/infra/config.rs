// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::{Result, ShoalError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ShoalError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Executable used to run agent candidates.
    pub program: String,
    pub timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            program: "dolphin".into(),
            timeout_seconds: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub max_iters: Option<u32>,
    pub max_seconds: Option<f64>,
    pub max_tokens: Option<u64>,
    pub max_cost_usd: Option<f64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_iters: Some(10),
            max_seconds: None,
            max_tokens: None,
            max_cost_usd: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub top_k: usize,
    pub patience: u32,
    pub min_improvement: f64,
    pub halving_ratio: f64,
    pub min_candidates: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            patience: 2,
            min_improvement: 0.05,
            halving_ratio: 0.5,
            min_candidates: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub min_confidence: f64,
    pub phase1_max_candidates: usize,
    pub two_phase: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            phase1_max_candidates: 10,
            two_phase: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.runtime.program, "dolphin");
        assert_eq!(cfg.runtime.timeout_seconds, 500);
        assert_eq!(cfg.budget.max_iters, Some(10));
        assert!(cfg.budget.max_tokens.is_none());
        assert_eq!(cfg.selection.top_k, 3);
        assert!((cfg.selection.min_improvement - 0.05).abs() < f64::EPSILON);
        assert!(cfg.evaluation.two_phase);
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shoal.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[runtime]\nprogram = \"mock-agent\"\ntimeout_seconds = 30\n\n[selection]\ntop_k = 5\npatience = 3\nmin_improvement = 0.01\nhalving_ratio = 0.7\nmin_candidates = 2\n"
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.runtime.program, "mock-agent");
        assert_eq!(cfg.runtime.timeout_seconds, 30);
        assert_eq!(cfg.selection.top_k, 5);
        // Missing sections fall back to defaults
        assert_eq!(cfg.budget.max_iters, Some(10));
        assert_eq!(cfg.evaluation.phase1_max_candidates, 10);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/shoal.toml")).unwrap_err();
        assert!(matches!(err, ShoalError::Io(_)));
    }
}
