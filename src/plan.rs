//! Plan file loading and validation.
//!
//! A plan is a TOML document listing the pipeline's steps in order, the
//! variables substituted into their commands, and optional engine tunables:
//!
//! ```toml
//! [vars]
//! node_version = "20"
//!
//! [engine]
//! synthetic_tick_ms = 500
//!
//! [[steps]]
//! name = "Install Node.js"
//! command = "fnm install {node_version}"
//! progress_parser = "fnm"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::errors::PlanError;
use crate::step::{InstallStep, StrategyKind, render_command};

/// The full plan file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFile {
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub steps: Vec<InstallStep>,
}

impl PlanFile {
    /// Load and validate a plan from disk.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a plan from TOML text.
    pub fn parse(content: &str) -> Result<Self, PlanError> {
        let plan: PlanFile = toml::from_str(content).map_err(PlanError::Parse)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan for structural problems before anything runs.
    pub fn validate(&self) -> Result<(), PlanError> {
        self.engine.validate()?;

        if self.steps.is_empty() {
            return Err(PlanError::Invalid("plan must contain at least one step".into()));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(PlanError::Invalid(format!(
                    "step {} has an empty name",
                    index + 1
                )));
            }
            if step.command.trim().is_empty() {
                return Err(PlanError::Invalid(format!(
                    "step '{}' has an empty command",
                    step.name
                )));
            }
            if step.is_internal()
                && let Some(kind) = step.strategy.filter(|k| *k != StrategyKind::Immediate)
            {
                return Err(PlanError::Invalid(format!(
                    "step '{}' is internal and cannot use the {} strategy",
                    step.name, kind
                )));
            }
            if let Some(milestone) = step.milestones.iter().find(|m| m.progress > 100) {
                return Err(PlanError::Invalid(format!(
                    "step '{}' milestone '{}' has progress {} (must be 0-100)",
                    step.name, milestone.pattern, milestone.progress
                )));
            }
            if step.milestones.iter().any(|m| m.pattern.is_empty()) {
                return Err(PlanError::Invalid(format!(
                    "step '{}' has a milestone with an empty pattern",
                    step.name
                )));
            }
            if step.resolved_strategy(&self.engine) == StrategyKind::Milestone
                && step.milestones.is_empty()
            {
                return Err(PlanError::Invalid(format!(
                    "step '{}' uses the milestone strategy but declares no milestones",
                    step.name
                )));
            }
            render_command(step, &self.vars)?;
        }
        Ok(())
    }

    /// Steps with commands rendered and strategies made explicit.
    pub fn resolved_steps(&self) -> Result<Vec<InstallStep>, PlanError> {
        self.steps
            .iter()
            .map(|step| {
                let mut resolved = step.clone();
                resolved.command = render_command(step, &self.vars)?;
                resolved.strategy = Some(step.resolved_strategy(&self.engine));
                Ok(resolved)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::INTERNAL_COMMAND;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[vars]
node_version = "20"
repo = "https://example.com/storefront.git"

[engine]
synthetic_tick_ms = 500

[[steps]]
name = "Prepare"
command = "__internal__"

[[steps]]
name = "Install Node.js"
command = "fnm install {node_version}"
progress_parser = "fnm"

[[steps]]
name = "Clone storefront"
command = "git clone --progress {repo}"
milestones = [
  { pattern = "Cloning into", progress = 20, message = "Cloning..." },
  { pattern = "Resolving deltas", progress = 80 },
]

[[steps]]
name = "Deploy mesh"
command = "aio api-mesh create mesh.json"
estimated_duration = 45000
continue_on_error = true
"#;

    #[test]
    fn test_parse_sample_plan() {
        let plan = PlanFile::parse(SAMPLE).unwrap();
        assert_eq!(plan.steps.len(), 4);
        assert_eq!(plan.engine.synthetic_tick_ms, 500);
        assert_eq!(plan.engine.immediate_max_duration_ms, 1000);
        assert_eq!(plan.steps[2].milestones[0].message.as_deref(), Some("Cloning..."));
        assert!(plan.steps[3].continue_on_error);
    }

    #[test]
    fn test_resolved_steps_render_and_infer() {
        let plan = PlanFile::parse(SAMPLE).unwrap();
        let steps = plan.resolved_steps().unwrap();
        assert_eq!(steps[0].command, INTERNAL_COMMAND);
        assert_eq!(steps[0].strategy, Some(StrategyKind::Immediate));
        assert_eq!(steps[1].command, "fnm install 20");
        assert_eq!(steps[1].strategy, Some(StrategyKind::Exact));
        assert_eq!(
            steps[2].command,
            "git clone --progress https://example.com/storefront.git"
        );
        assert_eq!(steps[2].strategy, Some(StrategyKind::Milestone));
        assert_eq!(steps[3].strategy, Some(StrategyKind::Synthetic));
    }

    #[test]
    fn test_empty_plan_is_invalid() {
        let err = PlanFile::parse("[vars]\n").unwrap_err();
        assert!(err.to_string().contains("at least one step"));
    }

    #[test]
    fn test_unknown_variable_is_rejected_at_load() {
        let err = PlanFile::parse(
            r#"
[[steps]]
name = "Clone"
command = "git clone {repo}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::UnknownVariable { .. }));
    }

    #[test]
    fn test_milestone_strategy_without_milestones_is_invalid() {
        let err = PlanFile::parse(
            r#"
[[steps]]
name = "Install"
command = "npm ci"
strategy = "milestone"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declares no milestones"));
    }

    #[test]
    fn test_internal_step_with_other_strategy_is_invalid() {
        let err = PlanFile::parse(
            r#"
[[steps]]
name = "Record"
command = "__internal__"
strategy = "synthetic"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::Invalid(_)));
        assert!(err.to_string().contains("cannot use the synthetic strategy"));
    }

    #[test]
    fn test_internal_step_may_declare_immediate() {
        let plan = PlanFile::parse(
            r#"
[[steps]]
name = "Record"
command = "__internal__"
strategy = "immediate"
"#,
        )
        .unwrap();
        assert_eq!(plan.resolved_steps().unwrap()[0].strategy, Some(StrategyKind::Immediate));
    }

    #[test]
    fn test_milestone_progress_above_100_is_invalid() {
        let err = PlanFile::parse(
            r#"
[[steps]]
name = "Install"
command = "npm ci"
milestones = [{ pattern = "added", progress = 120 }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be 0-100"));
    }

    #[test]
    fn test_invalid_engine_table_is_rejected() {
        let err = PlanFile::parse(
            r#"
[engine]
synthetic_cap_percent = 100

[[steps]]
name = "x"
command = "true"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidEngine { .. }));
    }

    #[test]
    fn test_unknown_strategy_is_a_parse_error() {
        let err = PlanFile::parse(
            r#"
[[steps]]
name = "x"
command = "true"
strategy = "psychic"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        fs::write(&path, SAMPLE).unwrap();
        let plan = PlanFile::load(&path).unwrap();
        assert_eq!(plan.steps.len(), 4);
    }

    #[test]
    fn test_load_missing_file_carries_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = PlanFile::load(&path).unwrap_err();
        match err {
            PlanError::Read { path: p, .. } => assert_eq!(p, path),
            other => panic!("Expected Read error, got {other:?}"),
        }
    }
}
