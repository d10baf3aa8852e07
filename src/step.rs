//! Step definitions consumed by the progress engine.
//!
//! This module provides:
//! - `InstallStep`, the read-only description of one pipeline step
//! - `StrategyKind` and `ProgressParser` tags selecting how progress is derived
//! - `ExecutionContext`, the per-invocation position of a step in its pipeline
//! - Command template rendering for `{variable}` placeholders

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::errors::{PipelineError, PlanError};

/// Command token for bookkeeping steps that never spawn a process.
pub const INTERNAL_COMMAND: &str = "__internal__";

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$?)\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// How a step's progress is derived from its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Literal percentages or known status lines parsed from output
    Exact,
    /// Declared substring milestones mapped to percentages
    Milestone,
    /// Elapsed time against an estimated duration
    Synthetic,
    /// Fast or internal commands with a minimum display duration
    Immediate,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Exact,
        StrategyKind::Milestone,
        StrategyKind::Synthetic,
        StrategyKind::Immediate,
    ];
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Exact => write!(f, "exact"),
            StrategyKind::Milestone => write!(f, "milestone"),
            StrategyKind::Synthetic => write!(f, "synthetic"),
            StrategyKind::Immediate => write!(f, "immediate"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(StrategyKind::Exact),
            "milestone" => Ok(StrategyKind::Milestone),
            "synthetic" => Ok(StrategyKind::Synthetic),
            "immediate" => Ok(StrategyKind::Immediate),
            _ => anyhow::bail!(
                "Invalid strategy '{}'. Valid values: exact, milestone, synthetic, immediate",
                s
            ),
        }
    }
}

/// Specialized output vocabularies understood by the exact strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressParser {
    /// Fast Node Manager (`fnm install`)
    Fnm,
    /// `git clone --progress`
    Git,
}

impl std::fmt::Display for ProgressParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressParser::Fnm => write!(f, "fnm"),
            ProgressParser::Git => write!(f, "git"),
        }
    }
}

/// A substring of command output correlated with a completion percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub pattern: String,
    /// Percentage reached when the pattern is seen (0-100)
    pub progress: u8,
    /// Detail shown instead of the raw output line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Milestone {
    pub fn new(pattern: impl Into<String>, progress: u8) -> Self {
        Self {
            pattern: pattern.into(),
            progress,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Read-only description of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallStep {
    /// Display name
    pub name: String,
    /// Shell command, or [`INTERNAL_COMMAND`] for bookkeeping steps
    pub command: String,
    /// Declared strategy; inferred from the other fields when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    /// Duration hint in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_parser: Option<ProgressParser>,
    /// Treat a non-zero exit code as success
    #[serde(default)]
    pub continue_on_error: bool,
    /// Default detail text when nothing more specific is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InstallStep {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            strategy: None,
            estimated_duration: None,
            milestones: Vec::new(),
            progress_parser: None,
            continue_on_error: false,
            message: None,
        }
    }

    /// A bookkeeping step that completes without spawning anything.
    pub fn internal(name: impl Into<String>) -> Self {
        Self::new(name, INTERNAL_COMMAND).with_strategy(StrategyKind::Immediate)
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_estimated_duration(mut self, millis: u64) -> Self {
        self.estimated_duration = Some(millis);
        self
    }

    pub fn with_milestones(mut self, milestones: Vec<Milestone>) -> Self {
        self.milestones = milestones;
        self
    }

    pub fn with_parser(mut self, parser: ProgressParser) -> Self {
        self.progress_parser = Some(parser);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn continuing_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    pub fn is_internal(&self) -> bool {
        self.command.trim() == INTERNAL_COMMAND
    }

    pub fn estimated_duration(&self) -> Option<Duration> {
        self.estimated_duration.map(Duration::from_millis)
    }

    /// Detail text used when no output-derived text is available.
    pub fn display_message(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.name)
    }

    /// The declared strategy, or the one implied by the step's other fields.
    ///
    /// Internal steps are always immediate, whatever they declare. Otherwise
    /// inference order is parser tag, milestones, then the duration hint
    /// (short hints are immediate, long or missing ones synthetic).
    pub fn resolved_strategy(&self, config: &EngineConfig) -> StrategyKind {
        if self.is_internal() {
            return StrategyKind::Immediate;
        }
        if let Some(kind) = self.strategy {
            return kind;
        }
        if self.progress_parser.is_some() {
            return StrategyKind::Exact;
        }
        if !self.milestones.is_empty() {
            return StrategyKind::Milestone;
        }
        match self.estimated_duration {
            Some(ms) if ms < config.immediate_max_duration_ms => StrategyKind::Immediate,
            _ => StrategyKind::Synthetic,
        }
    }
}

/// Position of one step invocation within its pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub step_index: usize,
    pub total_steps: usize,
    pub step_name: String,
    /// The command with all placeholders substituted
    pub command: String,
}

impl ExecutionContext {
    pub fn new(
        step_index: usize,
        total_steps: usize,
        step_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        if step_index >= total_steps {
            return Err(PipelineError::InvalidContext {
                index: step_index,
                total: total_steps,
            });
        }
        Ok(Self {
            step_index,
            total_steps,
            step_name: step_name.into(),
            command: command.into(),
        })
    }

    /// 1-based step number for display.
    pub fn step_number(&self) -> usize {
        self.step_index + 1
    }
}

/// Substitute `{name}` placeholders in a step's command.
pub fn render_command(
    step: &InstallStep,
    vars: &BTreeMap<String, String>,
) -> Result<String, PlanError> {
    let mut missing = None;
    let rendered = PLACEHOLDER_REGEX.replace_all(&step.command, |caps: &regex::Captures| {
        if !caps[1].is_empty() {
            // `${VAR}` belongs to the shell
            return caps[0].to_string();
        }
        let name = &caps[2];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                caps[0].to_string()
            }
        }
    });
    match missing {
        Some(name) => Err(PlanError::UnknownVariable {
            step: step.name.clone(),
            name,
        }),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_strategy_kind_roundtrips_through_str() {
        for kind in StrategyKind::ALL {
            let parsed: StrategyKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("bogus".parse::<StrategyKind>().is_err());
        assert_eq!("MILESTONE".parse::<StrategyKind>().unwrap(), StrategyKind::Milestone);
    }

    #[test]
    fn test_internal_step_is_immediate() {
        let step = InstallStep::internal("Record state");
        assert!(step.is_internal());
        assert_eq!(
            step.resolved_strategy(&EngineConfig::default()),
            StrategyKind::Immediate
        );
    }

    #[test]
    fn test_internal_step_ignores_declared_strategy() {
        for kind in [StrategyKind::Exact, StrategyKind::Milestone, StrategyKind::Synthetic] {
            let step = InstallStep::new("Record", INTERNAL_COMMAND).with_strategy(kind);
            assert_eq!(
                step.resolved_strategy(&EngineConfig::default()),
                StrategyKind::Immediate
            );
        }
    }

    #[test]
    fn test_declared_strategy_wins_over_inference() {
        let step = InstallStep::new("x", "echo")
            .with_parser(ProgressParser::Fnm)
            .with_strategy(StrategyKind::Synthetic);
        assert_eq!(
            step.resolved_strategy(&EngineConfig::default()),
            StrategyKind::Synthetic
        );
    }

    #[test]
    fn test_inference_order() {
        let config = EngineConfig::default();
        let parser = InstallStep::new("a", "fnm install 20").with_parser(ProgressParser::Fnm);
        assert_eq!(parser.resolved_strategy(&config), StrategyKind::Exact);

        let milestones =
            InstallStep::new("b", "npm ci").with_milestones(vec![Milestone::new("added", 90)]);
        assert_eq!(milestones.resolved_strategy(&config), StrategyKind::Milestone);

        let short = InstallStep::new("c", "mkdir -p x").with_estimated_duration(200);
        assert_eq!(short.resolved_strategy(&config), StrategyKind::Immediate);

        let long = InstallStep::new("d", "aio app deploy").with_estimated_duration(60_000);
        assert_eq!(long.resolved_strategy(&config), StrategyKind::Synthetic);

        let bare = InstallStep::new("e", "sleep 3");
        assert_eq!(bare.resolved_strategy(&config), StrategyKind::Synthetic);
    }

    #[test]
    fn test_display_message_falls_back_to_name() {
        let step = InstallStep::new("Deploy mesh", "aio api-mesh create");
        assert_eq!(step.display_message(), "Deploy mesh");
        let step = step.with_message("Deploying API Mesh...");
        assert_eq!(step.display_message(), "Deploying API Mesh...");
    }

    #[test]
    fn test_execution_context_rejects_out_of_range_index() {
        assert!(ExecutionContext::new(0, 1, "a", "b").is_ok());
        let err = ExecutionContext::new(3, 3, "a", "b").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidContext { index: 3, total: 3 }
        ));
    }

    #[test]
    fn test_render_command_substitutes_variables() {
        let step = InstallStep::new("Install Node", "fnm install {node_version} --arch {arch}");
        let rendered = render_command(&step, &vars(&[("node_version", "20"), ("arch", "x64")]));
        assert_eq!(rendered.unwrap(), "fnm install 20 --arch x64");
    }

    #[test]
    fn test_render_command_reports_unknown_variable() {
        let step = InstallStep::new("Clone", "git clone {repo_url}");
        let err = render_command(&step, &vars(&[])).unwrap_err();
        match err {
            PlanError::UnknownVariable { step, name } => {
                assert_eq!(step, "Clone");
                assert_eq!(name, "repo_url");
            }
            other => panic!("Expected UnknownVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_render_command_leaves_shell_braces_alone() {
        let step = InstallStep::new("x", "echo ${HOME} && echo {}");
        assert_eq!(render_command(&step, &vars(&[])).unwrap(), "echo ${HOME} && echo {}");
    }

    #[test]
    fn test_step_deserializes_with_defaults() {
        let step: InstallStep = toml::from_str(
            r#"
            name = "Clone"
            command = "git clone x"
            milestones = [{ pattern = "Cloning", progress = 20 }]
            "#,
        )
        .unwrap();
        assert_eq!(step.milestones.len(), 1);
        assert!(step.strategy.is_none());
        assert!(!step.continue_on_error);
    }
}
