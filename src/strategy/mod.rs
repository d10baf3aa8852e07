//! Progress strategies.
//!
//! A strategy turns a running command (or the passage of time) into a stream
//! of [`ProgressUpdate`]s. Four implementations cover the signal levels a step
//! can offer:
//!
//! - [`ExactStrategy`] parses real percentages and status lines from output
//! - [`MilestoneStrategy`] maps known output substrings to fixed percentages
//! - [`SyntheticStrategy`] estimates from elapsed time, capped below 100
//! - [`ImmediateStrategy`] enforces a minimum display time for fast steps
//!
//! Strategies are stateless values. Everything that changes during a step
//! lives in locals of one `execute` call, so a single instance can serve any
//! number of pipelines.

mod exact;
mod immediate;
mod milestone;
mod synthetic;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::clock::{Clock, TokioClock};
use crate::config::EngineConfig;
use crate::errors::StrategyError;
use crate::process::{CommandSpawner, RunningCommand, ShellSpawner};
use crate::progress::ProgressUpdate;
use crate::step::{ExecutionContext, InstallStep, StrategyKind};
use crate::util::append_elapsed;

pub use exact::{ExactStrategy, ExactTracker};
pub use immediate::ImmediateStrategy;
pub use milestone::{MilestoneHit, MilestoneStrategy, MilestoneTracker};
pub use synthetic::SyntheticStrategy;

/// Rewrites a status line with elapsed-time context.
pub type DetailEnhancer = Arc<dyn Fn(&str, Duration) -> String + Send + Sync>;

/// Collaborators shared read-only by every strategy invocation.
#[derive(Clone)]
pub struct StrategyDependencies {
    pub clock: Arc<dyn Clock>,
    pub spawner: Arc<dyn CommandSpawner>,
    pub enhance_detail: DetailEnhancer,
    pub config: EngineConfig,
}

impl StrategyDependencies {
    pub fn new(clock: Arc<dyn Clock>, spawner: Arc<dyn CommandSpawner>, config: EngineConfig) -> Self {
        Self {
            clock,
            spawner,
            enhance_detail: Arc::new(append_elapsed),
            config,
        }
    }

    /// Tokio timers and the given shell spawner.
    pub fn production(spawner: ShellSpawner, config: EngineConfig) -> Self {
        Self::new(Arc::new(TokioClock), Arc::new(spawner), config)
    }

    pub fn with_detail_enhancer<F>(mut self, enhancer: F) -> Self
    where
        F: Fn(&str, Duration) -> String + Send + Sync + 'static,
    {
        self.enhance_detail = Arc::new(enhancer);
        self
    }
}

impl std::fmt::Debug for StrategyDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyDependencies")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// How a step that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    /// Exit code 0, or nothing to run
    Succeeded,
    /// Non-zero exit accepted because the step continues on error
    #[serde(rename_all = "camelCase")]
    Tolerated { exit_code: i32 },
}

#[async_trait]
pub trait ProgressStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Run one step, reporting through `on_progress` until it settles.
    ///
    /// Resolves once the command has exited (and any minimum display time has
    /// passed). `on_progress` is never called after this returns.
    async fn execute(
        &self,
        step: &InstallStep,
        context: &ExecutionContext,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
        deps: &StrategyDependencies,
    ) -> Result<StepOutcome, StrategyError>;
}

/// One strategy instance per [`StrategyKind`].
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Arc<dyn ProgressStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register a strategy under its own kind, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn ProgressStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: StrategyKind) -> Option<Arc<dyn ProgressStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        StrategyKind::ALL
            .into_iter()
            .filter(|kind| self.strategies.contains_key(kind))
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ExactStrategy));
        registry.register(Arc::new(MilestoneStrategy));
        registry.register(Arc::new(SyntheticStrategy));
        registry.register(Arc::new(ImmediateStrategy));
        registry
    }
}

fn spawn_command(
    context: &ExecutionContext,
    deps: &StrategyDependencies,
) -> Result<RunningCommand, StrategyError> {
    deps.spawner
        .spawn(&context.command)
        .map_err(|source| StrategyError::SpawnFailed {
            command: context.command.clone(),
            source,
        })
}

/// Decide the step result from the command's exit code.
fn exit_outcome(
    step: &InstallStep,
    context: &ExecutionContext,
    exit_code: i32,
) -> Result<StepOutcome, StrategyError> {
    if exit_code == 0 {
        return Ok(StepOutcome::Succeeded);
    }
    if step.continue_on_error {
        tracing::warn!(
            step = %context.step_name,
            exit_code,
            "command failed, continuing"
        );
        return Ok(StepOutcome::Tolerated { exit_code });
    }
    Err(StrategyError::CommandFailed {
        command: context.command.clone(),
        exit_code,
    })
}
