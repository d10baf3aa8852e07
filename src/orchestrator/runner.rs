use std::collections::BTreeMap;
use std::time::Duration;

use tracing::Instrument;

use crate::errors::PipelineError;
use crate::progress::ProgressUpdate;
use crate::step::{ExecutionContext, InstallStep, StrategyKind, render_command};
use crate::strategy::{StepOutcome, StrategyDependencies, StrategyRegistry};

/// Result of one completed step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub name: String,
    pub strategy: StrategyKind,
    pub outcome: StepOutcome,
    /// Number of progress updates forwarded for this step
    pub updates: usize,
    pub elapsed: Duration,
}

/// Result of a pipeline that ran to the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub steps: Vec<StepReport>,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Steps whose non-zero exit was accepted.
    pub fn tolerated_failures(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Tolerated { .. }))
            .collect()
    }

    pub fn total_updates(&self) -> usize {
        self.steps.iter().map(|s| s.updates).sum()
    }
}

/// Runs steps one after another, each under the strategy its kind selects.
pub struct PipelineRunner {
    deps: StrategyDependencies,
    registry: StrategyRegistry,
    variables: BTreeMap<String, String>,
}

impl PipelineRunner {
    pub fn new(deps: StrategyDependencies) -> Self {
        Self {
            deps,
            registry: StrategyRegistry::default(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Substitute `{name}` placeholders in step commands before running them.
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn deps(&self) -> &StrategyDependencies {
        &self.deps
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// `on_progress` sees a non-decreasing `overall.percent` across the whole
    /// pipeline.
    pub async fn run<F>(
        &self,
        steps: &[InstallStep],
        mut on_progress: F,
    ) -> Result<PipelineReport, PipelineError>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        if steps.is_empty() {
            return Err(PipelineError::EmptyPlan);
        }

        let total = steps.len();
        let pipeline_start = self.deps.clock.now();
        let mut floor = 0u8;
        let mut report = PipelineReport::default();

        for (index, step) in steps.iter().enumerate() {
            let kind = step.resolved_strategy(&self.deps.config);
            let strategy = self
                .registry
                .get(kind)
                .ok_or(PipelineError::UnregisteredStrategy { kind })?;
            let command = if self.variables.is_empty() {
                step.command.clone()
            } else {
                render_command(step, &self.variables)?
            };
            let context = ExecutionContext::new(index, total, step.name.clone(), command)?;

            let span = tracing::info_span!(
                "step",
                number = context.step_number(),
                name = %step.name,
                strategy = %kind
            );
            span.in_scope(|| tracing::info!(command = %context.command, "starting step"));

            let step_start = self.deps.clock.now();
            let mut updates = 0usize;
            let mut forward = |mut update: ProgressUpdate| {
                if update.overall.percent < floor {
                    update.overall.percent = floor;
                }
                floor = update.overall.percent;
                updates += 1;
                on_progress(update);
            };

            let result = strategy
                .execute(step, &context, &mut forward, &self.deps)
                .instrument(span.clone())
                .await;
            let elapsed = self.deps.clock.elapsed_since(step_start);

            match result {
                Ok(outcome) => {
                    span.in_scope(|| {
                        tracing::info!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            updates,
                            ?outcome,
                            "step finished"
                        )
                    });
                    report.steps.push(StepReport {
                        name: step.name.clone(),
                        strategy: kind,
                        outcome,
                        updates,
                        elapsed,
                    });
                }
                Err(source) => {
                    span.in_scope(|| tracing::error!(error = %source, "step failed"));
                    return Err(PipelineError::StepFailed {
                        index,
                        name: step.name.clone(),
                        source,
                    });
                }
            }
        }

        report.elapsed = self.deps.clock.elapsed_since(pipeline_start);
        Ok(report)
    }
}
