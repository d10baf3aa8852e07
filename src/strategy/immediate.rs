use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, BoxFuture};

use super::{ProgressStrategy, StepOutcome, StrategyDependencies, exit_outcome, spawn_command};
use crate::errors::StrategyError;
use crate::process::ProcessEvent;
use crate::progress::{Confidence, ProgressUpdate, StepReporter};
use crate::step::{ExecutionContext, InstallStep, StrategyKind};

/// Intermediate marks, as percent of the minimum display duration.
const SMOOTHING_MARKS: [u8; 3] = [20, 50, 80];

/// Fast commands and internal bookkeeping steps.
///
/// A real command stays on screen for at least its minimum display duration
/// so a sub-second step does not flash past. Internal steps complete at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateStrategy;

impl ImmediateStrategy {
    /// `min(estimate or default, max)`.
    pub fn min_display_duration(step: &InstallStep, deps: &StrategyDependencies) -> Duration {
        step.estimated_duration()
            .unwrap_or_else(|| deps.config.immediate_default_duration())
            .min(deps.config.immediate_max_duration())
    }
}

#[async_trait]
impl ProgressStrategy for ImmediateStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Immediate
    }

    async fn execute(
        &self,
        step: &InstallStep,
        context: &ExecutionContext,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
        deps: &StrategyDependencies,
    ) -> Result<StepOutcome, StrategyError> {
        let mut reporter = StepReporter::new(context, on_progress);

        if step.is_internal() {
            reporter.determinate(100, step.display_message(), Confidence::Exact);
            return Ok(StepOutcome::Succeeded);
        }

        let min_duration = Self::min_display_duration(step, deps);
        let start = deps.clock.now();
        let mut running = spawn_command(context, deps)?;
        let mut marks = SMOOTHING_MARKS.iter().copied().peekable();

        let exit_code = loop {
            let timer: BoxFuture<'static, ()> = match marks.peek() {
                Some(&mark) => deps
                    .clock
                    .sleep_until(start + min_duration * u32::from(mark) / 100),
                None => Box::pin(future::pending()),
            };

            tokio::select! {
                biased;
                event = running.next_event() => match event {
                    ProcessEvent::Output { text, .. } => {
                        tracing::trace!(output = %text, "immediate step output");
                    }
                    ProcessEvent::Exited(code) => break code,
                },
                _ = timer => {
                    if let Some(mark) = marks.next() {
                        reporter.determinate(mark, step.display_message(), Confidence::Synthetic);
                    }
                }
            }
        };

        let elapsed = deps.clock.elapsed_since(start);
        if let Some(remaining) = min_duration.checked_sub(elapsed).filter(|d| !d.is_zero()) {
            tracing::trace!(remaining_ms = remaining.as_millis() as u64, "holding fast step");
            deps.clock.sleep(remaining).await;
        }

        reporter.determinate(100, step.display_message(), Confidence::Exact);
        exit_outcome(step, context, exit_code)
    }
}
