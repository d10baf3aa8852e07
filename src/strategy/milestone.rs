use async_trait::async_trait;

use super::{ProgressStrategy, StepOutcome, StrategyDependencies, exit_outcome, spawn_command};
use crate::errors::StrategyError;
use crate::process::ProcessEvent;
use crate::progress::{ProgressUpdate, StepReporter};
use crate::step::{ExecutionContext, InstallStep, Milestone, StrategyKind};
use crate::util::truncate_str;

/// A milestone that fired, ready to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneHit {
    pub progress: u8,
    pub detail: String,
    /// 1-based position in the declared list
    pub index: usize,
}

/// Tracks the furthest milestone reached within one step.
#[derive(Debug, Default)]
pub struct MilestoneTracker {
    current_progress: u8,
    current_index: usize,
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `milestones` in declaration order against one output chunk.
    ///
    /// The first milestone whose pattern occurs in the chunk and whose
    /// progress is beyond the current one fires. Matches that would not move
    /// progress forward are ignored.
    pub fn observe(
        &mut self,
        milestones: &[Milestone],
        chunk: &str,
        max_detail_chars: usize,
    ) -> Option<MilestoneHit> {
        let (position, milestone) = milestones.iter().enumerate().find(|(_, m)| {
            !m.pattern.is_empty() && chunk.contains(&m.pattern) && m.progress > self.current_progress
        })?;

        self.current_progress = milestone.progress;
        self.current_index = position + 1;
        let detail = match &milestone.message {
            Some(message) => message.clone(),
            None => truncate_str(chunk.trim(), max_detail_chars),
        };
        Some(MilestoneHit {
            progress: milestone.progress,
            detail,
            index: self.current_index,
        })
    }

    pub fn current_progress(&self) -> u8 {
        self.current_progress
    }
}

/// Maps declared output substrings to fixed step percentages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilestoneStrategy;

#[async_trait]
impl ProgressStrategy for MilestoneStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Milestone
    }

    async fn execute(
        &self,
        step: &InstallStep,
        context: &ExecutionContext,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
        deps: &StrategyDependencies,
    ) -> Result<StepOutcome, StrategyError> {
        let mut reporter = StepReporter::new(context, on_progress);
        let mut tracker = MilestoneTracker::new();
        let total = step.milestones.len();
        let max_chars = deps.config.milestone_detail_max_chars;
        let mut running = spawn_command(context, deps)?;

        let exit_code = loop {
            match running.next_event().await {
                ProcessEvent::Output { text, .. } => {
                    if let Some(hit) = tracker.observe(&step.milestones, &text, max_chars) {
                        tracing::debug!(
                            step = %context.step_name,
                            milestone = hit.index,
                            progress = hit.progress,
                            "milestone reached"
                        );
                        reporter.milestone(hit.progress, hit.detail, hit.index, total);
                    }
                }
                ProcessEvent::Exited(code) => break code,
            }
        };

        let outcome = exit_outcome(step, context, exit_code)?;
        reporter.milestone(100, step.display_message(), total, total);
        Ok(outcome)
    }
}
