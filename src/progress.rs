//! Progress updates emitted to the UI layer.
//!
//! Every update carries two views of the same moment:
//! - `overall`: the whole-pipeline percentage, a step-weighted blend of the
//!   current step's local fraction
//! - `command`: what the active strategy knows about the current step, with a
//!   confidence tag saying how trustworthy the number is

use serde::{Deserialize, Serialize};

use crate::step::ExecutionContext;

/// How trustworthy a progress number is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Parsed from a real signal in the command's output
    Exact,
    /// Inferred from a declared milestone pattern
    Estimated,
    /// Derived from elapsed time alone
    Synthetic,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Exact => write!(f, "exact"),
            Confidence::Estimated => write!(f, "estimated"),
            Confidence::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Whether a numeric percent is known for the current command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandProgressKind {
    Determinate,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallProgress {
    pub percent: u8,
    /// 1-based
    pub current_step: usize,
    pub total_steps: usize,
    pub step_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandProgress {
    #[serde(rename = "type")]
    pub kind: CommandProgressKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    pub detail: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_milestone_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_milestones: Option<usize>,
}

/// The single unit handed to `on_progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub overall: OverallProgress,
    pub command: CommandProgress,
}

impl ProgressUpdate {
    /// True for the 100% determinate update that closes a step.
    pub fn is_terminal(&self) -> bool {
        self.command.kind == CommandProgressKind::Determinate && self.command.percent == Some(100)
    }
}

/// Blend a step-local fraction into the pipeline percentage.
///
/// `round(((step_index + fraction) / total_steps) * 100)`, with `fraction`
/// clamped to `0..=1`. Consecutive updates may round to the same value.
pub fn overall_percent(step_index: usize, total_steps: usize, fraction: f64) -> u8 {
    if total_steps == 0 {
        return 0;
    }
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let raw = ((step_index as f64 + fraction) / total_steps as f64) * 100.0;
    raw.round().clamp(0.0, 100.0) as u8
}

/// Builds and emits updates for one strategy invocation.
///
/// Owns the only mutable state shared between a strategy's event handlers:
/// the highest overall percent emitted so far, which it never goes below.
pub struct StepReporter<'a, 'f> {
    context: &'a ExecutionContext,
    on_progress: &'a mut (dyn FnMut(ProgressUpdate) + Send + 'f),
    last_overall: u8,
    emitted: usize,
}

impl<'a, 'f> StepReporter<'a, 'f> {
    pub fn new(
        context: &'a ExecutionContext,
        on_progress: &'a mut (dyn FnMut(ProgressUpdate) + Send + 'f),
    ) -> Self {
        Self {
            context,
            on_progress,
            last_overall: 0,
            emitted: 0,
        }
    }

    /// Emit a determinate update at `percent` of the step.
    pub fn determinate(&mut self, percent: u8, detail: impl Into<String>, confidence: Confidence) {
        let percent = percent.min(100);
        self.emit(
            f64::from(percent) / 100.0,
            CommandProgress {
                kind: CommandProgressKind::Determinate,
                percent: Some(percent),
                detail: detail.into(),
                confidence,
                current_milestone_index: None,
                total_milestones: None,
            },
        );
    }

    /// Emit an indeterminate update positioned at `fraction` of the step.
    ///
    /// `percent` is informational for the per-step indicator and may be absent.
    pub fn indeterminate(
        &mut self,
        fraction: f64,
        percent: Option<u8>,
        detail: impl Into<String>,
        confidence: Confidence,
    ) {
        self.emit(
            fraction,
            CommandProgress {
                kind: CommandProgressKind::Indeterminate,
                percent: percent.map(|p| p.min(100)),
                detail: detail.into(),
                confidence,
                current_milestone_index: None,
                total_milestones: None,
            },
        );
    }

    /// Emit a determinate milestone update.
    pub fn milestone(
        &mut self,
        percent: u8,
        detail: impl Into<String>,
        milestone_index: usize,
        total_milestones: usize,
    ) {
        let percent = percent.min(100);
        self.emit(
            f64::from(percent) / 100.0,
            CommandProgress {
                kind: CommandProgressKind::Determinate,
                percent: Some(percent),
                detail: detail.into(),
                confidence: Confidence::Estimated,
                current_milestone_index: Some(milestone_index),
                total_milestones: Some(total_milestones),
            },
        );
    }

    /// Number of updates emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn emit(&mut self, fraction: f64, command: CommandProgress) {
        let computed = overall_percent(self.context.step_index, self.context.total_steps, fraction);
        let percent = computed.max(self.last_overall);
        self.last_overall = percent;
        self.emitted += 1;
        tracing::debug!(
            overall = percent,
            command_percent = ?command.percent,
            confidence = %command.confidence,
            detail = %command.detail,
            "progress"
        );
        (self.on_progress)(ProgressUpdate {
            overall: OverallProgress {
                percent,
                current_step: self.context.step_number(),
                total_steps: self.context.total_steps,
                step_name: self.context.step_name.clone(),
            },
            command,
        });
    }
}
