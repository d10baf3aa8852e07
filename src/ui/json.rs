//! Machine-readable output: one JSON object per line.
//!
//! Progress lines are the serialized [`ProgressUpdate`]s. The run ends with a
//! single `summary` or `error` line.

use std::io::Write;

use serde::Serialize;

use crate::errors::PipelineError;
use crate::orchestrator::PipelineReport;
use crate::progress::ProgressUpdate;
use crate::step::StrategyKind;
use crate::strategy::StepOutcome;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepSummary<'a> {
    name: &'a str,
    strategy: StrategyKind,
    outcome: StepOutcome,
    updates: usize,
    elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum FinalLine<'a> {
    #[serde(rename_all = "camelCase")]
    Summary {
        steps: Vec<StepSummary<'a>>,
        elapsed_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        failed_step: Option<usize>,
    },
}

pub struct JsonRenderer<W: Write> {
    writer: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn update(&mut self, update: &ProgressUpdate) -> anyhow::Result<()> {
        self.write_line(update)
    }

    pub fn summary(&mut self, report: &PipelineReport) -> anyhow::Result<()> {
        let steps = report
            .steps
            .iter()
            .map(|s| StepSummary {
                name: &s.name,
                strategy: s.strategy,
                outcome: s.outcome,
                updates: s.updates,
                elapsed_ms: s.elapsed.as_millis() as u64,
            })
            .collect();
        self.write_line(&FinalLine::Summary {
            steps,
            elapsed_ms: report.elapsed.as_millis() as u64,
        })
    }

    pub fn error(&mut self, error: &PipelineError) -> anyhow::Result<()> {
        let failed_step = match error {
            PipelineError::StepFailed { index, .. } => Some(index + 1),
            _ => None,
        };
        self.write_line(&FinalLine::Error {
            message: error.to_string(),
            failed_step,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
