pub mod icons;
pub mod json;
pub mod progress;

use std::io::Stdout;

pub use json::JsonRenderer;
pub use progress::PipelineUI;

use crate::errors::PipelineError;
use crate::orchestrator::PipelineReport;
use crate::progress::ProgressUpdate;

/// UI mode for pipeline output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UiMode {
    /// Rich terminal UI with progress bars
    #[default]
    Full,
    /// One line per finished step
    Minimal,
    /// JSON lines on stdout
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    /// Parse UI mode from string, falling back to `Full`.
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Consumer of progress updates, chosen by [`UiMode`].
pub enum Renderer {
    Terminal(PipelineUI),
    Json(JsonRenderer<Stdout>),
}

impl Renderer {
    pub fn new(mode: UiMode, total_steps: usize, verbose: bool) -> Self {
        match mode {
            UiMode::Json => Renderer::Json(JsonRenderer::new(std::io::stdout())),
            mode => Renderer::Terminal(PipelineUI::new(total_steps, mode, verbose)),
        }
    }

    pub fn update(&mut self, update: &ProgressUpdate) {
        match self {
            Renderer::Terminal(ui) => ui.handle_update(update),
            Renderer::Json(json) => {
                if let Err(e) = json.update(update) {
                    tracing::warn!(error = %e, "failed to write progress line");
                }
            }
        }
    }

    pub fn finish(&mut self, result: Result<&PipelineReport, &PipelineError>) {
        match (self, result) {
            (Renderer::Terminal(ui), Ok(report)) => ui.pipeline_complete(report),
            (Renderer::Terminal(ui), Err(error)) => ui.pipeline_failed(error),
            (Renderer::Json(json), result) => {
                let written = match result {
                    Ok(report) => json.summary(report),
                    Err(error) => json.error(error),
                };
                if let Err(e) = written {
                    tracing::warn!(error = %e, "failed to write final line");
                }
            }
        }
    }
}
