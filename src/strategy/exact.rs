use async_trait::async_trait;

use super::{ProgressStrategy, StepOutcome, StrategyDependencies, exit_outcome, spawn_command};
use crate::errors::StrategyError;
use crate::parsers::{self, ParsedLine};
use crate::process::ProcessEvent;
use crate::progress::{Confidence, ProgressUpdate, StepReporter};
use crate::step::{ExecutionContext, InstallStep, ProgressParser, StrategyKind};

/// Step fraction used for status lines that carry no number.
const STATUS_FRACTION: f64 = 0.5;

/// Per-step filter deciding which parsed lines become updates.
///
/// Repeated details are dropped, and a percent lower than one already
/// reported is dropped so the step indicator never moves backwards.
#[derive(Debug, Default)]
pub struct ExactTracker {
    parser: Option<ProgressParser>,
    last_detail: Option<String>,
    max_percent: Option<u8>,
}

impl ExactTracker {
    pub fn new(parser: Option<ProgressParser>) -> Self {
        Self {
            parser,
            ..Self::default()
        }
    }

    /// Parse one output line, returning it only if it should be reported.
    pub fn observe(&mut self, line: &str) -> Option<ParsedLine> {
        let parsed = match self.parser {
            Some(parser) => match parsers::parse_with(parser, line) {
                ParsedLine::Unrecognized => parsers::parse_generic(line),
                recognized => recognized,
            },
            None => parsers::parse_generic(line),
        };

        match &parsed {
            ParsedLine::Percent { percent, detail } => {
                if self.is_repeat(detail) {
                    return None;
                }
                if self.max_percent.is_some_and(|max| *percent < max) {
                    tracing::trace!(percent, line, "ignoring regressed percent");
                    return None;
                }
                self.max_percent = Some(*percent);
                self.last_detail = Some(detail.clone());
            }
            ParsedLine::Status(detail) => {
                if self.is_repeat(detail) {
                    return None;
                }
                self.last_detail = Some(detail.clone());
            }
            ParsedLine::Unrecognized => {
                tracing::trace!(line, "no progress signal");
                return None;
            }
        }
        Some(parsed)
    }

    fn is_repeat(&self, detail: &str) -> bool {
        self.last_detail.as_deref() == Some(detail)
    }
}

/// Reports percentages and status lines parsed from the command's output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactStrategy;

#[async_trait]
impl ProgressStrategy for ExactStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Exact
    }

    async fn execute(
        &self,
        step: &InstallStep,
        context: &ExecutionContext,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
        deps: &StrategyDependencies,
    ) -> Result<StepOutcome, StrategyError> {
        let mut reporter = StepReporter::new(context, on_progress);
        let mut tracker = ExactTracker::new(step.progress_parser);
        let mut running = spawn_command(context, deps)?;

        let exit_code = loop {
            match running.next_event().await {
                ProcessEvent::Output { text, .. } => {
                    for line in output_lines(&text) {
                        match tracker.observe(line) {
                            Some(ParsedLine::Percent { percent, detail }) => {
                                reporter.determinate(percent, detail, Confidence::Exact);
                            }
                            Some(ParsedLine::Status(detail)) => {
                                reporter.indeterminate(
                                    STATUS_FRACTION,
                                    None,
                                    detail,
                                    Confidence::Exact,
                                );
                            }
                            _ => {}
                        }
                    }
                }
                ProcessEvent::Exited(code) => break code,
            }
        };

        let outcome = exit_outcome(step, context, exit_code)?;
        reporter.determinate(100, step.display_message(), Confidence::Exact);
        Ok(outcome)
    }
}

/// Split an output chunk into trimmed, non-empty lines.
fn output_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Script, ScriptedSpawner};
    use crate::progress::CommandProgressKind;
    use crate::strategy::testing;

    #[test]
    fn test_tracker_deduplicates_status_lines() {
        let mut tracker = ExactTracker::new(Some(ProgressParser::Fnm));
        assert!(tracker.observe("Extracting node-v20.tar.xz").is_some());
        assert!(tracker.observe("Extracting node-v20.tar.xz").is_none());
        assert!(tracker.observe("Installing Node v20.11.1").is_some());
    }

    #[test]
    fn test_tracker_suppresses_regressed_percent() {
        let mut tracker = ExactTracker::new(None);
        assert!(tracker.observe("fetch 40%").is_some());
        assert!(tracker.observe("fetch 30%").is_none());
        assert!(tracker.observe("fetch 40% again").is_some());
        assert!(tracker.observe("unrelated").is_none());
    }

    #[test]
    fn test_tracker_falls_back_to_generic_percent() {
        let mut tracker = ExactTracker::new(Some(ProgressParser::Git));
        assert_eq!(
            tracker.observe("post-checkout hook 60%"),
            Some(ParsedLine::Percent {
                percent: 60,
                detail: "post-checkout hook 60%".into()
            })
        );
    }

    #[test]
    fn test_output_lines_splits_redraws() {
        let lines: Vec<_> = output_lines("a 10%\rb 20%\r\n\n  c  ").collect();
        assert_eq!(lines, vec!["a 10%", "b 20%", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_percentages_then_terminal_update() {
        let spawner = ScriptedSpawner::new().with_script(
            "fnm install 20",
            Script::new()
                .stdout("Installing Node v20.11.1")
                .wait(100)
                .stdout("Downloading: 25%")
                .wait(100)
                .stdout("Downloading: 75%")
                .stdout("Downloading: 75%")
                .exit(0),
        );
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Node", "fnm install 20").with_parser(ProgressParser::Fnm);
        let (result, updates) = testing::run(&ExactStrategy, &step, &deps).await;

        assert_eq!(result.unwrap(), StepOutcome::Succeeded);
        assert_eq!(updates.len(), 4);

        assert_eq!(updates[0].command.kind, CommandProgressKind::Indeterminate);
        assert_eq!(updates[0].command.detail, "Installing Node v20.11.1");
        assert_eq!(updates[0].overall.percent, 50);

        assert_eq!(updates[1].command.percent, Some(25));
        // floor from the status line keeps overall at 50
        assert_eq!(updates[1].overall.percent, 50);
        assert_eq!(updates[2].command.percent, Some(75));
        assert_eq!(updates[2].overall.percent, 75);

        assert!(updates[3].is_terminal());
        assert!(updates.iter().all(|u| u.command.confidence == Confidence::Exact));
        assert!(updates.windows(2).all(|w| w[0].overall.percent <= w[1].overall.percent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_status_line_reported_once() {
        let spawner = ScriptedSpawner::new().with_script(
            "unpack",
            Script::new().stdout("Extracting...").stderr("Extracting...").exit(0),
        );
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Unpack", "unpack").with_parser(ProgressParser::Fnm);
        let (_, updates) = testing::run(&ExactStrategy, &step, &deps).await;

        let statuses = updates
            .iter()
            .filter(|u| u.command.kind == CommandProgressKind::Indeterminate)
            .count();
        assert_eq!(statuses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_returns_error_without_terminal_update() {
        let spawner = ScriptedSpawner::new()
            .with_script("download", Script::new().stdout("10%").exit(7));
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Download", "download").with_strategy(StrategyKind::Exact);
        let (result, updates) = testing::run(&ExactStrategy, &step, &deps).await;

        match result {
            Err(StrategyError::CommandFailed { command, exit_code }) => {
                assert_eq!(command, "download");
                assert_eq!(exit_code, 7);
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
        assert_eq!(updates.len(), 1);
        assert!(!updates.iter().any(|u| u.is_terminal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_on_error_completes_step() {
        let spawner = ScriptedSpawner::new().with_script("lint", Script::new().exit(1));
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Lint", "lint")
            .with_strategy(StrategyKind::Exact)
            .continuing_on_error();
        let (result, updates) = testing::run(&ExactStrategy, &step, &deps).await;

        assert_eq!(result.unwrap(), StepOutcome::Tolerated { exit_code: 1 });
        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_terminal());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let deps = testing::deps(ScriptedSpawner::new());
        let step = InstallStep::new("Missing", "nope");
        let (result, updates) = testing::run(&ExactStrategy, &step, &deps).await;

        assert!(matches!(result, Err(StrategyError::SpawnFailed { .. })));
        assert!(updates.is_empty());
    }
}
