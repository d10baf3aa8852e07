use std::time::Duration;

use async_trait::async_trait;

use super::{ProgressStrategy, StepOutcome, StrategyDependencies, exit_outcome, spawn_command};
use crate::errors::StrategyError;
use crate::process::ProcessEvent;
use crate::progress::{Confidence, ProgressUpdate, StepReporter};
use crate::step::{ExecutionContext, InstallStep, StrategyKind};

/// Percent of `estimated` that `elapsed` represents, floored and capped.
pub fn synthetic_percent(elapsed: Duration, estimated: Duration, cap: u8) -> u8 {
    let estimated_ms = estimated.as_millis();
    if estimated_ms == 0 {
        return cap;
    }
    let raw = elapsed.as_millis() * 100 / estimated_ms;
    raw.min(u128::from(cap)) as u8
}

/// Time-based progress for commands that print nothing useful.
///
/// Ticks never claim more than the configured cap; only the exit of the
/// process produces 100%.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticStrategy;

#[async_trait]
impl ProgressStrategy for SyntheticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Synthetic
    }

    async fn execute(
        &self,
        step: &InstallStep,
        context: &ExecutionContext,
        on_progress: &mut (dyn FnMut(ProgressUpdate) + Send),
        deps: &StrategyDependencies,
    ) -> Result<StepOutcome, StrategyError> {
        let mut reporter = StepReporter::new(context, on_progress);
        let estimated = step
            .estimated_duration()
            .unwrap_or_else(|| deps.config.synthetic_default_duration());
        let tick = deps.config.synthetic_tick();
        let cap = deps.config.synthetic_cap_percent;

        let start = deps.clock.now();
        let mut running = spawn_command(context, deps)?;
        let mut next_tick = start + tick;

        let exit_code = loop {
            // Ticks first so a chatty command cannot starve the refresh.
            tokio::select! {
                biased;
                _ = deps.clock.sleep_until(next_tick) => {
                    let elapsed = deps.clock.elapsed_since(start);
                    let percent = synthetic_percent(elapsed, estimated, cap);
                    let detail = (deps.enhance_detail)(step.display_message(), elapsed);
                    reporter.indeterminate(
                        f64::from(percent) / 100.0,
                        Some(percent),
                        detail,
                        Confidence::Synthetic,
                    );
                    next_tick += tick;
                }
                event = running.next_event() => match event {
                    ProcessEvent::Output { text, .. } => {
                        tracing::trace!(output = %text, "synthetic step output");
                    }
                    ProcessEvent::Exited(code) => break code,
                },
            }
        };

        reporter.determinate(100, step.display_message(), Confidence::Synthetic);
        exit_outcome(step, context, exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Script, ScriptedSpawner};
    use crate::progress::CommandProgressKind;
    use crate::strategy::testing;

    #[test]
    fn test_synthetic_percent() {
        let est = Duration::from_secs(10);
        assert_eq!(synthetic_percent(Duration::from_secs(1), est, 95), 10);
        assert_eq!(synthetic_percent(Duration::from_millis(4_999), est, 95), 49);
        assert_eq!(synthetic_percent(Duration::from_secs(30), est, 95), 95);
        assert_eq!(synthetic_percent(Duration::from_secs(1), Duration::ZERO, 95), 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_stay_under_cap_until_exit() {
        let spawner = ScriptedSpawner::new().with_script("mesh up", Script::new().wait(3_100).exit(0));
        let mut deps = testing::deps(spawner);
        deps.config.synthetic_tick_ms = 200;
        let step = InstallStep::new("Mesh", "mesh up").with_estimated_duration(1_000);
        let (result, updates) = testing::run(&SyntheticStrategy, &step, &deps).await;

        assert_eq!(result.unwrap(), StepOutcome::Succeeded);
        let (terminal, ticks) = updates.split_last().unwrap();
        assert!(ticks.len() >= 10);
        for tick in ticks {
            assert_eq!(tick.command.kind, CommandProgressKind::Indeterminate);
            assert_eq!(tick.command.confidence, Confidence::Synthetic);
            assert!(tick.command.percent.unwrap() <= 95);
        }
        assert_eq!(ticks[0].command.percent, Some(20));
        assert_eq!(ticks.last().unwrap().command.percent, Some(95));
        assert!(terminal.is_terminal());
        assert_eq!(terminal.command.confidence, Confidence::Synthetic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_detail_uses_enhancer_and_default_estimate() {
        let spawner = ScriptedSpawner::new().with_script("sync", Script::new().wait(2_500).exit(0));
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Sync", "sync")
            .with_strategy(StrategyKind::Synthetic)
            .with_message("Syncing mirrors");
        let (_, updates) = testing::run(&SyntheticStrategy, &step, &deps).await;

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].command.percent, Some(10));
        assert_eq!(updates[0].command.detail, "Syncing mirrors (1s elapsed)");
        assert_eq!(updates[1].command.percent, Some(20));
        assert_eq!(updates[1].command.detail, "Syncing mirrors (2s elapsed)");
        assert_eq!(updates[2].command.detail, "Syncing mirrors");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_due_with_output_backlog_is_reported() {
        let mut script = Script::new().wait(1_000);
        for n in 0..500 {
            script = script.stdout(format!("resource {n} synced"));
        }
        let spawner = ScriptedSpawner::new().with_script("sync", script.exit(0));
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Sync", "sync").with_estimated_duration(10_000);
        let (result, updates) = testing::run(&SyntheticStrategy, &step, &deps).await;

        assert_eq!(result.unwrap(), StepOutcome::Succeeded);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].command.kind, CommandProgressKind::Indeterminate);
        assert_eq!(updates[0].command.percent, Some(10));
        assert!(updates[1].is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_still_completes_indicator() {
        let spawner = ScriptedSpawner::new().with_script("sync", Script::new().wait(100).exit(4));
        let deps = testing::deps(spawner);
        let step = InstallStep::new("Sync", "sync").with_estimated_duration(5_000);
        let (result, updates) = testing::run(&SyntheticStrategy, &step, &deps).await;

        assert_eq!(result.unwrap_err().exit_code(), Some(4));
        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_terminal());
    }
}
