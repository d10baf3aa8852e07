//! Pipeline execution: `stepwise run <plan>`.

use std::path::Path;

use anyhow::{Context, Result};

use stepwise::config::EngineOverrides;
use stepwise::orchestrator::PipelineRunner;
use stepwise::process::ShellSpawner;
use stepwise::strategy::StrategyDependencies;
use stepwise::ui::{Renderer, UiMode};

use super::load_plan;
use super::super::Cli;

pub async fn cmd_run(
    cli: &Cli,
    plan_path: &Path,
    ui: &str,
    overrides: &EngineOverrides,
    working_dir: Option<&Path>,
) -> Result<()> {
    let mut plan = load_plan(plan_path)?;
    plan.engine.apply_overrides(overrides);
    plan.engine
        .validate()
        .context("Invalid engine settings after applying command-line overrides")?;
    let steps = plan.resolved_steps()?;

    let mut spawner = ShellSpawner::new();
    if let Some(dir) = working_dir {
        if !dir.is_dir() {
            anyhow::bail!("Working directory {} does not exist", dir.display());
        }
        spawner = spawner.with_working_dir(dir);
    }

    tracing::info!(
        plan = %plan_path.display(),
        steps = steps.len(),
        "starting pipeline"
    );

    let runner = PipelineRunner::new(StrategyDependencies::production(spawner, plan.engine.clone()));
    let mut renderer = Renderer::new(UiMode::parse(ui), steps.len(), cli.verbose);
    let result = runner.run(&steps, |update| renderer.update(&update)).await;
    renderer.finish(result.as_ref());

    let report = result.context("Pipeline failed")?;
    tracing::info!(
        elapsed_ms = report.elapsed.as_millis() as u64,
        tolerated = report.tolerated_failures().len(),
        "pipeline finished"
    );
    Ok(())
}
