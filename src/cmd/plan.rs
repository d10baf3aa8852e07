//! Plan inspection: `stepwise validate` and `stepwise show`.

use std::path::Path;

use anyhow::Result;
use console::style;

use stepwise::step::StrategyKind;
use stepwise::ui::icons::CHECK;

use super::load_plan;

pub fn cmd_validate(plan_path: &Path) -> Result<()> {
    let plan = load_plan(plan_path)?;
    println!(
        "{}Plan is valid: {} steps",
        CHECK,
        style(plan.steps.len()).cyan()
    );
    Ok(())
}

pub fn cmd_show(plan_path: &Path) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let steps = plan.resolved_steps()?;

    println!();
    println!("Plan: {}", plan_path.display());
    println!();

    if !plan.vars.is_empty() {
        println!("[vars]");
        for (name, value) in &plan.vars {
            println!("  {} = \"{}\"", name, value);
        }
        println!();
    }

    let engine = &plan.engine;
    println!("[engine]");
    println!("  synthetic_tick_ms = {}", engine.synthetic_tick_ms);
    println!(
        "  synthetic_default_duration_ms = {}",
        engine.synthetic_default_duration_ms
    );
    println!("  synthetic_cap_percent = {}", engine.synthetic_cap_percent);
    println!(
        "  immediate_default_duration_ms = {}",
        engine.immediate_default_duration_ms
    );
    println!("  immediate_max_duration_ms = {}", engine.immediate_max_duration_ms);
    println!(
        "  milestone_detail_max_chars = {}",
        engine.milestone_detail_max_chars
    );
    println!();

    println!("Steps");
    println!("=====");
    for (index, step) in steps.iter().enumerate() {
        let kind = step.resolved_strategy(engine);
        println!(
            "{:>3}. {} {}",
            index + 1,
            style(&step.name).bold(),
            style(format!("[{}]", kind)).cyan()
        );
        if step.is_internal() {
            println!("     (internal)");
        } else {
            println!("     $ {}", step.command);
        }

        let mut notes = Vec::new();
        if let Some(ms) = step.estimated_duration {
            notes.push(format!("estimate {}ms", ms));
        }
        if kind == StrategyKind::Milestone {
            notes.push(format!("{} milestones", step.milestones.len()));
        }
        if let Some(parser) = step.progress_parser {
            notes.push(format!("parser {}", parser));
        }
        if step.continue_on_error {
            notes.push("continues on error".to_string());
        }
        if !notes.is_empty() {
            println!("     {}", style(notes.join(", ")).dim());
        }
    }
    Ok(())
}
