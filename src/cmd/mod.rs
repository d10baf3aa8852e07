//! CLI command implementations.
//!
//! | Module | Commands handled     |
//! |--------|----------------------|
//! | `run`  | `Run`                |
//! | `plan` | `Validate`, `Show`   |

pub mod plan;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use stepwise::plan::PlanFile;

pub use plan::{cmd_show, cmd_validate};
pub use run::cmd_run;

/// Load a plan and apply environment overrides to its engine settings.
fn load_plan(path: &Path) -> Result<PlanFile> {
    let mut plan =
        PlanFile::load(path).with_context(|| format!("Failed to load plan {}", path.display()))?;
    plan.engine
        .apply_env()
        .context("Invalid engine setting in environment")?;
    plan.engine.validate()?;
    Ok(plan)
}
