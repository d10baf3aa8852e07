//! Progress-reporting engine for sequential command pipelines.
//!
//! A pipeline is an ordered list of [`InstallStep`]s. Each step runs under one
//! [`ProgressStrategy`] chosen by how much signal its command gives, and every
//! strategy reports through the same [`ProgressUpdate`] shape: an overall
//! pipeline percentage plus a per-step indicator tagged with its confidence.

pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod parsers;
pub mod plan;
pub mod process;
pub mod progress;
pub mod step;
pub mod strategy;
pub mod ui;
pub mod util;

pub use clock::{Clock, TokioClock};
pub use config::{EngineConfig, EngineOverrides};
pub use errors::{PipelineError, PlanError, StrategyError};
pub use orchestrator::{PipelineReport, PipelineRunner, StepReport};
pub use plan::PlanFile;
pub use process::{CommandSpawner, ProcessEvent, RunningCommand, Script, ScriptedSpawner, ShellSpawner};
pub use progress::{Confidence, ProgressUpdate};
pub use step::{ExecutionContext, InstallStep, Milestone, ProgressParser, StrategyKind};
pub use strategy::{ProgressStrategy, StepOutcome, StrategyDependencies, StrategyRegistry};
