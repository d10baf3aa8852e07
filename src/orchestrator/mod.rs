pub mod runner;

pub use runner::{PipelineReport, PipelineRunner, StepReport};
