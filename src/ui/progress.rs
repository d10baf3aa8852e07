use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::errors::PipelineError;
use crate::orchestrator::PipelineReport;
use crate::progress::{CommandProgress, CommandProgressKind, Confidence, ProgressUpdate};
use crate::strategy::StepOutcome;
use crate::ui::UiMode;
use crate::ui::icons::{CHECK, CLOCK, CROSS, SPARKLE, WARN};
use crate::util::format_elapsed;

/// Terminal UI for a pipeline run.
///
/// In `Full` mode two bars are stacked vertically:
/// - Overall bar: the pipeline-wide percentage, authoritative for the run
/// - Step bar: the current step's percent, or a spinner when the step has
///   no number, with the detail text styled by confidence
///
/// `Minimal` mode prints one line per finished step instead.
pub struct PipelineUI {
    mode: UiMode,
    multi: MultiProgress,
    overall_bar: ProgressBar,
    step_bar: ProgressBar,
    term: Term,
    verbose: bool,
    current_step: AtomicUsize,
    step_determinate: AtomicBool,
}

impl PipelineUI {
    /// Create the UI. `mode` should be `Full` or `Minimal`.
    pub fn new(total_steps: usize, mode: UiMode, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let overall_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let overall_bar = multi.add(ProgressBar::new(100));
        overall_bar.set_style(overall_style);
        overall_bar.set_prefix("Overall");
        overall_bar.set_message(format!("0/{} steps", total_steps));

        let step_bar = multi.add(ProgressBar::new(100));
        step_bar.set_style(spinner_style());
        step_bar.set_prefix("   Step");

        if mode != UiMode::Full {
            overall_bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
            step_bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }

        Self {
            mode,
            multi,
            overall_bar,
            step_bar,
            term: Term::stdout(),
            verbose,
            current_step: AtomicUsize::new(0),
            step_determinate: AtomicBool::new(false),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        let printed = match self.mode {
            UiMode::Full => self.multi.println(msg.as_ref()).is_ok(),
            _ => self.term.write_line(msg.as_ref()).is_ok(),
        };
        if !printed {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Render one progress update.
    pub fn handle_update(&self, update: &ProgressUpdate) {
        let step = update.overall.current_step;
        if self.current_step.swap(step, Ordering::SeqCst) != step {
            self.start_step(update);
        }

        self.overall_bar.set_position(u64::from(update.overall.percent));
        self.overall_bar.set_message(format!(
            "{}/{} {}",
            step,
            update.overall.total_steps,
            style(&update.overall.step_name).yellow()
        ));

        match update.command.kind {
            CommandProgressKind::Determinate => {
                if !self.step_determinate.swap(true, Ordering::SeqCst) {
                    self.step_bar.disable_steady_tick();
                    self.step_bar.set_style(step_bar_style());
                }
                if let Some(percent) = update.command.percent {
                    self.step_bar.set_position(u64::from(percent));
                }
            }
            CommandProgressKind::Indeterminate => {
                if self.step_determinate.swap(false, Ordering::SeqCst) {
                    self.step_bar.set_style(spinner_style());
                }
                self.step_bar.enable_steady_tick(Duration::from_millis(100));
            }
        }
        self.step_bar.set_message(styled_detail(&update.command));

        if self.verbose && self.mode == UiMode::Full && !update.is_terminal() {
            self.print_line(format!(
                "    {} {}",
                style("→").dim(),
                style(&update.command.detail).dim()
            ));
        }

        if update.is_terminal() {
            self.step_complete(update);
        }
    }

    fn start_step(&self, update: &ProgressUpdate) {
        self.step_determinate.store(false, Ordering::SeqCst);
        self.step_bar.reset();
        self.step_bar.set_style(spinner_style());
        self.step_bar.enable_steady_tick(Duration::from_millis(100));
        if self.verbose && self.mode == UiMode::Full {
            self.print_line(format!(
                "{} {}",
                style(format!(
                    "[{}/{}]",
                    update.overall.current_step, update.overall.total_steps
                ))
                .dim(),
                style(&update.overall.step_name).bold()
            ));
        }
    }

    fn step_complete(&self, update: &ProgressUpdate) {
        self.print_line(format!(
            "{}{} {}",
            CHECK,
            style(format!(
                "[{}/{}]",
                update.overall.current_step, update.overall.total_steps
            ))
            .dim(),
            update.overall.step_name
        ));
    }

    /// Clear the bars and print the run summary.
    pub fn pipeline_complete(&self, report: &PipelineReport) {
        self.overall_bar.set_position(100);
        self.step_bar.finish_and_clear();
        self.overall_bar.finish_and_clear();

        for step in report.tolerated_failures() {
            if let StepOutcome::Tolerated { exit_code } = step.outcome {
                self.print_line(format!(
                    "{}{} exited with code {} (continued)",
                    WARN,
                    style(&step.name).yellow(),
                    exit_code
                ));
            }
        }
        self.print_line(format!(
            "{}{} {} steps in {}{}",
            SPARKLE,
            style("Done:").green().bold(),
            report.steps.len(),
            CLOCK,
            format_elapsed(report.elapsed)
        ));
    }

    /// Abandon the bars and print the failure.
    pub fn pipeline_failed(&self, error: &PipelineError) {
        self.step_bar.abandon();
        self.overall_bar.abandon();
        self.print_line(format!("{}{}", CROSS, style(error).red().bold()));
    }
}

fn step_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.dim} [{bar:40.green/white}] {pos:>3}% {msg}")
        .expect("progress bar template is a valid static string")
        .progress_chars("=> ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold.dim} {spinner} {msg}")
        .expect("progress bar template is a valid static string")
}

/// Short marker telling the user how far to trust the step number.
pub fn confidence_tag(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Exact => "",
        Confidence::Estimated => "~",
        Confidence::Synthetic => "≈",
    }
}

fn styled_detail(command: &CommandProgress) -> String {
    let tag = confidence_tag(command.confidence);
    let milestone = match (command.current_milestone_index, command.total_milestones) {
        (Some(index), Some(total)) if total > 0 && index <= total => {
            format!(" {}", style(format!("({}/{})", index, total)).dim())
        }
        _ => String::new(),
    };
    let detail = match command.confidence {
        Confidence::Exact => style(&command.detail).to_string(),
        Confidence::Estimated => style(&command.detail).yellow().to_string(),
        Confidence::Synthetic => style(&command.detail).dim().to_string(),
    };
    if tag.is_empty() {
        format!("{}{}", detail, milestone)
    } else {
        format!("{} {}{}", style(tag).dim(), detail, milestone)
    }
}
