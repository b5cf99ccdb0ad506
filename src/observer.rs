//! Console rendering of execution progress

use colored::Colorize;
use reconcile::{Action, ActionOutcome, ExecutionResult, Observer, ResourceId, Step, StepKind};

use crate::ui;

/// Longest command output line shown without `-v`
const OUTPUT_WIDTH: usize = 100;

/// Prints execution progress to the terminal
pub struct ConsoleObserver {
    verbose: u8,
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self { verbose, quiet }
    }
}

/// One rendered line for a step, or None when hidden at this verbosity
///
/// Commands and their output only show with `-v`; output is cut to a single
/// line unless `-vv`.
pub fn render_step(step: &Step, verbose: u8) -> Option<String> {
    let line = match step.kind {
        StepKind::Info => format!("    {} {}", "[INFO]".blue(), step.message),
        StepKind::Success => format!("    {} {}", "[OK]".green(), step.message),
        StepKind::Warning => format!("    {} {}", "[WARN]".yellow(), step.message),
        StepKind::Failure => format!("    {} {}", "[FAIL]".red(), step.message),
        StepKind::Command if verbose > 0 => {
            format!("    {}", format!("$ {}", step.message).dimmed())
        }
        StepKind::Output if verbose > 1 => step
            .message
            .lines()
            .map(|l| format!("      {}", l.dimmed()))
            .collect::<Vec<_>>()
            .join("\n"),
        StepKind::Output if verbose > 0 && !step.message.trim().is_empty() => {
            format!("      {}", ui::truncate(step.message.trim(), OUTPUT_WIDTH).dimmed())
        }
        StepKind::Command | StepKind::Output => return None,
    };
    Some(line)
}

impl Observer for ConsoleObserver {
    fn on_execution_start(&mut self, actions: &[Action]) {
        if self.quiet {
            return;
        }
        let changes = actions.iter().filter(|a| a.action_type.is_change()).count();
        ui::header(&format!(
            "Executing {} actions ({changes} changes)",
            actions.len()
        ));
    }

    fn on_action_start(&mut self, index: usize, total: usize, action: &Action) {
        if self.quiet {
            return;
        }
        ui::step(
            index + 1,
            total,
            &format!("{} {}", action.action_type, action.resource_id),
        );
    }

    fn on_step(&mut self, _resource: &ResourceId, step: &Step) {
        if self.quiet && step.kind != StepKind::Failure {
            return;
        }
        if let Some(line) = render_step(step, self.verbose) {
            println!("{line}");
        }
    }

    fn on_action_complete(&mut self, outcome: &ActionOutcome) {
        let elapsed = ui::format_duration(outcome.duration());
        match &outcome.error {
            None if !self.quiet => ui::dim(&format!("done in {elapsed}")),
            None => {}
            Some(error) => ui::error(&format!(
                "{} failed after {elapsed}: {error}",
                outcome.action.resource_id
            )),
        }
    }

    fn on_execution_complete(&mut self, result: &ExecutionResult) {
        if self.quiet && result.success {
            return;
        }
        ui::section("Summary");
        ui::kv("Succeeded", &result.success_count().to_string());
        ui::kv("Failed", &result.failure_count().to_string());
        ui::kv("Duration", &ui::format_duration(result.duration()));
        println!();
        if result.success {
            ui::success("All actions completed");
        } else if let Some(error) = &result.error {
            ui::error(&format!("Halted ({} phase): {error}", error.phase()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(kind: StepKind, message: &str) -> Step {
        Step {
            kind,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_status_steps_always_render() {
        colored::control::set_override(false);
        assert_eq!(
            render_step(&step(StepKind::Success, "nginx installed"), 0).as_deref(),
            Some("    [OK] nginx installed")
        );
        assert_eq!(
            render_step(&step(StepKind::Failure, "exit 100"), 0).as_deref(),
            Some("    [FAIL] exit 100")
        );
    }

    #[test]
    fn test_commands_need_verbose() {
        colored::control::set_override(false);
        let command = step(StepKind::Command, "dpkg -s nginx");
        assert_eq!(render_step(&command, 0), None);
        assert_eq!(
            render_step(&command, 1).as_deref(),
            Some("    $ dpkg -s nginx")
        );
    }

    #[test]
    fn test_output_truncated_below_vv() {
        colored::control::set_override(false);
        let output = step(StepKind::Output, "Reading package lists...\nDone\n");
        assert_eq!(render_step(&output, 0), None);
        assert_eq!(
            render_step(&output, 1).as_deref(),
            Some("      Reading package lists......")
        );
        assert_eq!(
            render_step(&output, 2).as_deref(),
            Some("      Reading package lists...\n      Done")
        );
    }

    #[test]
    fn test_blank_output_hidden() {
        assert_eq!(render_step(&step(StepKind::Output, "  \n"), 1), None);
    }
}
