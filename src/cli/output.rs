//! CLI output formatting

use crate::{
    core::{ExecutionStatus, StepState},
    execution::{ExecutionEvent, WorkflowRun},
    persistence::RunSummary,
    profile::{Language, Stage, ToolchainProfile},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over matrix entries
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed { tolerated: true, .. } => style("FAILED (tolerated)").yellow().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn status_icon(status: ExecutionStatus) -> Emoji<'static, 'static> {
    match status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        _ => INFO,
    }
}

/// Format a stored run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    format!(
        "{} {} - {} - {} @ {} ({}) - {}",
        status_icon(summary.status),
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.workflow_name).bold(),
        format_status(summary.status),
        style(&summary.branch).cyan(),
        summary.event,
        style(format!("{:.0}%", summary.progress() * 100.0)).cyan()
    )
}

/// Format the per-entry outcome table of a finished run
pub fn format_run_report(run: &WorkflowRun) -> String {
    let mut lines = Vec::new();
    for pipeline in &run.entries {
        lines.push(format!(
            "{} {} ({}) - {}",
            status_icon(pipeline.state.status),
            style(&pipeline.entry.name).bold(),
            style(pipeline.entry.target()).dim(),
            format_status(pipeline.state.status)
        ));
        for step in &pipeline.steps {
            let detail = match &step.state {
                StepState::Failed { error, .. } => format!(": {}", style(error).dim()),
                StepState::Skipped { reason } => format!(" ({})", reason),
                _ => String::new(),
            };
            lines.push(format!(
                "    {} {}{}",
                format_step_state(&step.state),
                step.name,
                detail
            ));
        }
    }
    lines.join("\n")
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::WorkflowStarted {
            run_id,
            workflow_name,
            entries,
        } => format!(
            "{} Starting workflow {} ({}) over {} entries",
            ROCKET,
            style(workflow_name).bold(),
            style(&run_id.to_string()[..8]).dim(),
            entries
        ),
        ExecutionEvent::EntryStarted { entry } => {
            format!("{} {}", SPINNER, style(entry).bold())
        }
        ExecutionEvent::StepStarted { entry, step_id } => {
            format!("{} [{}] {}", SPINNER, style(entry).dim(), style(step_id).cyan())
        }
        ExecutionEvent::StepCompleted { entry, step_id, .. } => {
            format!("{} [{}] {}", CHECK, style(entry).dim(), style(step_id).green())
        }
        ExecutionEvent::StepSkipped {
            entry,
            step_id,
            reason,
        } => format!(
            "{} [{}] {} ({})",
            SKIP,
            style(entry).dim(),
            style(step_id).dim(),
            reason
        ),
        ExecutionEvent::StepFailed {
            entry,
            step_id,
            error,
            tolerated,
        } => {
            if *tolerated {
                format!(
                    "{} [{}] {} failed, continuing: {}",
                    WARN,
                    style(entry).dim(),
                    style(step_id).yellow(),
                    style(error).dim()
                )
            } else {
                format!(
                    "{} [{}] {}: {}",
                    CROSS,
                    style(entry).dim(),
                    style(step_id).red(),
                    style(error).dim()
                )
            }
        }
        ExecutionEvent::EntryFinished { entry, status } => format!(
            "{} {} {}",
            status_icon(*status),
            style(entry).bold(),
            format_status(*status)
        ),
        ExecutionEvent::WorkflowFinished { run_id, status } => {
            let status_str = match status {
                ExecutionStatus::Completed => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                other => format!("{:?}", other),
            };
            format!(
                "{} Workflow ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format a profile for `profile show`
pub fn format_profile(profile: &ToolchainProfile) -> String {
    let mut lines = vec![
        format!("{} {}", INFO, style(&profile.name).bold()),
        format!(
            "  Host: {} / {} ({}, {} endian)",
            style(&profile.host.system).cyan(),
            style(&profile.host.cpu_family).cyan(),
            profile.host.cpu,
            profile.host.endian
        ),
        format!("  {}", style("Binaries:").bold()),
    ];
    for (tool, command) in &profile.binaries {
        lines.push(format!("    {:<10} {}", tool, command.join(" ")));
    }

    lines.push(format!("  {}", style("Flags:").bold()));
    for lang in Language::ALL {
        for stage in Stage::ALL {
            let args = profile.args(lang, stage);
            if !args.is_empty() {
                lines.push(format!(
                    "    {:<16} {}",
                    crate::profile::args_key(lang, stage),
                    args.join(" ")
                ));
            }
        }
    }
    lines.join("\n")
}

/// Format output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
