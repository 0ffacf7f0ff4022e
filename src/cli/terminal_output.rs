//! Live terminal reporting of a workflow run
//!
//! `TerminalReporter` is registered as an engine event handler. It prints one
//! line per event, clipped to the terminal width, and advances a progress bar
//! as matrix entries finish.

use crate::cli::output::{create_progress_bar, format_execution_event, format_output};
use crate::execution::ExecutionEvent;
use console::style;
use indicatif::ProgressBar;

/// Prints execution events to the terminal
#[derive(Debug)]
pub struct TerminalReporter {
    progress: Option<ProgressBar>,
    show_output: bool,
    width: usize,
}

impl TerminalReporter {
    /// Create a reporter for a run over `total_entries` matrix entries
    ///
    /// With `show_output`, the first lines of each step's output are printed
    /// after it completes.
    pub fn new(total_entries: usize, show_output: bool) -> Self {
        let progress = (total_entries > 1).then(|| create_progress_bar(total_entries));
        Self {
            progress,
            show_output,
            width: terminal_width(),
        }
    }

    pub fn handle(&self, event: &ExecutionEvent) {
        self.print(&format_execution_event(event));

        match event {
            ExecutionEvent::StepCompleted { output, .. } if self.show_output => {
                let output = output.trim_end();
                if !output.is_empty() {
                    for line in format_output(output, 5).lines() {
                        self.print(&format!("    {}", style(line).dim()));
                    }
                }
            }
            ExecutionEvent::EntryFinished { entry, .. } => {
                if let Some(progress) = &self.progress {
                    progress.set_message(entry.clone());
                    progress.inc(1);
                }
            }
            ExecutionEvent::WorkflowFinished { .. } => self.finish(),
            _ => {}
        }
    }

    /// Print a separator line spanning the terminal
    pub fn print_separator(&self) {
        self.print(&"─".repeat(self.width));
    }

    fn print(&self, line: &str) {
        let line = clip(line, self.width);
        match &self.progress {
            Some(progress) => progress.println(line),
            None => println!("{}", line),
        }
    }

    fn finish(&self) {
        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }
    }
}

/// Width of stdout, 80 columns when it is not a terminal
pub fn terminal_width() -> usize {
    term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
}

/// Truncate a (possibly styled) line to `width` visible columns
pub fn clip(line: &str, width: usize) -> String {
    console::truncate_str(line, width, "…").into_owned()
}
