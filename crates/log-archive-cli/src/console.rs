use std::io::IsTerminal;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log_archive::{StatusEvent, StatusSink};

/// How status events reach the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Animated spinner with a line per finished group.
    Spinner,
    /// One plain line per event, for pipes and log files.
    Plain,
    /// Failures only.
    Quiet,
}

impl ConsoleMode {
    pub fn detect(quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if std::io::stderr().is_terminal() {
            Self::Spinner
        } else {
            Self::Plain
        }
    }
}

/// Renders status events for a person watching the terminal.
pub struct ConsoleSink {
    mode: ConsoleMode,
    // One spinner per run; replaced when the next run starts scanning.
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new(mode: ConsoleMode) -> Self {
        Self {
            mode,
            spinner: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn emit_spinner(&self, event: StatusEvent) {
        let mut slot = self
            .spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match &event {
            StatusEvent::Scanning => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(Self::spinner_style());
                spinner.enable_steady_tick(Duration::from_millis(80));
                spinner.set_message(event.to_string());
                if let Some(previous) = slot.replace(spinner) {
                    previous.finish_and_clear();
                }
            }
            StatusEvent::Compressing { .. } => {
                if let Some(spinner) = slot.as_ref() {
                    spinner.set_message(event.to_string());
                }
            }
            StatusEvent::Succeeded { .. } => print_above(slot.as_ref(), format!("✔ {event}")),
            StatusEvent::Failed { .. } => print_above(slot.as_ref(), format!("✖ {event}")),
            StatusEvent::RunInProgress => print_above(slot.as_ref(), format!("… {event}")),
            StatusEvent::Cancelled | StatusEvent::Aborted { .. } => {
                if let Some(spinner) = slot.take() {
                    spinner.abandon_with_message(event.to_string());
                } else {
                    eprintln!("{event}");
                }
            }
            StatusEvent::AllDone { .. } => {
                if let Some(spinner) = slot.take() {
                    spinner.finish_with_message(event.to_string());
                } else {
                    eprintln!("{event}");
                }
            }
        }
    }
}

fn print_above(spinner: Option<&ProgressBar>, line: String) {
    match spinner {
        Some(spinner) => spinner.println(line),
        None => eprintln!("{line}"),
    }
}

impl StatusSink for ConsoleSink {
    fn emit(&self, event: StatusEvent) {
        match self.mode {
            ConsoleMode::Spinner => self.emit_spinner(event),
            ConsoleMode::Plain => eprintln!("{event}"),
            ConsoleMode::Quiet => {
                if event.is_failure() {
                    eprintln!("{event}");
                }
            }
        }
    }
}
