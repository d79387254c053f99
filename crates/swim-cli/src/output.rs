//! Output formatting for swim-cli (text, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use swim_client::TaskStatus;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable progress lines (default)
    #[default]
    Text,
    /// Single JSON report on completion
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    fn chatty(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }

    /// Print a success message (text mode, not quiet)
    pub fn success(&self, msg: &str) {
        if self.chatty() {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (text mode, not quiet)
    pub fn info(&self, msg: &str) {
        if self.chatty() {
            println!("{}", msg);
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print a finished task with its child tasks
    pub fn task(&self, label: &str, status: &TaskStatus, children: &[TaskStatus]) {
        if !self.chatty() {
            return;
        }

        let end = status
            .end_time
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} task {} finished at {}: {}",
            label.bold(),
            status.task_id,
            end,
            status.progress
        );
        for child in children {
            let marker = if child.is_error {
                "x".red()
            } else {
                "+".green()
            };
            println!("  {} {} {}", marker, child.task_id, child.display_reason());
        }
    }

    /// Print the final report (json mode)
    pub fn report<T: Serialize>(&self, report: &T) {
        if self.format == OutputFormat::Json {
            println!(
                "{}",
                serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("TEXT"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("table"), None);
    }

    #[test]
    fn test_json_mode_is_quiet_for_progress() {
        let ctx = OutputContext::new(OutputFormat::Json, true, false);
        assert!(!ctx.chatty());
        let ctx = OutputContext::new(OutputFormat::Text, true, true);
        assert!(!ctx.chatty());
    }
}
