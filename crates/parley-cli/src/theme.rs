//! CLI theme and styling.

use colored::Colorize;
use parley_approval::RuleAction;
use parley_runtime::Verdict;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a rule action.
    pub(crate) fn action(action: RuleAction) -> String {
        match action {
            RuleAction::Allow => "allow".green().bold().to_string(),
            RuleAction::Prompt => "prompt".yellow().bold().to_string(),
            RuleAction::Deny => "deny".red().bold().to_string(),
        }
    }

    /// Format a gate verdict.
    pub(crate) fn verdict(verdict: &Verdict) -> String {
        match verdict {
            Verdict::Allowed { rule_id, cause } => {
                let mut text = "allowed".green().bold().to_string();
                if let Some(id) = rule_id {
                    text.push_str(&format!(" by {id}"));
                }
                if cause.is_some() {
                    text.push_str(&Self::dimmed(" (answered)"));
                }
                text
            },
            Verdict::Denied { reason } => {
                format!("{} ({reason})", "denied".red().bold())
            },
        }
    }
}
