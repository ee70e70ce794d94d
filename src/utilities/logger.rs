//! Verbose progress logger.
//!
//! The scheduler and MetaAgent use this for the human-facing progress stream
//! enabled by the `verbose` option; structured logging goes through the `log`
//! macros instead (see [`crate::utilities::logging`]).

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::utilities::printer::{Printer, PrinterColor};

/// Logger with optional verbose output and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    /// Enables verbose logging with timestamps.
    pub verbose: bool,
    /// Default color for log messages.
    #[serde(default = "default_color")]
    pub default_color: PrinterColor,
    /// Internal printer (not serialized).
    #[serde(skip)]
    printer: Printer,
}

fn default_color() -> PrinterColor {
    PrinterColor::BoldCyan
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    /// Create a new `Logger`.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            default_color: default_color(),
            printer: Printer::default(),
        }
    }

    /// Log a message with timestamp if verbose mode is enabled.
    ///
    /// # Arguments
    /// * `level` - The log level (e.g., "info", "warning", "error").
    /// * `message` - The message to log.
    /// * `color` - Optional color override for the message.
    pub fn log(&self, level: &str, message: &str, color: Option<PrinterColor>) {
        if self.verbose {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let color = color.unwrap_or(self.default_color);
            let formatted = format!("[{}][{}]: {}", timestamp, level.to_uppercase(), message);
            self.printer.print(&formatted, color);
        }
    }

    /// Log an informational progress message.
    pub fn info(&self, message: &str) {
        self.log("info", message, None);
    }

    /// Log a success message in green.
    pub fn success(&self, message: &str) {
        self.log("info", message, Some(PrinterColor::BoldGreen));
    }

    /// Log a warning message in yellow.
    pub fn warning(&self, message: &str) {
        self.log("warning", message, Some(PrinterColor::BoldYellow));
    }

    /// Log an error message in red.
    pub fn error(&self, message: &str) {
        self.log("error", message, Some(PrinterColor::BoldRed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_default_is_quiet() {
        let logger = Logger::default();
        assert!(!logger.verbose);
    }

    #[test]
    fn test_logger_serde_skips_printer() {
        let logger = Logger::new(true);
        let json = serde_json::to_string(&logger).unwrap();
        assert!(json.contains("\"verbose\":true"));
        let back: Logger = serde_json::from_str(&json).unwrap();
        assert!(back.verbose);
    }
}
