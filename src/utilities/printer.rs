//! Console printer with color support for the verbose progress stream.

use serde::{Deserialize, Serialize};

/// Available colors for printed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterColor {
    Red,
    Green,
    Yellow,
    Cyan,
    BoldRed,
    BoldGreen,
    BoldYellow,
    BoldCyan,
}

impl PrinterColor {
    /// ANSI escape code for this color.
    fn ansi_code(&self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Cyan => "\x1b[36m",
            Self::BoldRed => "\x1b[1;31m",
            Self::BoldGreen => "\x1b[1;32m",
            Self::BoldYellow => "\x1b[1;33m",
            Self::BoldCyan => "\x1b[1;36m",
        }
    }
}

/// ANSI reset code.
const RESET: &str = "\x1b[0m";

/// Printer for console output with color support.
#[derive(Debug, Clone, Default)]
pub struct Printer;

impl Printer {
    /// Create a new `Printer`.
    pub fn new() -> Self {
        Self
    }

    /// Print a message in the given color.
    pub fn print(&self, message: &str, color: PrinterColor) {
        println!("{}{}{}", color.ansi_code(), message, RESET);
    }

    /// Print a message without color.
    pub fn print_plain(&self, message: &str) {
        println!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_codes_are_escape_sequences() {
        let colors = [
            PrinterColor::Red,
            PrinterColor::Green,
            PrinterColor::Yellow,
            PrinterColor::Cyan,
            PrinterColor::BoldRed,
            PrinterColor::BoldGreen,
            PrinterColor::BoldYellow,
            PrinterColor::BoldCyan,
        ];
        for color in colors {
            assert!(color.ansi_code().starts_with("\x1b["));
        }
    }

    #[test]
    fn test_color_serde_round_trip() {
        let json = serde_json::to_string(&PrinterColor::BoldGreen).unwrap();
        assert_eq!(json, "\"bold_green\"");
        let back: PrinterColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PrinterColor::BoldGreen);
    }
}
