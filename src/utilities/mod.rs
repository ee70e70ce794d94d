//! Shared utilities: progress output and logging bootstrap.

pub mod logger;
pub mod logging;
pub mod printer;

pub use logger::Logger;
pub use printer::{Printer, PrinterColor};
