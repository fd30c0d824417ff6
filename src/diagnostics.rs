//! Single logging sink for the whole compiler. Semantic and backend
//! consistency problems are reported here with a severity; neither pass
//! ever terminates the process itself.

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

pub fn log(severity: Severity, message: impl AsRef<str>) {
    let tag = match severity {
        Severity::Debug => "debug".dimmed(),
        Severity::Info => "info".cyan(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Error => "error".red().bold(),
    };

    eprintln!("{tag}: {}", message.as_ref());
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::diagnostics::log($crate::diagnostics::Severity::Error, format!($($arg)*))
    };
}

macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::diagnostics::log($crate::diagnostics::Severity::Warning, format!($($arg)*))
    };
}

pub(crate) use {log_error, log_warning};
