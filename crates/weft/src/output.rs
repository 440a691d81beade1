//! Colored terminal output utilities.

use console::{Style, Term};

/// Terminal output formatter.
///
/// Rendered text goes to stdout, everything else to stderr.
pub(crate) struct Output {
    out: Term,
    err: Term,
    yellow: Style,
    red: Style,
    cyan: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan: Style::new().cyan(),
        }
    }

    /// Write rendered text to stdout.
    pub(crate) fn text(&self, text: &str) -> std::io::Result<()> {
        self.out.write_line(text)
    }

    /// Print a notice (cyan).
    pub(crate) fn notice(&self, msg: &str) {
        let _ = self.err.write_line(&self.cyan.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.err.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.err.write_line(&self.red.apply_to(msg).to_string());
    }
}
