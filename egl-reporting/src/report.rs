//! A builder-style diagnostic report, used for collecting notes and
//! context around a [`crate::CompileError`] before it is printed.

use std::fmt;

/// The severity of a report.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReportKind {
    Error,
    Warning,
    Info,
    Internal,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportKind::Error => "error",
            ReportKind::Warning => "warning",
            ReportKind::Info => "info",
            ReportKind::Internal => "internal error",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReportNoteKind {
    Help,
    Info,
    Note,
}

#[derive(Clone, Debug)]
pub struct ReportNote {
    pub kind: ReportNoteKind,
    pub message: String,
}

impl ReportNote {
    pub fn new(kind: ReportNoteKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// A diagnostic, accumulated with a builder-style API before being rendered.
#[derive(Clone, Debug, Default)]
pub struct Report {
    pub title: String,
    pub kind: Option<ReportKind>,
    pub line: Option<u32>,
    pub notes: Vec<ReportNote>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn kind(mut self, kind: ReportKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn add_help(mut self, message: impl Into<String>) -> Self {
        self.notes.push(ReportNote::new(ReportNoteKind::Help, message));
        self
    }

    pub fn add_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(ReportNote::new(ReportNoteKind::Note, message));
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {}",
            self.kind.map(|k| k.to_string()).unwrap_or_else(|| "error".into()),
            self.title
        );
        if let Some(line) = self.line {
            out.push_str(&format!("\n\t-> Line {line}"));
        }
        for note in &self.notes {
            out.push_str(&format!("\n\t{:?}: {}", note.kind, note.message));
        }
        out
    }
}

impl From<std::io::Error> for Report {
    fn from(err: std::io::Error) -> Self {
        Report::new().title(err.to_string()).kind(ReportKind::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_line_and_notes() {
        let report = Report::new()
            .title("undeclared identifier (x)")
            .kind(ReportKind::Error)
            .at_line(12)
            .add_help("did you mean `y`?");
        let rendered = report.render();
        assert!(rendered.contains("Line 12"));
        assert!(rendered.contains("did you mean"));
    }
}
