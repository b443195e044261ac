use crate::span::Span;

/// A compile-time diagnostic (error or warning) raised by a range construct.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<DiagnosticCode>,
    pub message: String,
    pub span: Span,
    /// Zero-based position of the offending call argument, when there is one.
    pub position: Option<usize>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable category of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticCode {
    /// Malformed axis argument (wrong component count, bad rank, too many loop variables).
    ShapeError,
    /// Non-integral bound, or a bound that is neither a scalar nor a pair.
    TypeMismatch,
    /// Fewer loop variables than domain axes. Never fatal.
    ArityWarning,
    /// A static expansion met a bound that only exists at run time.
    CompileTimeValueRequired,
    /// A static expansion would materialize more tuples than allowed.
    UnrollLimit,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::ShapeError => "ShapeError",
            DiagnosticCode::TypeMismatch => "TypeMismatch",
            DiagnosticCode::ArityWarning => "ArityWarning",
            DiagnosticCode::CompileTimeValueRequired => "CompileTimeValueRequired",
            DiagnosticCode::UnrollLimit => "UnrollLimit",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message,
            span,
            position: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code: None,
            message,
            span,
            position: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn report<'a>(
        &'a self,
        filename: &'a str,
    ) -> ariadne::ReportBuilder<'a, (&'a str, std::ops::Range<usize>)> {
        use ariadne::{Color, Label, Report, ReportKind};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(code) = self.code {
            report = report.with_code(code.as_str());
        }

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report
    }

    /// Render the diagnostic to stderr using ariadne.
    ///
    /// `source` is the rendered call site the span points into.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::Source;

        if let Err(e) = self
            .report(filename)
            .finish()
            .eprint((filename, Source::from(source)))
        {
            tracing::error!(error = %e, "failed to render diagnostic");
        }
    }

    /// Render the diagnostic without colors into a string.
    pub fn render_to_string(&self, filename: &str, source: &str) -> String {
        use ariadne::{Config, Source};

        let mut out = Vec::new();
        let written = self
            .report(filename)
            .with_config(Config::default().with_color(false))
            .finish()
            .write((filename, Source::from(source)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.message.clone(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
