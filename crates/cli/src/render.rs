//! Pretty diagnostic rendering using ariadne.
//!
//! Converts a dispatch failure's [`Diagnostic`] into an ariadne [`Report`]
//! pointing into the input line. JSON output embeds the diagnostic as-is.

use std::io::{self, IsTerminal};

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use cmdtree_diagnostics::{Diagnostic, Severity};

// ── Output format ───────────────────────────────────────────────────────

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Coloured, source-annotated output (ariadne).
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, else pretty on a TTY and JSON when piped.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Severity mapping ────────────────────────────────────────────────────

fn report_kind(severity: &Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Info => ReportKind::Advice,
        _ => ReportKind::Warning,
    }
}

fn severity_color(severity: &Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warn => Color::Yellow,
        Severity::Info => Color::Blue,
        _ => Color::White,
    }
}

// ── Pretty rendering ────────────────────────────────────────────────────

/// Render `diag` against the dispatched `input` to stderr.
///
/// With a span the report underlines the offending input; without one
/// (permission and handler failures) it is a single message line.
pub(crate) fn render_pretty(input: &str, diag: &Diagnostic) {
    const NAME: &str = "<input>";

    let Some(span) = diag.span else {
        eprintln!("error[{}]: {}", diag.id, diag.message);
        if let Some(explanation) = diag.explain() {
            eprintln!("  = help: {explanation}");
        }
        return;
    };

    let start = span.start.min(input.len());
    let end = span.end.min(input.len()).max(start);
    // Zero-width spans (input ended early) still need a visible marker.
    let range = if start == end { start..end + 1 } else { start..end };

    let mut builder = Report::build(report_kind(&diag.severity), (NAME, range.clone()))
        .with_code(diag.id.as_ref())
        .with_message(&diag.message)
        .with_config(Config::default().with_compact(false))
        .with_label(
            Label::new((NAME, range))
                .with_message(label_message(diag))
                .with_color(severity_color(&diag.severity)),
        );
    if let Some(explanation) = diag.explain() {
        builder = builder.with_help(explanation);
    }
    // The padding space gives end-of-input spans a column to point at.
    let padded = format!("{input} ");
    let mut cache = (NAME, Source::from(padded.as_str()));
    builder.finish().eprint(&mut cache).ok();
}

/// A short label from the context entries that say what was being parsed.
fn label_message(diag: &Diagnostic) -> String {
    let Some(ctx) = &diag.context else {
        return diag.message.clone();
    };
    let parts: Vec<String> = ["command", "parameter", "expected"]
        .iter()
        .filter_map(|k| ctx.get(*k).filter(|v| !v.is_empty()).map(|v| format!("{k}={v}")))
        .collect();
    if parts.is_empty() {
        diag.message.clone()
    } else {
        parts.join(", ")
    }
}
