//! Confirmation gate for destructive and broad-effect tools
//!
//! Handlers compute an impact estimate (cells, messages, "is public") and
//! hand it to [`evaluate`] together with the caller's confirmation flag. The
//! gate either allows the mutation or blocks it with a [`Preview`] telling
//! the caller what would happen and how to re-invoke with confirmation.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Largest number of cells a range clear may touch without confirmation
pub const RANGE_CLEAR_THRESHOLD: u64 = 100;

/// Sample size for previews listing messages or ids
pub const SHORT_PREVIEW_LIMIT: usize = 10;

/// Sample size for previews listing matches or keys
pub const LONG_PREVIEW_LIMIT: usize = 20;

/// When an operation requires explicit confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Confirmation is mandatory whatever the impact
    Always,
    /// Confirmation is required once the impact exceeds the limit
    Above(u64),
}

/// Outcome of the gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Proceed with the mutation
    Allow,
    /// Do not mutate; report the preview instead
    Blocked(Preview),
}

impl GateDecision {
    /// Whether the gate allowed the operation
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// Decide whether an operation may proceed
///
/// An explicit confirmation always wins. Without one, the operation is
/// allowed only when the threshold is a limit and the impact does not exceed
/// it. The preview is built only when the gate blocks.
pub fn evaluate<F>(impact: u64, confirmed: bool, threshold: Threshold, preview: F) -> GateDecision
where
    F: FnOnce() -> Preview,
{
    if confirmed {
        return GateDecision::Allow;
    }

    match threshold {
        Threshold::Above(limit) if impact <= limit => GateDecision::Allow,
        _ => GateDecision::Blocked(preview()),
    }
}

/// Style of a blocked-operation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    /// Nothing was changed; this is what would change
    DryRun,
    /// The operation needs an explicit confirmation flag
    ConfirmationRequired,
    /// The operation would expose data publicly
    PublicAccessBlocked,
}

/// The exact re-invocation that lifts the block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryHint {
    /// Tool to call again
    pub tool: String,

    /// Argument to set
    pub argument: String,

    /// Value the argument must take
    pub value: bool,
}

/// What a blocked operation would have done
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    /// Report style
    pub kind: PreviewKind,

    /// One-line description of the operation
    pub headline: String,

    /// Labelled figures (counts, sizes, percentages)
    pub facts: Vec<(String, String)>,

    /// Sample of affected items
    pub samples: Vec<String>,

    /// Affected items not shown in `samples`
    pub omitted: usize,

    /// Warnings about the consequences
    pub warnings: Vec<String>,

    /// How to re-invoke with confirmation
    pub retry: RetryHint,

    /// Safer alternative, if any
    pub suggestion: Option<String>,
}

impl Preview {
    /// Start a preview for `tool`, lifted by setting `argument` to `value`
    pub fn new(
        kind: PreviewKind,
        headline: impl Into<String>,
        tool: &str,
        argument: &str,
        value: bool,
    ) -> Self {
        Self {
            kind,
            headline: headline.into(),
            facts: Vec::new(),
            samples: Vec::new(),
            omitted: 0,
            warnings: Vec::new(),
            retry: RetryHint {
                tool: tool.to_string(),
                argument: argument.to_string(),
                value,
            },
            suggestion: None,
        }
    }

    /// Add a labelled figure
    pub fn fact(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.push((label.into(), value.into()));
        self
    }

    /// Add sample items, keeping at most `limit`
    pub fn samples<I>(mut self, items: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut total = 0;
        for item in items {
            if self.samples.len() < limit {
                self.samples.push(item);
            }
            total += 1;
        }
        self.omitted = total - self.samples.len();
        self
    }

    /// Count further items beyond the samples already given
    pub fn omitted(mut self, omitted: usize) -> Self {
        self.omitted += omitted;
        self
    }

    /// Add a warning
    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Add a safer alternative
    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Machine-readable form for clients that retry automatically
    pub fn to_structured(&self) -> Value {
        json!({
            "status": "blocked",
            "kind": self.kind,
            "retry": self.retry,
            "omitted": self.omitted,
        })
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = match self.kind {
            PreviewKind::DryRun => "DRY RUN",
            PreviewKind::ConfirmationRequired => "CONFIRMATION REQUIRED",
            PreviewKind::PublicAccessBlocked => "PUBLIC ACCESS BLOCKED",
        };
        writeln!(f, "{}: {}", banner, self.headline)?;

        if !self.facts.is_empty() {
            writeln!(f)?;
            for (label, value) in &self.facts {
                writeln!(f, "  - {}: {}", label, value)?;
            }
        }

        if !self.samples.is_empty() {
            writeln!(f)?;
            writeln!(f, "Preview:")?;
            for sample in &self.samples {
                writeln!(f, "  - {}", sample)?;
            }
            if self.omitted > 0 {
                writeln!(f, "  ... and {} more", self.omitted)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            for warning in &self.warnings {
                writeln!(f, "WARNING: {}", warning)?;
            }
        }

        writeln!(f)?;
        write!(
            f,
            "To proceed, call {} again with {}={}",
            self.retry.tool, self.retry.argument, self.retry.value
        )?;

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSafer option: {}", suggestion)?;
        }

        Ok(())
    }
}

/// Filled share of a range, in percent; 0 for an empty range
pub fn filled_percent(filled: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        filled as f64 / total as f64 * 100.0
    }
}

/// Format a count with thousands separators
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview() -> Preview {
        Preview::new(
            PreviewKind::ConfirmationRequired,
            "Delete email 123",
            "delete_email",
            "confirm",
            true,
        )
    }

    #[test]
    fn test_confirmed_always_allows() {
        for impact in [0, 1, 100, 101, u64::MAX] {
            for threshold in [Threshold::Always, Threshold::Above(0), Threshold::Above(100)] {
                assert_eq!(
                    evaluate(impact, true, threshold, preview),
                    GateDecision::Allow
                );
            }
        }
    }

    #[test]
    fn test_range_clear_boundary() {
        let threshold = Threshold::Above(RANGE_CLEAR_THRESHOLD);
        assert!(evaluate(100, false, threshold, preview).is_allowed());
        assert!(!evaluate(101, false, threshold, preview).is_allowed());
    }

    #[test]
    fn test_always_blocks_without_confirmation() {
        assert!(!evaluate(0, false, Threshold::Always, preview).is_allowed());
        assert!(!evaluate(1, false, Threshold::Always, preview).is_allowed());
    }

    #[test]
    fn test_preview_built_only_when_blocking() {
        let decision = evaluate(5, false, Threshold::Above(10), || {
            panic!("preview must not be built")
        });
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_samples_are_capped() {
        let items = (1..=25).map(|i| format!("msg-{}", i));
        let p = preview().samples(items, SHORT_PREVIEW_LIMIT);

        assert_eq!(p.samples.len(), 10);
        assert_eq!(p.omitted, 15);
        assert!(p.to_string().contains("... and 15 more"));
    }

    #[test]
    fn test_display_includes_retry_instruction() {
        let text = preview()
            .fact("Message", "123")
            .warning("This cannot be undone")
            .to_string();

        assert!(text.starts_with("CONFIRMATION REQUIRED: Delete email 123"));
        assert!(text.contains("  - Message: 123"));
        assert!(text.contains("WARNING: This cannot be undone"));
        assert!(text.contains("To proceed, call delete_email again with confirm=true"));
    }

    #[test]
    fn test_structured_form() {
        let value = preview().to_structured();
        assert_eq!(value["status"], "blocked");
        assert_eq!(value["kind"], "confirmation_required");
        assert_eq!(value["retry"]["tool"], "delete_email");
        assert_eq!(value["retry"]["argument"], "confirm");
        assert_eq!(value["retry"]["value"], true);
    }

    #[test]
    fn test_filled_percent_guards_zero() {
        assert_eq!(filled_percent(0, 0), 0.0);
        assert_eq!(filled_percent(50, 200), 25.0);
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
