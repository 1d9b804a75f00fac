//! Compound failure reports.
//!
//! A failed case can carry several errors: the primary failure plus secondary ones appended
//! later (an ordering failure on top of a naming failure, for example). [`CompoundError`]
//! flattens all of them, with their inner-error chains, into one readable trace:
//!
//! ```text
//! <primary message>
//! <primary trace>
//!
//! ------- Inner Exception: <type> -------
//! <message>
//! <trace>
//!
//! ===== Secondary Exception: <type> =====
//! <message>
//! <trace>
//! ```
//!
//! Which frames appear, and whether the primary counts as an assertion failure, is decided by an
//! [`AssertionFilter`].

use serde::Serialize;

use crate::error::CaseError;

/// Recognizes assertion failures and cleans up trace frames.
pub trait AssertionFilter {
    fn is_assertion_failure(&self, error: &CaseError) -> bool;

    fn filter_stack_trace(&self, error: &CaseError) -> String;
}

/// Panics whose message starts with `assertion` are assertion failures; every frame is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAssertionFilter;

impl AssertionFilter for DefaultAssertionFilter {
    fn is_assertion_failure(&self, error: &CaseError) -> bool {
        is_assertion_panic(error)
    }

    fn filter_stack_trace(&self, error: &CaseError) -> String {
        render_frames(error.trace().iter())
    }
}

/// Hides frames belonging to assertion libraries and recognizes their error types.
#[derive(Debug, Clone, Default)]
pub struct FrameFilter {
    hidden_frames: Vec<String>,
    assertion_types: Vec<String>,
}

impl FrameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any frame containing `pattern`.
    pub fn with_hidden_frame(mut self, pattern: impl Into<String>) -> Self {
        self.hidden_frames.push(pattern.into());
        self
    }

    /// Treat errors of this type as assertion failures.
    pub fn with_assertion_type(mut self, type_name: impl Into<String>) -> Self {
        self.assertion_types.push(type_name.into());
        self
    }
}

impl AssertionFilter for FrameFilter {
    fn is_assertion_failure(&self, error: &CaseError) -> bool {
        is_assertion_panic(error) || self.assertion_types.iter().any(|t| t == error.type_name())
    }

    fn filter_stack_trace(&self, error: &CaseError) -> String {
        let kept = error
            .trace()
            .iter()
            .filter(|frame| !self.hidden_frames.iter().any(|pattern| frame.contains(pattern.as_str())));
        render_frames(kept)
    }
}

fn is_assertion_panic(error: &CaseError) -> bool {
    error.type_name() == "panic" && error.message().starts_with("assertion")
}

fn render_frames<'a>(frames: impl Iterator<Item = &'a String>) -> String {
    frames.map(|frame| format!("   at {frame}")).collect::<Vec<_>>().join("\n")
}

/// One error with its trace already filtered, and its inner chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub type_name: String,
    pub message: String,
    pub stack_trace: String,
    pub inner: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    pub fn new(error: &CaseError, filter: &dyn AssertionFilter) -> Self {
        Self {
            type_name: error.type_name().to_string(),
            message: error.message().to_string(),
            stack_trace: filter.filter_stack_trace(error),
            inner: error.inner().map(|inner| Box::new(Self::new(inner, filter))),
        }
    }

    /// Inner errors, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorInfo> {
        std::iter::successors(self.inner.as_deref(), |info| info.inner.as_deref())
    }
}

/// Immutable, flattened view of every error captured by a failed case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundError {
    primary: ErrorInfo,
    secondary: Vec<ErrorInfo>,
    is_assertion: bool,
    compound_trace: String,
}

impl CompoundError {
    pub fn new(primary: &CaseError, secondary: &[CaseError], filter: &dyn AssertionFilter) -> Self {
        let is_assertion = filter.is_assertion_failure(primary);
        let primary = ErrorInfo::new(primary, filter);
        let secondary: Vec<ErrorInfo> = secondary.iter().map(|error| ErrorInfo::new(error, filter)).collect();
        let compound_trace = compound_trace(&primary, &secondary);
        Self {
            primary,
            secondary,
            is_assertion,
            compound_trace,
        }
    }

    /// `None` when there is nothing to report.
    pub fn from_errors(errors: &[CaseError], filter: &dyn AssertionFilter) -> Option<Self> {
        errors
            .split_first()
            .map(|(primary, secondary)| Self::new(primary, secondary, filter))
    }

    pub fn primary(&self) -> &ErrorInfo {
        &self.primary
    }

    pub fn secondary(&self) -> &[ErrorInfo] {
        &self.secondary
    }

    pub fn type_name(&self) -> &str {
        &self.primary.type_name
    }

    pub fn message(&self) -> &str {
        &self.primary.message
    }

    pub fn is_assertion(&self) -> bool {
        self.is_assertion
    }

    pub fn display_name(&self) -> &str {
        if self.is_assertion { "Assertion Failure" } else { self.type_name() }
    }

    /// The full rendering, starting with the primary message.
    pub fn compound_trace(&self) -> &str {
        &self.compound_trace
    }

    /// Everything after the primary message line.
    pub fn details(&self) -> &str {
        let skip = self.primary.message.len() + 1;
        self.compound_trace.get(skip..).unwrap_or_default()
    }

    /// The compound trace, preceded by the primary type unless it is an assertion failure.
    pub fn typed_trace(&self) -> String {
        if self.is_assertion {
            self.compound_trace.clone()
        } else {
            format!("{}\n{}", self.type_name(), self.compound_trace)
        }
    }
}

fn compound_trace(primary: &ErrorInfo, secondary: &[ErrorInfo]) -> String {
    let mut out = String::new();
    push_block(&mut out, primary);
    for info in secondary {
        out.push_str(&format!("\n\n===== Secondary Exception: {} =====\n", info.type_name));
        push_block(&mut out, info);
    }
    out
}

/// Message and trace of `info`, then each inner error under its own heading.
fn push_block(out: &mut String, info: &ErrorInfo) {
    out.push_str(&info.message);
    out.push('\n');
    out.push_str(&info.stack_trace);
    for inner in info.chain() {
        out.push_str(&format!("\n\n------- Inner Exception: {} -------\n", inner.type_name));
        out.push_str(&inner.message);
        out.push('\n');
        out.push_str(&inner.stack_trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;

    fn error(type_name: &str, message: &str, frames: &[&str]) -> CaseError {
        CaseError::new(type_name, message).with_trace(frames.iter().copied())
    }

    // ========================================
    // Filters
    // ========================================

    #[test]
    fn test_default_filter_recognizes_assertion_panics() {
        let filter = DefaultAssertionFilter;
        let assertion = CaseError::from_panic(Box::new("assertion `left == right` failed".to_string()));
        let other = CaseError::from_panic(Box::new("index out of bounds"));
        assert!(filter.is_assertion_failure(&assertion));
        assert!(!filter.is_assertion_failure(&other));
        assert!(!filter.is_assertion_failure(&error("assertion", "assertion", &[])));
    }

    #[test]
    fn test_default_filter_renders_frames() {
        let filter = DefaultAssertionFilter;
        let rendered = filter.filter_stack_trace(&error("E", "m", &["a.rs:1:1", "b.rs:2:2"]));
        assert_eq!(rendered, "   at a.rs:1:1\n   at b.rs:2:2");
    }

    #[test]
    fn test_frame_filter_hides_library_frames() {
        let filter = FrameFilter::new()
            .with_hidden_frame("assertions/")
            .with_assertion_type("AssertionError");
        let failure = error("AssertionError", "1 != 2", &["assertions/eq.rs:9:1", "tests/sample.rs:4:5"]);
        assert!(filter.is_assertion_failure(&failure));
        assert_eq!(filter.filter_stack_trace(&failure), "   at tests/sample.rs:4:5");
    }

    // ========================================
    // Compound rendering
    // ========================================

    #[test]
    fn test_from_errors_empty_is_none() {
        assert!(CompoundError::from_errors(&[], &DefaultAssertionFilter).is_none());
    }

    #[test]
    fn test_compound_trace_with_inner_and_secondary() {
        let primary = error("PrimaryError", "Primary Exception!", &["lib.rs:10:5"])
            .with_inner(error("AggregateError", "One or more errors occurred.", &["lib.rs:8:5"])
                .with_inner(error("DivideByZero", "Divide by Zero Exception!", &["lib.rs:6:5"])));
        let secondary = PolicyError::Ordering.wrap(error("OrderError", "bad order", &["order.rs:1:1"]));

        let compound = CompoundError::new(&primary, &[secondary], &DefaultAssertionFilter);

        insta::assert_snapshot!(compound.compound_trace(), @r"
        Primary Exception!
           at lib.rs:10:5

        ------- Inner Exception: AggregateError -------
        One or more errors occurred.
           at lib.rs:8:5

        ------- Inner Exception: DivideByZero -------
        Divide by Zero Exception!
           at lib.rs:6:5

        ===== Secondary Exception: casework::error::PolicyError =====
        Error raised while attempting to order cases. Check the inner error for more details.


        ------- Inner Exception: OrderError -------
        bad order
           at order.rs:1:1
        ");
    }

    #[test]
    fn test_typed_trace_and_display_name() {
        let failure = error("FailureException", "'Fail' failed!", &["sample.rs:3:9"]);
        let compound = CompoundError::new(&failure, &[], &DefaultAssertionFilter);
        assert_eq!(compound.display_name(), "FailureException");
        assert_eq!(compound.typed_trace(), "FailureException\n'Fail' failed!\n   at sample.rs:3:9");
        assert_eq!(compound.details(), "   at sample.rs:3:9");
    }

    #[test]
    fn test_assertion_typed_trace_omits_type() {
        let failure = CaseError::from_panic(Box::new("assertion failed: ready".to_string()));
        let compound = CompoundError::new(&failure, &[], &DefaultAssertionFilter);
        assert!(compound.is_assertion());
        assert_eq!(compound.display_name(), "Assertion Failure");
        assert_eq!(compound.typed_trace(), "assertion failed: ready\n");
    }
}
