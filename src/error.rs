//! Captured failures and the typed errors the engine raises itself.
//!
//! [`CaseError`] is the value recorded whenever something "throws" during a run: a case body, a
//! scope hook, a policy, a parameter source or a custom executor. Any `std::error::Error`
//! converts into it with `?`, and caught panics become `CaseError`s carrying the panic payload.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, Location};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::scope::HookPoint;

/// Where a failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureOrigin {
    ParameterGeneration,
    Policy,
    ScopeHook(HookPoint),
    CaseBody,
}

/// A captured failure: type label, message, trace frames and an optional inner error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseError {
    type_name: String,
    message: String,
    trace: Vec<String>,
    origin: FailureOrigin,
    inner: Option<Box<CaseError>>,
}

impl CaseError {
    /// Create an error with an explicit type label. The caller's location becomes the only frame.
    #[track_caller]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            type_name: type_name.into(),
            message: message.into(),
            trace: vec![format!("{}:{}:{}", location.file(), location.line(), location.column())],
            origin: FailureOrigin::CaseBody,
            inner: None,
        }
    }

    /// Shorthand for an untyped failure.
    #[track_caller]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            type_name: "panic".to_string(),
            message: casework_bus::panic_message(payload.as_ref()),
            trace: Vec::new(),
            origin: FailureOrigin::CaseBody,
            inner: None,
        }
    }

    pub fn with_origin(mut self, origin: FailureOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_inner(mut self, inner: CaseError) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    pub fn with_trace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace = frames.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_trace(mut self) -> Self {
        self.trace.clear();
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn origin(&self) -> FailureOrigin {
        self.origin
    }

    pub fn inner(&self) -> Option<&CaseError> {
        self.inner.as_deref()
    }

    /// Inner errors, outermost first (excluding `self`).
    pub fn chain(&self) -> impl Iterator<Item = &CaseError> {
        std::iter::successors(self.inner(), |error| error.inner())
    }
}

impl<E> From<E> for CaseError
where
    E: std::error::Error + 'static,
{
    fn from(error: E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(Self {
                type_name: type_label(cause),
                message: cause.to_string(),
                trace: Vec::new(),
                origin: FailureOrigin::CaseBody,
                inner: None,
            });
            source = cause.source();
        }
        let inner = causes.into_iter().rev().fold(None, |inner: Option<Box<CaseError>>, mut cause| {
            cause.inner = inner;
            Some(Box::new(cause))
        });
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            trace: Vec::new(),
            origin: FailureOrigin::CaseBody,
            inner,
        }
    }
}

impl fmt::Display for CaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Sources are only reachable as `dyn Error`; the head of their `Debug` output is the best label.
fn type_label(error: &dyn std::error::Error) -> String {
    let debug = format!("{error:?}");
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if head.is_empty() { "Error".to_string() } else { head }
}

/// Failures raised while invoking a case body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("Parameter count mismatch.")]
    ParameterCountMismatch { expected: usize, actual: usize },
}

/// Failures raised by a configured policy; the policy's own error becomes the inner error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Error raised while attempting to get a custom case name. Check the inner error for more details.")]
    CaseName,
    #[error("Error raised while attempting to run a custom case-skipping predicate. Check the inner error for more details.")]
    SkipPredicate,
    #[error("Error raised while attempting to get a custom case-skipped reason. Check the inner error for more details.")]
    SkipReason,
    #[error("Error raised while attempting to order cases. Check the inner error for more details.")]
    Ordering,
}

impl PolicyError {
    /// Wrap the policy's own failure.
    pub fn wrap(self, inner: CaseError) -> CaseError {
        CaseError::from(self)
            .with_origin(FailureOrigin::Policy)
            .with_inner(inner)
    }
}

/// Run user code, converting a panic into a `CaseError`.
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, CaseError>) -> Result<T, CaseError> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(CaseError::from_panic(payload)),
    }
}

/// Start and await user-supplied async code, converting a panic at either stage into a `CaseError`.
pub(crate) async fn guard_future<'a>(
    start: impl FnOnce() -> LocalBoxFuture<'a, Result<(), CaseError>>,
) -> Result<(), CaseError> {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(future) => future,
        Err(payload) => return Err(CaseError::from_panic(payload)),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(CaseError::from_panic(payload)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("could not load fixture")]
    struct FixtureError(#[source] std::io::Error);

    // ========================================
    // CaseError construction
    // ========================================

    #[test]
    fn test_new_records_caller_location() {
        let error = CaseError::new("FailureException", "'Fail' failed!");
        assert_eq!(error.type_name(), "FailureException");
        assert_eq!(error.message(), "'Fail' failed!");
        assert_eq!(error.trace().len(), 1);
        assert!(error.trace()[0].starts_with("src/error.rs:"));
        assert_eq!(error.origin(), FailureOrigin::CaseBody);
    }

    #[test]
    fn test_from_error_builds_inner_chain() {
        let error = CaseError::from(FixtureError(std::io::Error::other("disk full")));
        assert!(error.type_name().ends_with("FixtureError"));
        assert_eq!(error.message(), "could not load fixture");
        let chain: Vec<&str> = error.chain().map(CaseError::message).collect();
        assert_eq!(chain, ["disk full"]);
    }

    #[test]
    fn test_question_mark_conversion() {
        fn parse(text: &str) -> Result<i32, CaseError> {
            Ok(text.parse::<i32>()?)
        }
        let error = parse("nope").unwrap_err();
        assert!(error.type_name().ends_with("ParseIntError"));
        assert_eq!(error.message(), "invalid digit found in string");
    }

    #[test]
    fn test_from_panic_uses_payload() {
        let error = CaseError::from_panic(Box::new("boom"));
        assert_eq!(error.type_name(), "panic");
        assert_eq!(error.message(), "boom");
        assert!(error.trace().is_empty());
    }

    #[test]
    fn test_display() {
        let error = CaseError::new("StubError", "broken").without_trace();
        assert_eq!(error.to_string(), "StubError: broken");
    }

    // ========================================
    // Typed errors
    // ========================================

    #[test]
    fn test_parameter_count_mismatch_message() {
        let error = InvocationError::ParameterCountMismatch { expected: 1, actual: 0 };
        assert_eq!(error.to_string(), "Parameter count mismatch.");
    }

    #[test]
    fn test_policy_wrap_keeps_original_as_inner() {
        let original = CaseError::msg("bad comparator");
        let wrapped = PolicyError::Ordering.wrap(original.clone());
        assert_eq!(
            wrapped.message(),
            "Error raised while attempting to order cases. Check the inner error for more details."
        );
        assert_eq!(wrapped.origin(), FailureOrigin::Policy);
        assert_eq!(wrapped.inner(), Some(&original));
    }

    // ========================================
    // Guards
    // ========================================

    #[test]
    fn test_guard_passes_results_through() {
        assert_eq!(guard(|| Ok::<_, CaseError>(3)).unwrap(), 3);
        let error = guard(|| Err::<(), _>(CaseError::msg("nope"))).unwrap_err();
        assert_eq!(error.message(), "nope");
    }

    #[test]
    fn test_guard_catches_panics() {
        let error = guard(|| -> Result<(), CaseError> { panic!("exploded") }).unwrap_err();
        assert_eq!(error.type_name(), "panic");
        assert_eq!(error.message(), "exploded");
    }

    async fn explode_later() -> Result<(), CaseError> {
        tokio::task::yield_now().await;
        panic!("late failure")
    }

    #[tokio::test]
    async fn test_guard_future_catches_panics_while_polling() {
        let error = guard_future(|| explode_later().boxed_local()).await.unwrap_err();
        assert_eq!(error.message(), "late failure");
    }

    #[tokio::test]
    async fn test_guard_future_catches_panics_while_starting() {
        let error = guard_future(|| -> LocalBoxFuture<'static, Result<(), CaseError>> { panic!("early failure") })
            .await
            .unwrap_err();
        assert_eq!(error.message(), "early failure");
    }
}
