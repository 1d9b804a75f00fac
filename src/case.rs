//! Cases: one invocation of a test method with one resolved parameter set.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::error::CaseError;
use crate::method::{TestMethod, TestName};

/// One resolved parameter list; values render as JSON text in case names.
pub type ParameterSet = Vec<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    NotStarted,
    Passed,
    Failed,
    Skipped,
}

/// Captured output of one case. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaseOutput(Rc<RefCell<String>>);

impl CaseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, text: &str) {
        self.0.borrow_mut().push_str(text);
    }

    /// Append `text` followed by a newline.
    pub fn line(&self, text: impl fmt::Display) {
        let mut buffer = self.0.borrow_mut();
        // Writing into a String cannot fail.
        let _ = fmt::Write::write_fmt(&mut *buffer, format_args!("{text}\n"));
    }

    pub fn text(&self) -> String {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl fmt::Write for CaseOutput {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

/// What a case body receives: its name, parameters and output sink.
#[derive(Debug, Clone)]
pub struct CaseContext {
    name: String,
    parameters: ParameterSet,
    output: CaseOutput,
}

impl CaseContext {
    pub fn new(name: impl Into<String>, parameters: ParameterSet, output: CaseOutput) -> Self {
        Self {
            name: name.into(),
            parameters,
            output,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index)
    }

    pub fn output(&self) -> &CaseOutput {
        &self.output
    }
}

/// One invocation of a test method.
///
/// State moves forward only: once failed, a case stays failed, and passing or skipping only
/// applies to a case that has not finished yet.
#[derive(Debug, Clone)]
pub struct Case {
    method: Rc<TestMethod>,
    parameters: ParameterSet,
    name: String,
    state: CaseState,
    errors: Vec<CaseError>,
    output: CaseOutput,
    duration: Duration,
}

impl Case {
    pub fn new(method: Rc<TestMethod>, parameters: ParameterSet) -> Self {
        let name = Self::default_name(method.name(), &parameters);
        Self {
            method,
            parameters,
            name,
            state: CaseState::NotStarted,
            errors: Vec::new(),
            output: CaseOutput::new(),
            duration: Duration::ZERO,
        }
    }

    /// `Class.Method`, or `Class.Method(p1, p2)` with each parameter as JSON text.
    pub fn default_name(test: &TestName, parameters: &[Value]) -> String {
        if parameters.is_empty() {
            return test.full().to_string();
        }
        let rendered: Vec<String> = parameters.iter().map(Value::to_string).collect();
        format!("{}({})", test.full(), rendered.join(", "))
    }

    pub fn test(&self) -> &TestName {
        self.method.name()
    }

    pub fn method(&self) -> &TestMethod {
        &self.method
    }

    pub(crate) fn method_rc(&self) -> &Rc<TestMethod> {
        &self.method
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CaseState {
        self.state
    }

    pub fn errors(&self) -> &[CaseError] {
        &self.errors
    }

    pub fn output(&self) -> &CaseOutput {
        &self.output
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub(crate) fn fail(&mut self, error: CaseError) {
        self.state = CaseState::Failed;
        self.errors.push(error);
    }

    pub(crate) fn pass(&mut self) {
        if self.state == CaseState::NotStarted {
            self.state = CaseState::Passed;
        }
    }

    pub(crate) fn skip(&mut self) {
        if self.state == CaseState::NotStarted {
            self.state = CaseState::Skipped;
        }
    }

    pub(crate) fn context(&self) -> CaseContext {
        CaseContext::new(self.name.clone(), self.parameters.clone(), self.output.clone())
    }

    /// A fresh, unstarted case with the same identity and no captured output.
    pub(crate) fn reset(&self) -> Case {
        Case {
            method: Rc::clone(&self.method),
            parameters: self.parameters.clone(),
            name: self.name.clone(),
            state: CaseState::NotStarted,
            errors: Vec::new(),
            output: CaseOutput::new(),
            duration: Duration::ZERO,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn method() -> Rc<TestMethod> {
        Rc::new(TestMethod::sync("Sample.Class", "Method", |_| Ok(())))
    }

    // ========================================
    // Naming
    // ========================================

    #[test]
    fn test_default_name_without_parameters() {
        let case = Case::new(method(), vec![]);
        assert_eq!(case.name(), "Sample.Class.Method");
    }

    #[test]
    fn test_default_name_renders_json_parameters() {
        let case = Case::new(method(), vec![json!(1), json!("A"), json!(true), json!(null)]);
        assert_eq!(case.name(), "Sample.Class.Method(1, \"A\", true, null)");
    }

    // ========================================
    // State transitions
    // ========================================

    #[test]
    fn test_failure_is_sticky() {
        let mut case = Case::new(method(), vec![]);
        case.fail(CaseError::msg("first"));
        case.pass();
        case.skip();
        assert_eq!(case.state(), CaseState::Failed);
        case.fail(CaseError::msg("second"));
        let messages: Vec<&str> = case.errors().iter().map(CaseError::message).collect();
        assert_eq!(messages, ["first", "second"]);
    }

    #[test]
    fn test_pass_then_fail() {
        let mut case = Case::new(method(), vec![]);
        case.pass();
        assert_eq!(case.state(), CaseState::Passed);
        case.fail(CaseError::msg("teardown"));
        assert_eq!(case.state(), CaseState::Failed);
    }

    #[test]
    fn test_skip_only_from_not_started() {
        let mut case = Case::new(method(), vec![]);
        case.skip();
        case.pass();
        assert_eq!(case.state(), CaseState::Skipped);
    }

    #[test]
    fn test_reset_keeps_identity_only() {
        let mut case = Case::new(method(), vec![json!(2)]);
        case.set_name("custom");
        case.output().line("noise");
        case.fail(CaseError::msg("boom"));
        let fresh = case.reset();
        assert_eq!(fresh.name(), "custom");
        assert_eq!(fresh.parameters(), [json!(2)]);
        assert_eq!(fresh.state(), CaseState::NotStarted);
        assert!(fresh.errors().is_empty());
        assert!(fresh.output().is_empty());
    }

    // ========================================
    // Output
    // ========================================

    #[test]
    fn test_output_is_shared_between_clones() {
        use std::fmt::Write as _;

        let output = CaseOutput::new();
        let mut writer = output.clone();
        write!(writer, "a{}", 1).unwrap();
        output.line("b");
        assert_eq!(output.text(), "a1b\n");
    }

    #[test]
    fn test_context_carries_identity() {
        let case = Case::new(method(), vec![json!(5)]);
        let context = case.context();
        assert_eq!(context.name(), "Sample.Class.Method(5)");
        assert_eq!(context.parameter(0), Some(&json!(5)));
        assert_eq!(context.parameter(1), None);
        context.output().write("x");
        assert_eq!(case.output().text(), "x");
    }
}
