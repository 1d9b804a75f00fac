//! Discovered test methods and their grouping into classes.
//!
//! Discovery itself happens outside the engine: callers register [`TestMethod`] values on an
//! [`Assembly`], and the assembly groups them by class in order of first appearance.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::case::{CaseContext, ParameterSet};
use crate::error::{CaseError, FailureOrigin, InvocationError, guard_future};

/// Future returned by a case body.
pub type BodyFuture = LocalBoxFuture<'static, Result<(), CaseError>>;

/// A callable case body.
pub type Body = Rc<dyn Fn(CaseContext) -> BodyFuture>;

/// Fully-qualified test identity: `Class.Method`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TestName {
    class: String,
    method: String,
    full: String,
}

impl TestName {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        let class = class.into();
        let method = method.into();
        let full = format!("{class}.{method}");
        Self { class, method, full }
    }

    /// Split a full name at its last `.`; a name without one is a method with an empty class.
    pub fn parse(full: &str) -> Self {
        match full.rsplit_once('.') {
            Some((class, method)) => Self::new(class, method),
            None => Self::new("", full),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn full(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// A discovered test method: identity, declared arity and inputs, attributes, and a body.
#[derive(Clone)]
pub struct TestMethod {
    name: TestName,
    arity: usize,
    inputs: Vec<ParameterSet>,
    attributes: Vec<String>,
    body: Body,
}

impl TestMethod {
    /// Register an async body.
    pub fn new<F, Fut>(class: impl Into<String>, method: impl Into<String>, body: F) -> Self
    where
        F: Fn(CaseContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        Self {
            name: TestName::new(class, method),
            arity: 0,
            inputs: Vec::new(),
            attributes: Vec::new(),
            body: Rc::new(move |context: CaseContext| body(context).boxed_local()),
        }
    }

    /// Register a synchronous body.
    pub fn sync<F>(class: impl Into<String>, method: impl Into<String>, body: F) -> Self
    where
        F: Fn(&CaseContext) -> Result<(), CaseError> + 'static,
    {
        let body = Rc::new(body);
        Self::new(class, method, move |context: CaseContext| {
            let body = Rc::clone(&body);
            async move { body(&context) }
        })
    }

    /// Number of parameters the body expects.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    /// Declare one parameter set, the analogue of an input attribute.
    pub fn with_input<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.inputs.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }

    pub fn name(&self) -> &TestName {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn inputs(&self) -> &[ParameterSet] {
        &self.inputs
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Run the body for one case. Arity mismatches fail before the body is called.
    pub(crate) async fn invoke(&self, context: CaseContext) -> Result<(), CaseError> {
        let actual = context.parameters().len();
        if actual != self.arity {
            return Err(CaseError::from(InvocationError::ParameterCountMismatch {
                expected: self.arity,
                actual,
            }));
        }
        guard_future(|| (self.body)(context))
            .await
            .map_err(|error| error.with_origin(FailureOrigin::CaseBody))
    }
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("inputs", &self.inputs)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// The test methods of one class, in registration order.
#[derive(Debug, Clone)]
pub struct ClassGrouping {
    name: String,
    methods: Vec<Rc<TestMethod>>,
}

impl ClassGrouping {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Rc<TestMethod>] {
        &self.methods
    }
}

/// A flat, ordered collection of discovered test methods.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    name: String,
    methods: Vec<Rc<TestMethod>>,
}

impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: TestMethod) -> Self {
        self.push(method);
        self
    }

    pub fn push(&mut self, method: TestMethod) {
        self.methods.push(Rc::new(method));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Rc<TestMethod>] {
        &self.methods
    }

    /// Group methods by class, classes ordered by first appearance.
    pub fn classes(&self) -> Vec<ClassGrouping> {
        let mut classes: Vec<ClassGrouping> = Vec::new();
        for method in &self.methods {
            let class = method.name().class();
            match classes.iter_mut().find(|grouping| grouping.name == class) {
                Some(grouping) => grouping.methods.push(Rc::clone(method)),
                None => classes.push(ClassGrouping {
                    name: class.to_string(),
                    methods: vec![Rc::clone(method)],
                }),
            }
        }
        classes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::case::CaseOutput;
    use serde_json::json;

    fn context(parameters: ParameterSet) -> CaseContext {
        CaseContext::new("Sample.Case", parameters, CaseOutput::new())
    }

    // ========================================
    // TestName
    // ========================================

    #[test]
    fn test_name_full() {
        let name = TestName::new("Sample.Namespace.Class", "Method");
        assert_eq!(name.full(), "Sample.Namespace.Class.Method");
        assert_eq!(name.to_string(), "Sample.Namespace.Class.Method");
    }

    #[test]
    fn test_name_parse_splits_at_last_dot() {
        let name = TestName::parse("Sample.Namespace.Class.Method");
        assert_eq!(name.class(), "Sample.Namespace.Class");
        assert_eq!(name.method(), "Method");
    }

    #[test]
    fn test_name_parse_without_class() {
        let name = TestName::parse("Method");
        assert_eq!(name.class(), "");
        assert_eq!(name.method(), "Method");
    }

    // ========================================
    // TestMethod
    // ========================================

    #[test]
    fn test_builders() {
        let method = TestMethod::sync("Class", "Pass", |_| Ok(()))
            .with_arity(1)
            .with_input([1])
            .with_input([2])
            .with_attribute("slow");
        assert_eq!(method.arity(), 1);
        assert_eq!(method.inputs(), [vec![json!(1)], vec![json!(2)]]);
        assert!(method.has_attribute("slow"));
        assert!(!method.has_attribute("skip"));
    }

    #[tokio::test]
    async fn test_invoke_checks_arity() {
        let method = TestMethod::sync("Class", "Pass", |_| Ok(())).with_arity(1);
        let error = method.invoke(context(vec![])).await.unwrap_err();
        assert_eq!(error.message(), "Parameter count mismatch.");
        assert!(method.invoke(context(vec![json!(1)])).await.is_ok());
    }

    #[tokio::test]
    async fn test_invoke_passes_parameters() {
        let method = TestMethod::sync("Class", "Echo", |context| {
            let value = context.parameter(0).cloned().unwrap_or_default();
            context.output().line(value);
            Ok(())
        })
        .with_arity(1);
        let output = CaseOutput::new();
        method
            .invoke(CaseContext::new("Class.Echo(\"A\")", vec![json!("A")], output.clone()))
            .await
            .unwrap();
        assert_eq!(output.text(), "\"A\"\n");
    }

    #[tokio::test]
    async fn test_invoke_catches_body_panics() {
        let method = TestMethod::new("Class", "Panic", |_| async {
            assert_eq!(1 + 1, 3);
            Ok(())
        });
        let error = method.invoke(context(vec![])).await.unwrap_err();
        assert_eq!(error.type_name(), "panic");
        assert!(error.message().starts_with("assertion"));
        assert_eq!(error.origin(), FailureOrigin::CaseBody);
    }

    // ========================================
    // Assembly grouping
    // ========================================

    #[test]
    fn test_classes_group_by_first_appearance() {
        let assembly = Assembly::new("sample")
            .with_method(TestMethod::sync("B", "One", |_| Ok(())))
            .with_method(TestMethod::sync("A", "Two", |_| Ok(())))
            .with_method(TestMethod::sync("B", "Three", |_| Ok(())));

        let classes = assembly.classes();
        let names: Vec<&str> = classes.iter().map(ClassGrouping::name).collect();
        assert_eq!(names, ["B", "A"]);
        let methods: Vec<&str> = classes[0].methods().iter().map(|m| m.name().method()).collect();
        assert_eq!(methods, ["One", "Three"]);
    }

    #[test]
    fn test_debug_omits_body() {
        let method = TestMethod::sync("Class", "Pass", |_| Ok(()));
        let rendered = format!("{method:?}");
        assert!(rendered.contains("Class.Pass"));
        assert!(rendered.contains(".."));
    }
}
