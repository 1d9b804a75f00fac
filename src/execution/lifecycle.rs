//! The default executor: nested setup/teardown scopes around every case.
//!
//! ```text
//! AssemblySetup
//! for each class:   ClassSetup
//!   for each test:  TestSetup
//!     for each case:  CaseSetup, body, CaseTeardown
//!                   TestTeardown
//!                   ClassTeardown
//! AssemblyTeardown
//! ```
//!
//! A hook failure adds failure results for the cases in its scope; it never replaces a result
//! that was already recorded.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::case::{Case, CaseOutput};
use crate::error::{CaseError, FailureOrigin, guard_future};
use crate::execution::{Execution, Test, TestAssembly, TestClass};
use crate::method::TestName;
use crate::scope::HookPoint;

pub type HookFuture = LocalBoxFuture<'static, Result<(), CaseError>>;

/// A setup or teardown hook.
pub type Hook = Rc<dyn Fn(HookContext) -> HookFuture>;

/// What a hook is told about where it runs.
#[derive(Debug, Clone)]
pub struct HookContext {
    point: HookPoint,
    class: Option<String>,
    test: Option<TestName>,
    case: Option<String>,
    output: Option<CaseOutput>,
}

impl HookContext {
    fn new(point: HookPoint) -> Self {
        Self {
            point,
            class: None,
            test: None,
            case: None,
            output: None,
        }
    }

    fn for_class(point: HookPoint, class: &TestClass) -> Self {
        Self {
            class: Some(class.name().to_string()),
            ..Self::new(point)
        }
    }

    fn for_test(point: HookPoint, test: &Test) -> Self {
        Self {
            class: Some(test.name().class().to_string()),
            test: Some(test.name().clone()),
            ..Self::new(point)
        }
    }

    pub(crate) fn for_case(point: HookPoint, case: &Case) -> Self {
        Self {
            class: Some(case.test().class().to_string()),
            test: Some(case.test().clone()),
            case: Some(case.name().to_string()),
            output: Some(case.output().clone()),
            ..Self::new(point)
        }
    }

    pub fn point(&self) -> HookPoint {
        self.point
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn test(&self) -> Option<&TestName> {
        self.test.as_ref()
    }

    pub fn case(&self) -> Option<&str> {
        self.case.as_deref()
    }

    /// The case's output sink; only present for case-scope hooks.
    pub fn output(&self) -> Option<&CaseOutput> {
        self.output.as_ref()
    }
}

/// Nested-scope executor with eight optional hooks.
#[derive(Clone, Default)]
pub struct Lifecycle {
    hooks: HashMap<HookPoint, Hook>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook for `point`, replacing any previous one.
    pub fn with_hook<F, Fut>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.hooks.insert(point, Rc::new(move |context: HookContext| hook(context).boxed_local()));
        self
    }

    pub fn with_assembly_setup<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::ASSEMBLY_SETUP, hook)
    }

    pub fn with_assembly_teardown<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::ASSEMBLY_TEARDOWN, hook)
    }

    pub fn with_class_setup<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::CLASS_SETUP, hook)
    }

    pub fn with_class_teardown<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::CLASS_TEARDOWN, hook)
    }

    pub fn with_test_setup<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::TEST_SETUP, hook)
    }

    pub fn with_test_teardown<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::TEST_TEARDOWN, hook)
    }

    pub fn with_case_setup<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::CASE_SETUP, hook)
    }

    pub fn with_case_teardown<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), CaseError>> + 'static,
    {
        self.with_hook(HookPoint::CASE_TEARDOWN, hook)
    }

    pub fn has_hook(&self, point: HookPoint) -> bool {
        self.hooks.contains_key(&point)
    }

    async fn call(&self, context: HookContext) -> Result<(), CaseError> {
        match self.hooks.get(&context.point()) {
            Some(hook) => call_hook(hook, context).await,
            None => Ok(()),
        }
    }

    /// AssemblySetup failing skips everything else, AssemblyTeardown included.
    #[tracing::instrument(skip_all, fields(assembly = assembly.name(), classes = assembly.classes().len()))]
    async fn run_assembly(&self, assembly: &TestAssembly) -> Result<(), CaseError> {
        self.call(HookContext::new(HookPoint::ASSEMBLY_SETUP)).await?;
        for class in assembly.classes() {
            self.run_class(class).await;
        }
        self.call(HookContext::new(HookPoint::ASSEMBLY_TEARDOWN)).await
    }

    #[tracing::instrument(skip_all, fields(class = class.name(), tests = class.tests().len()))]
    async fn run_class(&self, class: &TestClass) {
        class.enter().await;
        match self.call(HookContext::for_class(HookPoint::CLASS_SETUP, class)).await {
            Ok(()) => {
                for test in class.tests() {
                    self.run_test(test).await;
                }
            }
            Err(error) => class.fail(error).await,
        }
        if let Err(error) = self.call(HookContext::for_class(HookPoint::CLASS_TEARDOWN, class)).await {
            class.fail(error).await;
        }
    }

    async fn run_test(&self, test: &Test) {
        if let Err(error) = self.call(HookContext::for_test(HookPoint::TEST_SETUP, test)).await {
            test.fail(error).await;
            return;
        }
        let setup = self.hooks.get(&HookPoint::CASE_SETUP);
        let teardown = self.hooks.get(&HookPoint::CASE_TEARDOWN);
        for parameters in test.parameter_sets() {
            test.run_between(parameters, setup, teardown).await;
        }
        if let Err(error) = self.call(HookContext::for_test(HookPoint::TEST_TEARDOWN, test)).await {
            test.fail(error).await;
        }
    }
}

impl Execution for Lifecycle {
    fn run<'a>(&'a self, assembly: &'a TestAssembly) -> LocalBoxFuture<'a, Result<(), CaseError>> {
        self.run_assembly(assembly).boxed_local()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut points: Vec<String> = self.hooks.keys().map(ToString::to_string).collect();
        points.sort();
        f.debug_struct("Lifecycle").field("hooks", &points).finish()
    }
}

/// Invoke `hook`, tagging any failure (error or panic) with the hook point.
pub(crate) async fn call_hook(hook: &Hook, context: HookContext) -> Result<(), CaseError> {
    let point = context.point();
    guard_future(|| hook(context)).await.map_err(|error| {
        tracing::warn!(hook = %point, error = %error, "scope hook failed");
        error.with_origin(FailureOrigin::ScopeHook(point))
    })
}
