//! Execution: the planned assembly handed to an executor, and the executor seam itself.
//!
//! An [`Execution`] receives a [`TestAssembly`] of [`TestClass`]es, each holding [`Test`]s whose
//! cases were already materialized, named, filtered and ordered. The executor decides what runs
//! and when; every [`Test`] operation records its own results.

mod lifecycle;
mod runner;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use futures::future::LocalBoxFuture;

pub use lifecycle::{Hook, HookContext, HookFuture, Lifecycle};
pub use runner::Runner;

use crate::case::{Case, CaseState, ParameterSet};
use crate::error::CaseError;
use crate::method::{TestMethod, TestName};
use crate::recorder::Recorder;
use crate::results::Outcome;
use crate::scope::HookPoint;

/// Reason recorded for planned cases that never produced a result.
pub const DID_NOT_RUN: &str = "This test did not run.";

/// Drives a planned assembly.
///
/// Returning an error is an assembly-level failure: every planned case is failed with it, and
/// cases that never ran are additionally skipped.
pub trait Execution {
    fn run<'a>(&'a self, assembly: &'a TestAssembly) -> LocalBoxFuture<'a, Result<(), CaseError>>;
}

/// All planned classes of one run.
pub struct TestAssembly {
    name: String,
    classes: Vec<TestClass>,
}

impl TestAssembly {
    pub(crate) fn new(name: impl Into<String>, classes: Vec<TestClass>) -> Self {
        Self {
            name: name.into(),
            classes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[TestClass] {
        &self.classes
    }

    /// Every test of every class, in plan order.
    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.classes.iter().flat_map(|class| class.tests.iter())
    }
}

/// A case whose result was decided during planning: skipped by policy, or failed by a parameter
/// source or a policy.
pub(crate) enum Settled {
    Skipped(Case, Option<String>),
    Failed(Case),
}

impl Settled {
    fn case(&self) -> &Case {
        match self {
            Self::Skipped(case, _) | Self::Failed(case) => case,
        }
    }
}

/// A class's settled cases, published once when the class is first entered.
struct ClassEntry {
    settled: Vec<Settled>,
    entered: Cell<bool>,
    recorder: Rc<Recorder>,
}

impl ClassEntry {
    async fn enter(&self) {
        if self.entered.replace(true) {
            return;
        }
        for settled in &self.settled {
            match settled {
                Settled::Skipped(case, reason) => self.recorder.skip(case, reason.clone()).await,
                Settled::Failed(case) => self.recorder.fail(case).await,
            }
        }
    }

    /// Record `error` as an additional failure for every settled case.
    async fn fail(&self, error: &CaseError) {
        for settled in &self.settled {
            let mut case = settled.case().reset();
            case.fail(error.clone());
            self.recorder.fail(&case).await;
        }
    }

    /// Fan an assembly failure out to the settled cases.
    ///
    /// If the class was never entered, nothing was published yet: a skipped case is failed and
    /// then skipped as not run, and a planning failure is published ahead of the assembly failure.
    async fn close(&self, error: &CaseError) {
        if self.entered.replace(true) {
            self.fail(error).await;
            return;
        }
        for settled in &self.settled {
            let mut failed = settled.case().reset();
            failed.fail(error.clone());
            match settled {
                Settled::Skipped(case, _) => {
                    self.recorder.fail(&failed).await;
                    let mut skipped = case.reset();
                    skipped.skip();
                    self.recorder.skip(&skipped, Some(DID_NOT_RUN.to_string())).await;
                }
                Settled::Failed(case) => {
                    self.recorder.fail(case).await;
                    self.recorder.fail(&failed).await;
                }
            }
        }
    }
}

/// One planned class: its runnable tests, plus the cases settled during planning.
///
/// Settled cases are published when the class is entered, either explicitly or by the first
/// operation on one of its tests. A class whose cases were all settled is still present, with no
/// tests.
pub struct TestClass {
    name: String,
    entry: Rc<ClassEntry>,
    tests: Vec<Test>,
}

impl TestClass {
    pub(crate) fn new(
        name: impl Into<String>,
        settled: Vec<Settled>,
        tests: Vec<(Rc<TestMethod>, Vec<Case>)>,
        recorder: Rc<Recorder>,
    ) -> Self {
        let entry = Rc::new(ClassEntry {
            settled,
            entered: Cell::new(false),
            recorder,
        });
        let tests = tests
            .into_iter()
            .map(|(method, cases)| Test::new(method, cases, Rc::clone(&entry)))
            .collect();
        Self {
            name: name.into(),
            entry,
            tests,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    /// Publish the results settled during planning. Only the first call publishes anything.
    pub async fn enter(&self) {
        self.entry.enter().await;
    }

    /// Record `error` against every case of the class, settled cases included.
    pub async fn fail(&self, error: CaseError) {
        self.entry.enter().await;
        self.entry.fail(&error).await;
        for test in &self.tests {
            test.fail(error.clone()).await;
        }
    }

    /// Close out the class after the executor returns.
    ///
    /// An assembly-level failure is recorded for every case, settled ones included. A class the
    /// executor never entered publishes its settled results here.
    pub(crate) async fn finish(&self, assembly_failure: Option<&CaseError>) {
        match assembly_failure {
            Some(error) => self.entry.close(error).await,
            None => self.entry.enter().await,
        }
        for test in &self.tests {
            test.finish(assembly_failure).await;
        }
    }
}

struct PlannedCase {
    case: Case,
    recorded: Cell<bool>,
}

/// A test method with its planned cases.
pub struct Test {
    method: Rc<TestMethod>,
    cases: Vec<PlannedCase>,
    class: Rc<ClassEntry>,
    recorder: Rc<Recorder>,
}

impl Test {
    fn new(method: Rc<TestMethod>, cases: Vec<Case>, class: Rc<ClassEntry>) -> Self {
        let cases = cases
            .into_iter()
            .map(|case| PlannedCase {
                case,
                recorded: Cell::new(false),
            })
            .collect();
        let recorder = Rc::clone(&class.recorder);
        Self {
            method,
            cases,
            class,
            recorder,
        }
    }

    pub fn name(&self) -> &TestName {
        self.method.name()
    }

    pub fn method(&self) -> &TestMethod {
        &self.method
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.method.has_attribute(attribute)
    }

    /// Planned parameter sets, in resolved order.
    pub fn parameter_sets(&self) -> Vec<ParameterSet> {
        self.cases.iter().map(|planned| planned.case.parameters().to_vec()).collect()
    }

    /// Run one case and record its result. Each call records a distinct result.
    pub async fn run(&self, parameters: ParameterSet) -> Outcome {
        self.run_between(parameters, None, None).await
    }

    /// Record a single skip for the whole test without running anything.
    pub async fn skip(&self, reason: Option<String>) {
        self.class.enter().await;
        for planned in &self.cases {
            planned.recorded.set(true);
        }
        let mut case = Case::new(Rc::clone(&self.method), Vec::new());
        case.skip();
        self.recorder.skip(&case, reason).await;
    }

    /// Record `error` against every planned case.
    pub async fn fail(&self, error: CaseError) {
        self.class.enter().await;
        for planned in &self.cases {
            planned.recorded.set(true);
            let mut case = planned.case.reset();
            case.fail(error.clone());
            self.recorder.fail(&case).await;
        }
    }

    /// Record `error` against the case for `parameters`.
    pub async fn fail_case(&self, parameters: ParameterSet, error: CaseError) {
        self.class.enter().await;
        let mut case = self.claim(parameters);
        case.fail(error);
        self.recorder.fail(&case).await;
    }

    /// Run one case between optional case-scope hooks.
    ///
    /// A setup failure fails the case without running the body or the teardown. A teardown
    /// failure is recorded as a second, separate failure after the case's own result.
    pub(crate) async fn run_between(
        &self,
        parameters: ParameterSet,
        setup: Option<&Hook>,
        teardown: Option<&Hook>,
    ) -> Outcome {
        self.class.enter().await;
        let mut case = self.claim(parameters);
        let started = Instant::now();

        let setup_result = match setup {
            Some(hook) => lifecycle::call_hook(hook, HookContext::for_case(HookPoint::CASE_SETUP, &case)).await,
            None => Ok(()),
        };

        let mut teardown_failure = None;
        match setup_result {
            Err(error) => case.fail(error),
            Ok(()) => {
                match self.method.invoke(case.context()).await {
                    Ok(()) => case.pass(),
                    Err(error) => case.fail(error),
                }
                if let Some(hook) = teardown {
                    let context = HookContext::for_case(HookPoint::CASE_TEARDOWN, &case);
                    teardown_failure = lifecycle::call_hook(hook, context).await.err();
                }
            }
        }
        case.set_duration(started.elapsed());

        let mut outcome = Outcome::Passed;
        if case.state() == CaseState::Failed {
            outcome = Outcome::Failed;
            self.recorder.fail(&case).await;
        } else {
            self.recorder.pass(&case).await;
        }

        if let Some(error) = teardown_failure {
            outcome = Outcome::Failed;
            let mut extra = case.reset();
            extra.fail(error);
            self.recorder.fail(&extra).await;
        }
        outcome
    }

    /// An assembly-level failure is recorded for every planned case, and cases that never
    /// produced a result are skipped.
    async fn finish(&self, assembly_failure: Option<&CaseError>) {
        for planned in &self.cases {
            if let Some(error) = assembly_failure {
                let mut case = planned.case.reset();
                case.fail(error.clone());
                self.recorder.fail(&case).await;
            }
            if !planned.recorded.replace(true) {
                let mut case = planned.case.reset();
                case.skip();
                self.recorder.skip(&case, Some(DID_NOT_RUN.to_string())).await;
            }
        }
    }

    /// A fresh case for `parameters`, marking the first unrecorded matching planned case.
    fn claim(&self, parameters: ParameterSet) -> Case {
        let mut rerun = None;
        for planned in &self.cases {
            if planned.case.parameters() != parameters.as_slice() {
                continue;
            }
            if !planned.recorded.replace(true) {
                return planned.case.reset();
            }
            rerun.get_or_insert_with(|| planned.case.reset());
        }
        rerun.unwrap_or_else(|| Case::new(Rc::clone(&self.method), parameters))
    }
}
