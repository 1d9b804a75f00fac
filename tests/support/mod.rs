//! Shared fixtures: a lifecycle log, scripted failures, and a stub report.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use casework::messages::{CaseFailed, CasePassed, CaseSkipped};
use casework::{
    Assembly, Bus, CaseError, Configuration, ExecutionSummary, Handler, HandlerResult, HookContext, HookPoint,
    Lifecycle, Runner, TestMethod,
};
use serde_json::Value;

pub const HOOK_POINTS: [HookPoint; 8] = [
    HookPoint::ASSEMBLY_SETUP,
    HookPoint::ASSEMBLY_TEARDOWN,
    HookPoint::CLASS_SETUP,
    HookPoint::CLASS_TEARDOWN,
    HookPoint::TEST_SETUP,
    HookPoint::TEST_TEARDOWN,
    HookPoint::CASE_SETUP,
    HookPoint::CASE_TEARDOWN,
];

/// Records every member that runs and fails the ones it was told to.
#[derive(Default)]
pub struct Harness {
    log: RefCell<Vec<String>>,
    scripted: RefCell<Vec<(String, Option<usize>)>>,
    seen: RefCell<HashMap<String, usize>>,
}

impl Harness {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Fail `member` on its `occurrence`th call (1-based), or on every call when `None`.
    pub fn fail_during(&self, member: &str, occurrence: Option<usize>) {
        self.scripted.borrow_mut().push((member.to_string(), occurrence));
    }

    /// Log `entry` as a call to `member`, failing if scripted to.
    pub fn touch(&self, member: &str, entry: &str) -> Result<(), CaseError> {
        self.log.borrow_mut().push(entry.to_string());
        let count = {
            let mut seen = self.seen.borrow_mut();
            let count = seen.entry(member.to_string()).or_default();
            *count += 1;
            *count
        };
        let scripted = self
            .scripted
            .borrow()
            .iter()
            .any(|(name, occurrence)| name == member && occurrence.is_none_or(|n| n == count));
        if scripted { Err(failure(member)) } else { Ok(()) }
    }

    /// Log `entry` without counting it as a call.
    pub fn note(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

pub fn failure(member: &str) -> CaseError {
    CaseError::new("FailureException", format!("'{member}' failed!")).without_trace()
}

/// Collects one line per case result, optionally echoing each line into a harness log.
#[derive(Default)]
pub struct StubReport {
    lines: RefCell<Vec<String>>,
    echo: Option<Rc<Harness>>,
}

impl StubReport {
    /// A report whose lines also land in `harness`'s log, between the hooks that surround them.
    pub fn echoing(harness: &Rc<Harness>) -> Self {
        Self {
            lines: RefCell::default(),
            echo: Some(Rc::clone(harness)),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    fn push(&self, line: String) {
        if let Some(harness) = &self.echo {
            harness.note(line.clone());
        }
        self.lines.borrow_mut().push(line);
    }

    pub fn register(self: &Rc<Self>, bus: &mut Bus) {
        bus.subscribe::<CaseSkipped, _>(Rc::clone(self));
        bus.subscribe::<CasePassed, _>(Rc::clone(self));
        bus.subscribe::<CaseFailed, _>(Rc::clone(self));
    }
}

impl Handler<CaseSkipped> for StubReport {
    async fn handle(&self, message: &CaseSkipped) -> HandlerResult {
        let line = match &message.reason {
            Some(reason) => format!("{} skipped: {reason}", message.name),
            None => format!("{} skipped", message.name),
        };
        self.push(line);
        Ok(())
    }
}

impl Handler<CasePassed> for StubReport {
    async fn handle(&self, message: &CasePassed) -> HandlerResult {
        self.push(format!("{} passed", message.name));
        Ok(())
    }
}

impl Handler<CaseFailed> for StubReport {
    async fn handle(&self, message: &CaseFailed) -> HandlerResult {
        self.push(format!("{} failed: {}", message.name, message.errors.message()));
        Ok(())
    }
}

/// `Fail` always fails, `Pass` takes one integer and runs for 1 and 2, `Skip` is marked `skip`.
pub fn first_test_class(harness: &Rc<Harness>) -> Vec<TestMethod> {
    let fail = Rc::clone(harness);
    let pass = Rc::clone(harness);
    let skip = Rc::clone(harness);
    vec![
        TestMethod::sync("FirstTestClass", "Fail", move |_| {
            fail.touch("Fail", "Fail")?;
            Err(failure("Fail"))
        }),
        TestMethod::sync("FirstTestClass", "Pass", move |context| {
            let i = context.parameter(0).and_then(Value::as_i64).unwrap_or_default();
            pass.touch("Pass", &format!("Pass({i})"))
        })
        .with_arity(1)
        .with_input([1])
        .with_input([2]),
        TestMethod::sync("FirstTestClass", "Skip", move |_| {
            skip.touch("Skip", "Skip")?;
            Err(CaseError::new("ShouldBeUnreachableException", "'Skip' reached a line of code thought to be unreachable.")
                .without_trace())
        })
        .with_attribute("skip"),
    ]
}

pub fn second_test_class(harness: &Rc<Harness>) -> Vec<TestMethod> {
    let harness = Rc::clone(harness);
    vec![TestMethod::sync("SecondTestClass", "SecondPass", move |_| harness.touch("SecondPass", "SecondPass"))]
}

pub fn all_skipped_test_class(harness: &Rc<Harness>) -> Vec<TestMethod> {
    ["SkipA", "SkipB", "SkipC"]
        .into_iter()
        .map(|name| {
            let harness = Rc::clone(harness);
            TestMethod::sync("AllSkippedTestClass", name, move |_| harness.touch(name, name)).with_attribute("skip")
        })
        .collect()
}

pub fn assembly(methods: impl IntoIterator<Item = TestMethod>) -> Assembly {
    methods.into_iter().fold(Assembly::new("Fixtures"), Assembly::with_method)
}

/// A lifecycle whose eight hooks log their own name.
pub fn logging_lifecycle(harness: &Rc<Harness>) -> Lifecycle {
    HOOK_POINTS.into_iter().fold(Lifecycle::new(), |lifecycle, point| {
        let harness = Rc::clone(harness);
        lifecycle.with_hook(point, move |context: HookContext| {
            let name = context.point().to_string();
            let result = harness.touch(&name, &name);
            async move { result }
        })
    })
}

/// Skips methods marked `skip`, without a reason.
pub fn skip_marked(config: Configuration) -> Configuration {
    config.with_skip_case(|case| Ok(case.method().has_attribute("skip")))
}

/// Run `assembly` with a stub report attached, returning its lines and the summary.
pub async fn run(assembly: &Assembly, config: Configuration) -> (Vec<String>, ExecutionSummary) {
    run_with(StubReport::default(), assembly, config).await
}

pub async fn run_with(report: StubReport, assembly: &Assembly, config: Configuration) -> (Vec<String>, ExecutionSummary) {
    let report = Rc::new(report);
    let mut bus = Bus::new();
    report.register(&mut bus);
    let summary = Runner::new(bus, config).run(assembly).await;
    (report.lines(), summary)
}
