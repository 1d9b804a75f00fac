//! Turns finished cases into results: appends them to the class aggregates and publishes them.

use std::cell::RefCell;
use std::rc::Rc;

use casework_bus::Bus;

use crate::case::Case;
use crate::compound::{AssertionFilter, CompoundError};
use crate::messages::{CaseFailed, CasePassed, CaseSkipped};
use crate::results::{CaseResult, ClassResult, Outcome};

pub(crate) struct Recorder {
    bus: Rc<Bus>,
    filter: Rc<dyn AssertionFilter>,
    classes: RefCell<Vec<ClassResult>>,
}

impl Recorder {
    pub(crate) fn new(bus: Rc<Bus>, filter: Rc<dyn AssertionFilter>) -> Self {
        Self {
            bus,
            filter,
            classes: RefCell::new(Vec::new()),
        }
    }

    pub(crate) async fn pass(&self, case: &Case) {
        tracing::debug!(case = case.name(), "case passed");
        self.append(case, Outcome::Passed);
        self.bus
            .publish(CasePassed {
                test: case.test().clone(),
                name: case.name().to_string(),
                duration: case.duration(),
                output: case.output().text(),
            })
            .await;
    }

    /// Record a failure; a case without captured errors has nothing to report and is ignored.
    pub(crate) async fn fail(&self, case: &Case) {
        let Some(errors) = CompoundError::from_errors(case.errors(), self.filter.as_ref()) else {
            tracing::warn!(case = case.name(), "failed case carries no errors");
            return;
        };
        tracing::debug!(case = case.name(), error = errors.message(), "case failed");
        self.append(case, Outcome::Failed);
        self.bus
            .publish(CaseFailed {
                test: case.test().clone(),
                name: case.name().to_string(),
                duration: case.duration(),
                output: case.output().text(),
                errors,
            })
            .await;
    }

    pub(crate) async fn skip(&self, case: &Case, reason: Option<String>) {
        tracing::debug!(case = case.name(), reason = reason.as_deref(), "case skipped");
        self.append(case, Outcome::Skipped);
        self.bus
            .publish(CaseSkipped {
                test: case.test().clone(),
                name: case.name().to_string(),
                reason,
                output: case.output().text(),
            })
            .await;
    }

    /// Results recorded so far for `class`.
    pub(crate) fn class_result(&self, class: &str) -> ClassResult {
        self.classes
            .borrow()
            .iter()
            .find(|result| result.class() == class)
            .cloned()
            .unwrap_or_else(|| ClassResult::new(class))
    }

    fn append(&self, case: &Case, outcome: Outcome) {
        let result = CaseResult::new(case, outcome);
        let class = case.test().class();
        let mut classes = self.classes.borrow_mut();
        match classes.iter_mut().find(|existing| existing.class() == class) {
            Some(existing) => existing.add(result),
            None => {
                let mut created = ClassResult::new(class);
                created.add(result);
                classes.push(created);
            }
        }
    }
}
