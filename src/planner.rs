//! Planning: turn one class grouping into cases, then name, partition and order them.
//!
//! Cases that fail or are skipped during planning never reach the executor. They are settled on
//! the returned [`TestClass`] and published when that class is entered. Everything else becomes a
//! [`Test`](crate::execution::Test).

use std::rc::Rc;

use crate::case::Case;
use crate::config::Configuration;
use crate::error::{CaseError, FailureOrigin, PolicyError, guard};
use crate::execution::{Settled, TestClass};
use crate::method::{ClassGrouping, TestMethod};
use crate::recorder::Recorder;

#[tracing::instrument(skip_all, fields(class = grouping.name(), methods = grouping.methods().len()))]
pub(crate) fn plan_class(grouping: &ClassGrouping, config: &Configuration, recorder: &Rc<Recorder>) -> TestClass {
    let mut candidates = Vec::new();
    let mut failed = Vec::new();

    for method in grouping.methods() {
        for case in materialize(method, config) {
            if case.errors().is_empty() {
                candidates.push(case);
            } else {
                failed.push(case);
            }
        }
    }

    let mut to_skip = Vec::new();
    let mut to_run = Vec::new();
    for mut case in candidates {
        match skip_case(&case, config) {
            Ok(true) => to_skip.push(case),
            Ok(false) => to_run.push(case),
            Err(error) => {
                case.fail(error);
                failed.push(case);
            }
        }
    }

    let mut settled = Vec::new();
    if !to_skip.is_empty() {
        match order_cases(&mut to_skip, config) {
            Ok(()) => {
                for mut case in to_skip {
                    match skip_reason(&case, config) {
                        Ok(reason) => {
                            case.skip();
                            settled.push(Settled::Skipped(case, reason));
                        }
                        Err(error) => {
                            case.fail(error);
                            settled.push(Settled::Failed(case));
                        }
                    }
                }
            }
            Err(error) => {
                for mut case in to_skip {
                    case.fail(error.clone());
                    settled.push(Settled::Failed(case));
                }
            }
        }
    }

    let mut tests = Vec::new();
    if !to_run.is_empty() {
        match order_cases(&mut to_run, config) {
            Ok(()) => tests = group_into_tests(to_run),
            Err(error) => {
                for mut case in to_run {
                    case.fail(error.clone());
                    settled.push(Settled::Failed(case));
                }
            }
        }
    }

    if !failed.is_empty() {
        // An ordering failure here becomes a secondary error on each already-failed case.
        if let Err(error) = order_cases(&mut failed, config) {
            for case in &mut failed {
                case.fail(error.clone());
            }
        }
        settled.extend(failed.into_iter().map(Settled::Failed));
    }

    tracing::debug!(tests = tests.len(), settled = settled.len(), "class planned");
    TestClass::new(grouping.name(), settled, tests, Rc::clone(recorder))
}

/// One case per parameter set; a single zero-parameter case when the source yields none.
///
/// A failing parameter source yields one failed case. Naming failures fail only their case.
fn materialize(method: &Rc<TestMethod>, config: &Configuration) -> Vec<Case> {
    let sets = match guard(|| config.parameter_source.parameters(method)) {
        Ok(sets) => sets,
        Err(error) => {
            tracing::warn!(test = %method.name(), error = %error, "parameter generation failed");
            let mut case = Case::new(Rc::clone(method), Vec::new());
            case.fail(error.with_origin(FailureOrigin::ParameterGeneration));
            return vec![case];
        }
    };
    let sets = if sets.is_empty() { vec![Vec::new()] } else { sets };

    sets.into_iter()
        .map(|parameters| {
            let mut case = Case::new(Rc::clone(method), parameters);
            match case_name(&case, config) {
                Ok(Some(name)) => case.set_name(name),
                Ok(None) => {}
                Err(error) => case.fail(error),
            }
            case
        })
        .collect()
}

fn case_name(case: &Case, config: &Configuration) -> Result<Option<String>, CaseError> {
    let Some(policy) = &config.case_name else {
        return Ok(None);
    };
    let name = guard(|| policy(case)).map_err(|error| policy_failure(PolicyError::CaseName, error))?;
    Ok(name.filter(|name| !name.trim().is_empty()))
}

fn skip_case(case: &Case, config: &Configuration) -> Result<bool, CaseError> {
    match &config.skip_case {
        Some(predicate) => guard(|| predicate(case)).map_err(|error| policy_failure(PolicyError::SkipPredicate, error)),
        None => Ok(false),
    }
}

fn skip_reason(case: &Case, config: &Configuration) -> Result<Option<String>, CaseError> {
    match &config.skip_reason {
        Some(reason) => guard(|| reason(case)).map_err(|error| policy_failure(PolicyError::SkipReason, error)),
        None => Ok(None),
    }
}

fn order_cases(cases: &mut [Case], config: &Configuration) -> Result<(), CaseError> {
    match &config.order_cases {
        Some(order) => guard(|| order(cases)).map_err(|error| policy_failure(PolicyError::Ordering, error)),
        None => Ok(()),
    }
}

fn policy_failure(policy: PolicyError, error: CaseError) -> CaseError {
    tracing::warn!(error = %error, "{policy}");
    policy.wrap(error)
}

/// Group ordered cases by method, tests ordered by their first case.
fn group_into_tests(cases: Vec<Case>) -> Vec<(Rc<TestMethod>, Vec<Case>)> {
    let mut groups: Vec<(Rc<TestMethod>, Vec<Case>)> = Vec::new();
    for case in cases {
        match groups.iter_mut().find(|(method, _)| Rc::ptr_eq(method, case.method_rc())) {
            Some((_, cases)) => cases.push(case),
            None => groups.push((Rc::clone(case.method_rc()), vec![case])),
        }
    }
    groups
}
