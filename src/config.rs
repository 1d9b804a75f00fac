//! Run configuration: parameter source, policies, assertion filter and executor.

use std::fmt;
use std::rc::Rc;

use crate::case::{Case, ParameterSet};
use crate::compound::{AssertionFilter, DefaultAssertionFilter};
use crate::error::CaseError;
use crate::execution::{Execution, Lifecycle};
use crate::method::TestMethod;

/// Supplies the parameter sets a test method runs with.
pub trait ParameterSource {
    fn parameters(&self, method: &TestMethod) -> Result<Vec<ParameterSet>, CaseError>;
}

/// Yields the inputs declared on the method.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredInputs;

impl ParameterSource for DeclaredInputs {
    fn parameters(&self, method: &TestMethod) -> Result<Vec<ParameterSet>, CaseError> {
        Ok(method.inputs().to_vec())
    }
}

impl<F> ParameterSource for F
where
    F: Fn(&TestMethod) -> Result<Vec<ParameterSet>, CaseError>,
{
    fn parameters(&self, method: &TestMethod) -> Result<Vec<ParameterSet>, CaseError> {
        self(method)
    }
}

/// Custom case name; `None` or a blank name keeps the default.
pub type CaseNamePolicy = Rc<dyn Fn(&Case) -> Result<Option<String>, CaseError>>;
pub type SkipPredicate = Rc<dyn Fn(&Case) -> Result<bool, CaseError>>;
pub type SkipReasonPolicy = Rc<dyn Fn(&Case) -> Result<Option<String>, CaseError>>;
/// Reorders a batch of cases in place.
pub type OrderPolicy = Rc<dyn Fn(&mut [Case]) -> Result<(), CaseError>>;

/// Run configuration
#[derive(Clone)]
pub struct Configuration {
    /// Where parameter sets come from
    pub parameter_source: Rc<dyn ParameterSource>,
    pub case_name: Option<CaseNamePolicy>,
    /// Cases for which this returns `true` are skipped without entering the lifecycle
    pub skip_case: Option<SkipPredicate>,
    pub skip_reason: Option<SkipReasonPolicy>,
    pub order_cases: Option<OrderPolicy>,
    pub assertion_filter: Rc<dyn AssertionFilter>,
    /// Drives hooks and case bodies
    pub execution: Rc<dyn Execution>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            parameter_source: Rc::new(DeclaredInputs),
            case_name: None,
            skip_case: None,
            skip_reason: None,
            order_cases: None,
            assertion_filter: Rc::new(DefaultAssertionFilter),
            execution: Rc::new(Lifecycle::default()),
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter_source(mut self, source: impl ParameterSource + 'static) -> Self {
        self.parameter_source = Rc::new(source);
        self
    }

    pub fn with_case_name(mut self, policy: impl Fn(&Case) -> Result<Option<String>, CaseError> + 'static) -> Self {
        self.case_name = Some(Rc::new(policy));
        self
    }

    pub fn with_skip_case(mut self, predicate: impl Fn(&Case) -> Result<bool, CaseError> + 'static) -> Self {
        self.skip_case = Some(Rc::new(predicate));
        self
    }

    pub fn with_skip_reason(mut self, reason: impl Fn(&Case) -> Result<Option<String>, CaseError> + 'static) -> Self {
        self.skip_reason = Some(Rc::new(reason));
        self
    }

    pub fn with_order_cases(mut self, order: impl Fn(&mut [Case]) -> Result<(), CaseError> + 'static) -> Self {
        self.order_cases = Some(Rc::new(order));
        self
    }

    pub fn with_assertion_filter(mut self, filter: impl AssertionFilter + 'static) -> Self {
        self.assertion_filter = Rc::new(filter);
        self
    }

    pub fn with_execution(mut self, execution: impl Execution + 'static) -> Self {
        self.execution = Rc::new(execution);
        self
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("case_name", &self.case_name.is_some())
            .field("skip_case", &self.skip_case.is_some())
            .field("skip_reason", &self.skip_reason.is_some())
            .field("order_cases", &self.order_cases.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn method() -> TestMethod {
        TestMethod::sync("Class", "Pass", |_| Ok(()))
            .with_arity(1)
            .with_input([1])
            .with_input([2])
    }

    // ========================================
    // Defaults
    // ========================================

    #[test]
    fn test_default_has_no_policies() {
        let config = Configuration::default();
        assert!(config.case_name.is_none());
        assert!(config.skip_case.is_none());
        assert!(config.skip_reason.is_none());
        assert!(config.order_cases.is_none());
    }

    #[test]
    fn test_default_source_yields_declared_inputs() {
        let config = Configuration::new();
        let sets = config.parameter_source.parameters(&method()).unwrap();
        assert_eq!(sets, vec![vec![json!(1)], vec![json!(2)]]);
    }

    // ========================================
    // Builders
    // ========================================

    #[test]
    fn test_closure_parameter_source() {
        let config = Configuration::new()
            .with_parameter_source(|method: &TestMethod| Ok::<_, CaseError>(vec![vec![json!(method.name().method())]]));
        let sets = config.parameter_source.parameters(&method()).unwrap();
        assert_eq!(sets, vec![vec![json!("Pass")]]);
    }

    #[test]
    fn test_policy_builders() {
        let config = Configuration::new()
            .with_case_name(|_| Ok(None))
            .with_skip_case(|case| Ok(case.method().has_attribute("skip")))
            .with_skip_reason(|_| Ok(Some("later".to_string())))
            .with_order_cases(|cases| {
                cases.reverse();
                Ok(())
            });
        assert!(config.case_name.is_some());
        assert!(config.skip_case.is_some());
        assert!(config.skip_reason.is_some());
        assert!(config.order_cases.is_some());
    }

    #[test]
    fn test_debug_lists_configured_policies() {
        let config = Configuration::new().with_skip_case(|_| Ok(false));
        let rendered = format!("{config:?}");
        assert!(rendered.contains("skip_case: true"));
        assert!(rendered.contains("order_cases: false"));
    }
}
