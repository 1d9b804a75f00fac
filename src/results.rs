//! Append-only result aggregates.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::case::Case;

/// Terminal classification of one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// One recorded result. A case may produce several over a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub outcome: Outcome,
    #[serde(serialize_with = "seconds")]
    pub duration: Duration,
}

impl CaseResult {
    pub fn new(case: &Case, outcome: Outcome) -> Self {
        Self {
            name: case.name().to_string(),
            outcome,
            duration: case.duration(),
        }
    }
}

/// Results recorded for one class, in recording order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassResult {
    class: String,
    results: Vec<CaseResult>,
}

impl ClassResult {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            results: Vec::new(),
        }
    }

    pub fn add(&mut self, result: CaseResult) {
        self.results.push(result);
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn results(&self) -> &[CaseResult] {
        &self.results
    }

    pub fn passed(&self) -> usize {
        self.count(Outcome::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn duration(&self) -> Duration {
        self.results.iter().map(|result| result.duration).sum()
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|result| result.outcome == outcome).count()
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(serialize_with = "seconds")]
    pub duration: Duration,
}

impl ExecutionSummary {
    pub fn add(&mut self, class: &ClassResult) {
        self.passed += class.passed();
        self.failed += class.failed();
        self.skipped += class.skipped();
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return f.write_str("No tests found.");
        }

        let counts = [(self.passed, "passed"), (self.failed, "failed"), (self.skipped, "skipped")];
        for (count, label) in counts.into_iter().filter(|(count, _)| *count > 0) {
            write!(f, "{count} {label}, ")?;
        }
        write!(f, "took {:.2} seconds", self.duration.as_secs_f64())
    }
}

/// Serialize a duration as fractional seconds.
pub(crate) fn seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
