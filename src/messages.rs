//! Messages the engine publishes on the bus.
//!
//! Each message is published exactly once and never mutated afterwards.

use std::time::Duration;

use casework_bus::Message;
use serde::Serialize;

use crate::compound::CompoundError;
use crate::method::TestName;
use crate::results::{ClassResult, ExecutionSummary, seconds};

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyStarted {
    pub assembly: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDiscovered {
    pub test: TestName,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseSkipped {
    pub test: TestName,
    pub name: String,
    pub reason: Option<String>,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CasePassed {
    pub test: TestName,
    pub name: String,
    #[serde(serialize_with = "seconds")]
    pub duration: Duration,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseFailed {
    pub test: TestName,
    pub name: String,
    #[serde(serialize_with = "seconds")]
    pub duration: Duration,
    pub output: String,
    pub errors: CompoundError,
}

impl CaseFailed {
    /// Compound trace preceded by the primary type unless it is an assertion failure.
    pub fn typed_trace(&self) -> String {
        self.errors.typed_trace()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassCompleted {
    pub class: String,
    pub result: ClassResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyCompleted {
    pub assembly: String,
    pub summary: ExecutionSummary,
}

impl Message for AssemblyStarted {}
impl Message for TestDiscovered {}
impl Message for CaseSkipped {}
impl Message for CasePassed {}
impl Message for CaseFailed {}
impl Message for ClassCompleted {}
impl Message for AssemblyCompleted {}
