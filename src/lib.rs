#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
//! Casework test-execution lifecycle engine
//!
//! Casework takes discovered test methods grouped by class, materializes one case per parameter
//! set, runs them inside nested setup/teardown scopes (assembly, class, test, case), and reports
//! every outcome as a typed message on an in-process bus.
//!
//! ## Pipeline
//!
//! 1. [`method::Assembly`] groups registered [`method::TestMethod`]s by class.
//! 2. The planner asks the [`config::ParameterSource`] for parameter sets, then applies the naming,
//!    skip and ordering policies from [`config::Configuration`].
//! 3. An [`execution::Execution`] (by default [`execution::Lifecycle`]) drives hooks and case
//!    bodies.
//! 4. Every finished case is published on the [`casework_bus::Bus`] as [`messages::CasePassed`],
//!    [`messages::CaseFailed`] or [`messages::CaseSkipped`].
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` with `?`; `clippy::unwrap_used` and `clippy::expect_used` are denied crate-wide.
//! - **User code**: panics raised by case bodies, hooks, policies and custom executors are caught and recorded as case
//!   failures. A run always finishes with an [`results::ExecutionSummary`].
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod case;
pub mod compound;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod messages;
pub mod method;
mod planner;
mod recorder;
pub mod reports;
pub mod results;
pub mod scope;

pub use case::{Case, CaseContext, CaseOutput, CaseState, ParameterSet};
pub use compound::{AssertionFilter, CompoundError, DefaultAssertionFilter, ErrorInfo, FrameFilter};
pub use config::{Configuration, DeclaredInputs, ParameterSource};
pub use error::{CaseError, FailureOrigin, InvocationError, PolicyError};
pub use execution::{Execution, HookContext, Lifecycle, Runner, Test, TestAssembly, TestClass};
pub use method::{Assembly, ClassGrouping, TestMethod, TestName};
pub use results::{CaseResult, ClassResult, ExecutionSummary, Outcome};
pub use scope::{HookPoint, Phase, Scope};

pub use casework_bus::{AnyHandler, Bus, DispatchFailure, Handler, HandlerError, HandlerResult, Message};
