//! Runs an assembly end to end and publishes its lifecycle messages.

use std::rc::Rc;
use std::time::Instant;

use casework_bus::Bus;

use crate::config::Configuration;
use crate::error::guard_future;
use crate::execution::TestAssembly;
use crate::messages::{AssemblyCompleted, AssemblyStarted, ClassCompleted, TestDiscovered};
use crate::method::Assembly;
use crate::planner;
use crate::recorder::Recorder;
use crate::results::ExecutionSummary;

/// Owns the bus and configuration for one or more runs.
pub struct Runner {
    bus: Rc<Bus>,
    config: Configuration,
}

impl Runner {
    pub fn new(bus: Bus, config: Configuration) -> Self {
        Self {
            bus: Rc::new(bus),
            config,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Publish a `TestDiscovered` message per method without running anything.
    #[tracing::instrument(skip_all, fields(assembly = assembly.name(), methods = assembly.methods().len()))]
    pub async fn discover(&self, assembly: &Assembly) {
        for method in assembly.methods() {
            self.bus
                .publish(TestDiscovered {
                    test: method.name().clone(),
                })
                .await;
        }
    }

    /// Plan and execute every class, then publish the completion messages.
    ///
    /// Never fails: every error raised along the way ends up as a case result.
    #[tracing::instrument(skip_all, fields(assembly = assembly.name(), methods = assembly.methods().len()))]
    pub async fn run(&self, assembly: &Assembly) -> ExecutionSummary {
        let started = Instant::now();
        self.bus
            .publish(AssemblyStarted {
                assembly: assembly.name().to_string(),
            })
            .await;

        let recorder = Rc::new(Recorder::new(Rc::clone(&self.bus), Rc::clone(&self.config.assertion_filter)));
        let mut classes = Vec::new();
        for grouping in assembly.classes() {
            classes.push(planner::plan_class(&grouping, &self.config, &recorder));
        }
        let planned = TestAssembly::new(assembly.name(), classes);

        let execution = Rc::clone(&self.config.execution);
        let failure = guard_future(|| execution.run(&planned)).await.err();
        if let Some(error) = &failure {
            tracing::warn!(error = %error, "assembly-level failure");
        }
        for class in planned.classes() {
            class.finish(failure.as_ref()).await;
        }

        let mut summary = ExecutionSummary::default();
        for class in planned.classes() {
            let result = recorder.class_result(class.name());
            summary.add(&result);
            self.bus
                .publish(ClassCompleted {
                    class: class.name().to_string(),
                    result,
                })
                .await;
        }
        summary.duration = started.elapsed();

        tracing::info!(summary = %summary, "assembly completed");
        self.bus
            .publish(AssemblyCompleted {
                assembly: assembly.name().to_string(),
                summary: summary.clone(),
            })
            .await;
        summary
    }
}
