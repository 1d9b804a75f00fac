//! TeamCity service messages.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use casework_bus::{Bus, Handler, HandlerResult};

use super::Report;
use crate::messages::{AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped};

/// Emits `##teamcity[...]` lines for a TeamCity build log.
pub struct TeamCityReport<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> TeamCityReport<W> {
    pub fn new(out: W) -> Self {
        Self { out: RefCell::new(out) }
    }

    fn message(&self, name: &str, attributes: &[(&str, &str)]) -> HandlerResult {
        let mut line = format!("##teamcity[{name}");
        for (key, value) in attributes {
            line.push_str(&format!(" {key}='{}'", escape(value)));
        }
        line.push_str("]\n");
        let mut out = self.out.borrow_mut();
        out.write_all(line.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn output(&self, name: &str, output: &str) -> HandlerResult {
        if output.is_empty() {
            return Ok(());
        }
        self.message("testStdOut", &[("name", name), ("out", output)])
    }
}

impl<W: Write> Handler<AssemblyStarted> for TeamCityReport<W> {
    async fn handle(&self, message: &AssemblyStarted) -> HandlerResult {
        self.message("testSuiteStarted", &[("name", message.assembly.as_str())])
    }
}

impl<W: Write> Handler<CaseSkipped> for TeamCityReport<W> {
    async fn handle(&self, message: &CaseSkipped) -> HandlerResult {
        let name = message.name.as_str();
        self.message("testStarted", &[("name", name)])?;
        self.output(name, &message.output)?;
        self.message("testIgnored", &[("name", name), ("message", message.reason.as_deref().unwrap_or_default())])?;
        self.message("testFinished", &[("name", name), ("duration", "0")])
    }
}

impl<W: Write> Handler<CasePassed> for TeamCityReport<W> {
    async fn handle(&self, message: &CasePassed) -> HandlerResult {
        let name = message.name.as_str();
        self.message("testStarted", &[("name", name)])?;
        self.output(name, &message.output)?;
        let duration = message.duration.as_millis().to_string();
        self.message("testFinished", &[("name", name), ("duration", duration.as_str())])
    }
}

impl<W: Write> Handler<CaseFailed> for TeamCityReport<W> {
    async fn handle(&self, message: &CaseFailed) -> HandlerResult {
        let name = message.name.as_str();
        self.message("testStarted", &[("name", name)])?;
        self.output(name, &message.output)?;
        let details = message.typed_trace();
        self.message(
            "testFailed",
            &[("name", name), ("message", message.errors.message()), ("details", details.as_str())],
        )?;
        let duration = message.duration.as_millis().to_string();
        self.message("testFinished", &[("name", name), ("duration", duration.as_str())])
    }
}

impl<W: Write> Handler<AssemblyCompleted> for TeamCityReport<W> {
    async fn handle(&self, message: &AssemblyCompleted) -> HandlerResult {
        self.message("testSuiteFinished", &[("name", message.assembly.as_str())])
    }
}

impl<W: Write + 'static> Report for TeamCityReport<W> {
    fn register(self: Rc<Self>, bus: &mut Bus) {
        bus.subscribe::<AssemblyStarted, _>(Rc::clone(&self));
        bus.subscribe::<CaseSkipped, _>(Rc::clone(&self));
        bus.subscribe::<CasePassed, _>(Rc::clone(&self));
        bus.subscribe::<CaseFailed, _>(Rc::clone(&self));
        bus.subscribe::<AssemblyCompleted, _>(self);
    }
}

/// TeamCity value escaping: `|` prefixes `'`, `[`, `]`, `|`, and encodes newlines.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            '\u{0085}' => escaped.push_str("|x"),
            '\u{2028}' => escaped.push_str("|l"),
            '\u{2029}' => escaped.push_str("|p"),
            _ => escaped.push(c),
        }
    }
    escaped
}
