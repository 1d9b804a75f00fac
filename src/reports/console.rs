//! Human-readable console output.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use casework_bus::{Bus, Handler, HandlerResult};

use super::Report;
use crate::messages::{AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Writes a header, one block per skipped or failed case, and the run summary.
pub struct ConsoleReport<W: Write> {
    out: RefCell<W>,
    color: bool,
    verbose: bool,
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
            color: false,
            verbose: false,
        }
    }

    /// Color case headings with ANSI escapes.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Also list passing cases.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn heading(&self, color: &str, text: &str) -> String {
        if self.color { format!("{color}{text}{RESET}") } else { text.to_string() }
    }

    fn write(&self, text: &str) -> HandlerResult {
        let mut out = self.out.borrow_mut();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write> Handler<AssemblyStarted> for ConsoleReport<W> {
    async fn handle(&self, message: &AssemblyStarted) -> HandlerResult {
        self.write(&format!("------ Testing Assembly {} ------\n\n", message.assembly))
    }
}

impl<W: Write> Handler<CasePassed> for ConsoleReport<W> {
    async fn handle(&self, message: &CasePassed) -> HandlerResult {
        if !self.verbose {
            return Ok(());
        }
        let heading = self.heading(GREEN, &format!("Test '{}' passed", message.name));
        self.write(&format!("{heading}\n{}", indent_output(&message.output)))
    }
}

impl<W: Write> Handler<CaseSkipped> for ConsoleReport<W> {
    async fn handle(&self, message: &CaseSkipped) -> HandlerResult {
        let mut block = match &message.reason {
            Some(reason) => format!("{}\n{reason}\n", self.heading(YELLOW, &format!("Test '{}' skipped:", message.name))),
            None => format!("{}\n", self.heading(YELLOW, &format!("Test '{}' skipped", message.name))),
        };
        block.push('\n');
        self.write(&block)
    }
}

impl<W: Write> Handler<CaseFailed> for ConsoleReport<W> {
    async fn handle(&self, message: &CaseFailed) -> HandlerResult {
        let errors = &message.errors;
        let mut block = format!("{}\n\n", self.heading(RED, &format!("Test '{}' failed:", message.name)));
        block.push_str(errors.message());
        block.push_str("\n\n");
        if !errors.is_assertion() {
            block.push_str(errors.type_name());
            block.push('\n');
        }
        let details = errors.details().trim_end();
        if !details.is_empty() {
            block.push_str(details);
            block.push('\n');
        }
        block.push('\n');
        block.push_str(&indent_output(&message.output));
        self.write(&block)
    }
}

impl<W: Write> Handler<AssemblyCompleted> for ConsoleReport<W> {
    async fn handle(&self, message: &AssemblyCompleted) -> HandlerResult {
        self.write(&format!("{}\n\n", message.summary))
    }
}

/// Captured output, one `> ` prefixed line each, followed by a blank line.
fn indent_output(output: &str) -> String {
    if output.is_empty() {
        return String::new();
    }
    let mut block: String = output.lines().map(|line| format!("> {line}\n")).collect();
    block.push('\n');
    block
}

impl<W: Write + 'static> Report for ConsoleReport<W> {
    fn register(self: Rc<Self>, bus: &mut Bus) {
        bus.subscribe::<AssemblyStarted, _>(Rc::clone(&self));
        bus.subscribe::<CasePassed, _>(Rc::clone(&self));
        bus.subscribe::<CaseSkipped, _>(Rc::clone(&self));
        bus.subscribe::<CaseFailed, _>(Rc::clone(&self));
        bus.subscribe::<AssemblyCompleted, _>(self);
    }
}
