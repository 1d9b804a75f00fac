//! JSON lines for IDE and tooling integrations.
//!
//! Every message becomes one JSON object on its own line, tagged with a `message` field naming
//! the message kind.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use casework_bus::{Bus, Handler, HandlerResult};
use serde::Serialize;

use super::Report;
use crate::messages::{
    AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped, ClassCompleted, TestDiscovered,
};

#[derive(Serialize)]
#[serde(tag = "message")]
enum Line<'a> {
    AssemblyStarted(&'a AssemblyStarted),
    TestDiscovered(&'a TestDiscovered),
    CaseSkipped(&'a CaseSkipped),
    CasePassed(&'a CasePassed),
    CaseFailed(&'a CaseFailed),
    ClassCompleted(&'a ClassCompleted),
    AssemblyCompleted(&'a AssemblyCompleted),
}

pub struct JsonReport<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> JsonReport<W> {
    pub fn new(out: W) -> Self {
        Self { out: RefCell::new(out) }
    }

    fn emit(&self, line: Line<'_>) -> HandlerResult {
        let mut out = self.out.borrow_mut();
        serde_json::to_writer(&mut *out, &line)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

macro_rules! json_handler {
    ($($message:ident),* $(,)?) => {
        $(
            impl<W: Write> Handler<$message> for JsonReport<W> {
                async fn handle(&self, message: &$message) -> HandlerResult {
                    self.emit(Line::$message(message))
                }
            }
        )*

        impl<W: Write + 'static> Report for JsonReport<W> {
            fn register(self: Rc<Self>, bus: &mut Bus) {
                $( bus.subscribe::<$message, _>(Rc::clone(&self)); )*
            }
        }
    };
}

json_handler!(
    AssemblyStarted,
    TestDiscovered,
    CaseSkipped,
    CasePassed,
    CaseFailed,
    ClassCompleted,
    AssemblyCompleted,
);
