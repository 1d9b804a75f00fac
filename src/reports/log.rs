//! Traces every bus message at debug level.

use std::rc::Rc;

use casework_bus::{AnyHandler, Bus, HandlerResult, Message};

use super::Report;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogReport;

impl AnyHandler for LogReport {
    async fn handle_any(&self, message: &dyn Message) -> HandlerResult {
        tracing::debug!(kind = message.kind(), payload = ?message, "bus message");
        Ok(())
    }
}

impl Report for LogReport {
    fn register(self: Rc<Self>, bus: &mut Bus) {
        bus.subscribe_all(self);
    }
}
