//! Built-in result consumers. Each is a bus handler; register the ones you want.

mod console;
mod json;
mod log;
mod teamcity;

use std::rc::Rc;

use casework_bus::Bus;

pub use console::ConsoleReport;
pub use json::JsonReport;
pub use log::LogReport;
pub use teamcity::TeamCityReport;

/// A consumer that knows which messages it handles.
pub trait Report {
    /// Subscribe this report to every message kind it handles.
    fn register(self: Rc<Self>, bus: &mut Bus);
}
