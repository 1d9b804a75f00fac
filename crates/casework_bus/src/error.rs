//! Handler failures and the diagnostics the bus emits for them.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Result returned by every handler.
pub type HandlerResult = Result<(), HandlerError>;

/// A failure raised by a handler while processing one message.
///
/// Any `std::error::Error` converts into a `HandlerError` with `?`, keeping the concrete type
/// name for diagnostics. `HandlerError` does not implement `std::error::Error` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    type_name: String,
    message: String,
    trace: Vec<String>,
}

impl HandlerError {
    /// Create an error with an explicit type label.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Attach trace lines, rendered after the message.
    pub fn with_trace<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::new("panic", panic_message(payload.as_ref()))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + 'static,
{
    fn from(error: E) -> Self {
        let mut trace = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            trace,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)?;
        for line in &self.trace {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

/// Report produced when a handler fails; delivered to the bus's diagnostic channel.
#[derive(Debug, Clone, Error)]
#[error("{handler} threw an exception while attempting to handle a message of type {message}:\n\n{error}\n")]
pub struct DispatchFailure {
    /// Type name of the failing handler.
    pub handler: &'static str,
    /// Type name of the message being delivered.
    pub message: &'static str,
    pub error: HandlerError,
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic payload of unknown type".to_string()
    }
}
