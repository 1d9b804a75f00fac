#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
//! In-process publish/subscribe bus.
//!
//! The bus is a capability table: each message kind (keyed by `TypeId`) maps to the ordered list
//! of subscriptions that accept it, and any-message subscriptions are merged in by registration
//! order at publish time.
//!
//! ## Delivery contract
//!
//! - `publish` delivers one message to every matching handler in registration order, awaiting each
//!   handler before invoking the next. There is no queue.
//! - A handler that returns an error or panics is reported through the diagnostic channel and
//!   dispatch continues with the next handler. Nothing a handler does can abort the publisher.
//!
//! The bus knows nothing about the messages it carries; the engine defines its own message types.

mod error;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

pub use error::{DispatchFailure, HandlerError, HandlerResult, panic_message};

/// A value that can travel over the bus.
pub trait Message: Any + fmt::Debug {
    /// Kind tag used in diagnostics.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Handles one message kind.
#[allow(async_fn_in_trait)]
pub trait Handler<M: Message> {
    async fn handle(&self, message: &M) -> HandlerResult;
}

/// Handles every message published on the bus.
#[allow(async_fn_in_trait)]
pub trait AnyHandler {
    async fn handle_any(&self, message: &dyn Message) -> HandlerResult;
}

type Dispatch = Rc<dyn for<'a> Fn(&'a dyn Any, &'a dyn Message) -> LocalBoxFuture<'a, HandlerResult>>;

/// Callback receiving every dispatch failure.
pub type DiagnosticSink = Box<dyn Fn(&DispatchFailure)>;

struct Subscription {
    handler: &'static str,
    dispatch: Dispatch,
}

/// The publish/subscribe bus.
pub struct Bus {
    subscriptions: Vec<Subscription>,
    routes: HashMap<TypeId, Vec<usize>>,
    any_routes: Vec<usize>,
    diagnostics: DiagnosticSink,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<&str> = self.subscriptions.iter().map(|s| s.handler).collect();
        f.debug_struct("Bus").field("handlers", &handlers).finish()
    }
}

impl Bus {
    /// Create an empty bus whose diagnostics go to `tracing::error!`.
    pub fn new() -> Self {
        Self::with_diagnostics(|failure: &DispatchFailure| {
            tracing::error!(
                handler = failure.handler,
                message_type = failure.message,
                error = %failure.error,
                "bus handler failed"
            );
        })
    }

    /// Create an empty bus that reports handler failures to `sink`.
    pub fn with_diagnostics(sink: impl Fn(&DispatchFailure) + 'static) -> Self {
        Self {
            subscriptions: Vec::new(),
            routes: HashMap::new(),
            any_routes: Vec::new(),
            diagnostics: Box::new(sink),
        }
    }

    /// Register `handler` for messages of kind `M`.
    pub fn subscribe<M, H>(&mut self, handler: Rc<H>)
    where
        M: Message,
        H: Handler<M> + 'static,
    {
        let dispatch = erase(move |message: &dyn Any, _: &dyn Message| {
            let handler = Rc::clone(&handler);
            let message = message.downcast_ref::<M>();
            Box::pin(async move {
                match message {
                    Some(message) => handler.handle(message).await,
                    None => Err(HandlerError::new(
                        "casework_bus::RoutingError",
                        format!("message routed to a handler for {}", std::any::type_name::<M>()),
                    )),
                }
            })
        });
        let index = self.push(std::any::type_name::<H>(), dispatch);
        self.routes.entry(TypeId::of::<M>()).or_default().push(index);
    }

    /// Register `handler` for every message kind.
    pub fn subscribe_all<H>(&mut self, handler: Rc<H>)
    where
        H: AnyHandler + 'static,
    {
        let dispatch = erase(move |_: &dyn Any, message: &dyn Message| {
            let handler = Rc::clone(&handler);
            Box::pin(async move { handler.handle_any(message).await })
        });
        let index = self.push(std::any::type_name::<H>(), dispatch);
        self.any_routes.push(index);
    }

    /// Number of registrations (one per `subscribe`/`subscribe_all` call).
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Deliver `message` to every matching handler, in registration order.
    pub async fn publish<M: Message>(&self, message: M) {
        let kind = message.kind();
        for index in self.route(TypeId::of::<M>()) {
            let subscription = &self.subscriptions[index];
            let delivery = (subscription.dispatch)(&message, &message);
            let error = match AssertUnwindSafe(delivery).catch_unwind().await {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(payload) => HandlerError::from_panic(payload),
            };
            let failure = DispatchFailure {
                handler: subscription.handler,
                message: kind,
                error,
            };
            (self.diagnostics)(&failure);
        }
    }

    fn push(&mut self, handler: &'static str, dispatch: Dispatch) -> usize {
        self.subscriptions.push(Subscription { handler, dispatch });
        self.subscriptions.len() - 1
    }

    /// Merge the kind's routes with the any-message routes, keeping registration order.
    fn route(&self, kind: TypeId) -> Vec<usize> {
        let typed = self.routes.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let mut merged = Vec::with_capacity(typed.len() + self.any_routes.len());
        let (mut t, mut a) = (0, 0);
        while t < typed.len() || a < self.any_routes.len() {
            let take_typed = match (typed.get(t), self.any_routes.get(a)) {
                (Some(x), Some(y)) => x < y,
                (Some(_), None) => true,
                _ => false,
            };
            if take_typed {
                merged.push(typed[t]);
                t += 1;
            } else {
                merged.push(self.any_routes[a]);
                a += 1;
            }
        }
        merged
    }
}

/// Pin the higher-ranked signature so the closure's future may borrow the message.
fn erase<F>(f: F) -> Dispatch
where
    F: for<'a> Fn(&'a dyn Any, &'a dyn Message) -> LocalBoxFuture<'a, HandlerResult> + 'static,
{
    Rc::new(f)
}
