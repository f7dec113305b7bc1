//! What happens to a handler's return value.

use std::sync::Arc;

use crate::actor::Actor;
use crate::context::ExecutionContext;
use crate::value::{ParamType, Value};

/// Consumes a non-empty handler return value.
pub trait ResponseHandler<A: Actor>: Send + Sync {
    /// Deliver `value` for the dispatch described by `context`.
    fn handle(&self, value: Value, context: &ExecutionContext<A>);
}

impl<A, F> ResponseHandler<A> for F
where
    A: Actor,
    F: Fn(Value, &ExecutionContext<A>) + Send + Sync,
{
    fn handle(&self, value: Value, context: &ExecutionContext<A>) {
        self(value, context);
    }
}

/// Picks a response handler for a return type.
///
/// Asked at registration when a command declares its return type, otherwise
/// per call with the runtime type of the returned value.
pub trait ResponseHandlerFactory<A: Actor>: Send + Sync {
    /// A handler for `ty`, if this factory supports it.
    fn create(&self, ty: &ParamType) -> Option<Arc<dyn ResponseHandler<A>>>;
}

impl<A, F> ResponseHandlerFactory<A> for F
where
    A: Actor,
    F: Fn(&ParamType) -> Option<Arc<dyn ResponseHandler<A>>> + Send + Sync,
{
    fn create(&self, ty: &ParamType) -> Option<Arc<dyn ResponseHandler<A>>> {
        self(ty)
    }
}

/// Replies to the actor with a returned `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyResponse;

impl<A: Actor> ResponseHandler<A> for ReplyResponse {
    fn handle(&self, value: Value, context: &ExecutionContext<A>) {
        if let Some(text) = value.get::<String>() {
            context.actor().reply(text);
        }
    }
}

/// Built-in factory: `String` return values are sent to the actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinResponses;

impl<A: Actor> ResponseHandlerFactory<A> for BuiltinResponses {
    fn create(&self, ty: &ParamType) -> Option<Arc<dyn ResponseHandler<A>>> {
        ty.is::<String>()
            .then(|| Arc::new(ReplyResponse) as Arc<dyn ResponseHandler<A>>)
    }
}
