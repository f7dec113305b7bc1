//! Reporting failed dispatches to the actor.

use cmdtree_diagnostics::caret_annotation;
use tracing::error;

use crate::actor::Actor;
use crate::error::{CommandError, Failure};

/// Turns a [`Failure`] into something the actor sees.
///
/// Called once per failed dispatch, before the failure is returned to the
/// caller.
pub trait ExceptionHandler<A: Actor>: Send + Sync {
    /// Report `failure` to `actor`.
    fn handle(&self, failure: &Failure<A>, actor: &A);
}

impl<A, F> ExceptionHandler<A> for F
where
    A: Actor,
    F: Fn(&Failure<A>, &A) + Send + Sync,
{
    fn handle(&self, failure: &Failure<A>, actor: &A) {
        self(failure, actor);
    }
}

/// Sends the error message, plus a caret line under the offending input
/// when there is one. Handler failures are logged and reported generically.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionHandler;

impl<A: Actor> ExceptionHandler<A> for DefaultExceptionHandler {
    fn handle(&self, failure: &Failure<A>, actor: &A) {
        match &failure.error {
            CommandError::SendableMessage(text) => actor.reply(text),
            CommandError::CommandInvocationFailed { cause } => {
                error!(
                    actor = actor.name(),
                    input = failure.context.input(),
                    %cause,
                    "command handler failed"
                );
                actor.error(&failure.error.to_string());
            }
            err => match failure.span() {
                Some(span) => {
                    let caret = caret_annotation(failure.context.input(), span);
                    actor.error(&format!("{err}\n{caret}"));
                }
                None => actor.error(&err.to_string()),
            },
        }
    }
}
