//! Permission checks and pre-execution conditions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::trace;

use crate::actor::Actor;
use crate::context::ExecutionContext;
use crate::error::CommandError;

/// Answers whether an actor holds a permission node.
pub trait PermissionReader<A: Actor>: Send + Sync {
    /// Whether `actor` holds `permission`.
    fn has_permission(&self, actor: &A, permission: &str) -> bool;
}

impl<A, F> PermissionReader<A> for F
where
    A: Actor,
    F: Fn(&A, &str) -> bool + Send + Sync,
{
    fn has_permission(&self, actor: &A, permission: &str) -> bool {
        self(actor, permission)
    }
}

/// Grants everything. Used when no reader is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<A: Actor> PermissionReader<A> for AllowAll {
    fn has_permission(&self, _: &A, _: &str) -> bool {
        true
    }
}

/// A check run after arguments resolve and permissions pass, just before
/// the handler is called. Returning an error aborts the dispatch.
pub trait CommandCondition<A: Actor>: Send + Sync {
    /// Fail to stop the command from running.
    fn check(&self, context: &ExecutionContext<A>) -> Result<(), CommandError>;
}

impl<A, F> CommandCondition<A> for F
where
    A: Actor,
    F: Fn(&ExecutionContext<A>) -> Result<(), CommandError> + Send + Sync,
{
    fn check(&self, context: &ExecutionContext<A>) -> Result<(), CommandError> {
        self(context)
    }
}

// ── Cooldowns ────────────────────────────────────────────────────────────

/// Source of the current time for [`CooldownCondition`].
pub type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Enforces [`CommandSpec::cooldown`](crate::CommandSpec::cooldown).
///
/// Installed by [`EngineBuilder::build`](crate::EngineBuilder::build) after
/// every user condition. The first run starts the window; runs by the same
/// actor inside it fail with [`CommandError::OnCooldown`]. Actors are keyed
/// by [`Actor::name`] and commands by their declaration, so aliases share a
/// window.
pub struct CooldownCondition {
    clock: Clock,
    // (actor, command origin) -> end of the window
    until: Mutex<HashMap<(String, String), Instant>>,
}

impl Default for CooldownCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownCondition {
    /// Cooldowns measured on the system monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Instant::now))
    }

    /// Cooldowns measured on `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            until: Mutex::new(HashMap::new()),
        }
    }
}

impl<A: Actor> CommandCondition<A> for CooldownCondition {
    fn check(&self, context: &ExecutionContext<A>) -> Result<(), CommandError> {
        let Some(command) = context.command() else {
            return Ok(());
        };
        let Some(cooldown) = command.cooldown() else {
            return Ok(());
        };
        let now = (self.clock)();
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        until.retain(|_, end| *end > now);

        let key = (context.actor().name().to_string(), command.origin().to_string());
        if let Some(end) = until.get(&key) {
            let remaining = end.saturating_duration_since(now);
            trace!(actor = %key.0, command = %key.1, ?remaining, "on cooldown");
            return Err(CommandError::OnCooldown { remaining });
        }
        until.insert(key, now + cooldown);
        Ok(())
    }
}

impl fmt::Debug for CooldownCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.until.lock().map_or(0, |m| m.len());
        f.debug_struct("CooldownCondition")
            .field("active", &active)
            .finish_non_exhaustive()
    }
}
