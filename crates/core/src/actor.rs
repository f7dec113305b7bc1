//! The entity that runs commands.

/// Whoever sent the command: a player, a console, a bot user.
///
/// Supplied by the host platform. The engine only ever talks back through
/// [`reply`](Actor::reply) and [`error`](Actor::error).
pub trait Actor: Send + Sync + 'static {
    /// Display name of the actor.
    fn name(&self) -> &str;

    /// Send an ordinary message to the actor.
    fn reply(&self, message: &str);

    /// Send an error message to the actor.
    fn error(&self, message: &str);

    /// Locale tag for messages sent to this actor.
    fn locale(&self) -> &str {
        "en"
    }
}

/// Context parameter type that resolves to the dispatching actor's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorName(pub String);
