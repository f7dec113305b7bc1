//! Per-dispatch state: actor, input, and resolved arguments.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::actor::Actor;
use crate::command::ExecutableCommand;
use crate::error::CommandError;
use crate::value::Value;

// ── Arguments ────────────────────────────────────────────────────────────

/// Resolved arguments, in resolution order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: Vec<(String, Value)>,
}

impl Arguments {
    /// Empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// The raw value for `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// The value for `name` as a `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.value(name)?.get::<T>()
    }

    /// The value for `name` as a `T`, or a [`CommandError::MissingArgument`].
    pub fn require<T: Any>(&self, name: &str) -> Result<&T, CommandError> {
        self.get::<T>(name)
            .ok_or_else(|| CommandError::MissingArgument {
                expected: format!("<{name}>"),
            })
    }

    /// Whether a value was resolved for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// `(name, value)` pairs in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of resolved arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

// ── ExecutionContext ─────────────────────────────────────────────────────

/// Everything known about one dispatch so far.
///
/// Owned by a single dispatch and mutated as parameters resolve. Resolvers,
/// validators, and suggestion providers only ever see it by shared
/// reference.
pub struct ExecutionContext<A: Actor> {
    actor: Arc<A>,
    input: Arc<str>,
    literals: Vec<String>,
    arguments: Arguments,
    command: Option<Arc<ExecutableCommand<A>>>,
}

impl<A: Actor> ExecutionContext<A> {
    /// Fresh context for `actor` running `input`.
    pub fn new(actor: Arc<A>, input: impl Into<Arc<str>>) -> Self {
        Self {
            actor,
            input: input.into(),
            literals: Vec::new(),
            arguments: Arguments::new(),
            command: None,
        }
    }

    /// The actor running the command.
    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// Shared handle to the actor.
    pub fn shared_actor(&self) -> Arc<A> {
        Arc::clone(&self.actor)
    }

    /// The raw input as received.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Literal words matched so far (e.g. `["team", "add"]`).
    pub fn literal_path(&self) -> &[String] {
        &self.literals
    }

    /// Arguments resolved so far.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Shorthand for `arguments().get::<T>(name)`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.arguments.get::<T>(name)
    }

    /// The matched command, once dispatch has reached a leaf.
    pub fn command(&self) -> Option<&ExecutableCommand<A>> {
        self.command.as_deref()
    }

    pub(crate) fn shared_input(&self) -> Arc<str> {
        Arc::clone(&self.input)
    }

    pub(crate) fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub(crate) fn push_literal(&mut self, literal: impl Into<String>) {
        self.literals.push(literal.into());
    }

    /// Drop literals and arguments recorded after a save point.
    pub(crate) fn rewind(&mut self, literals: usize, arguments: usize) {
        self.literals.truncate(literals);
        self.arguments.truncate(arguments);
    }

    pub(crate) fn set_command(&mut self, command: Arc<ExecutableCommand<A>>) {
        self.command = Some(command);
    }
}

impl<A: Actor> Clone for ExecutionContext<A> {
    fn clone(&self) -> Self {
        Self {
            actor: Arc::clone(&self.actor),
            input: Arc::clone(&self.input),
            literals: self.literals.clone(),
            arguments: self.arguments.clone(),
            command: self.command.as_ref().map(Arc::clone),
        }
    }
}

impl<A: Actor> fmt::Debug for ExecutionContext<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("actor", &self.actor.name())
            .field("input", &self.input)
            .field("literals", &self.literals)
            .field("arguments", &self.arguments)
            .field("command", &self.command.as_ref().map(|c| c.usage()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut args = Arguments::new();
        args.insert("a", Value::new(1i32));
        args.insert("b", Value::new(2i32));
        args.insert("a", Value::new(3i32));
        let names: Vec<_> = args.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(args.get::<i32>("a"), Some(&3));
    }

    #[test]
    fn require_reports_missing() {
        let args = Arguments::new();
        let err = args.require::<i32>("amount").unwrap_err();
        assert_eq!(err.to_string(), "missing argument: <amount>");
    }

    #[test]
    fn truncate_drops_later_entries() {
        let mut args = Arguments::new();
        args.insert("a", Value::new(1i32));
        args.insert("b", Value::new(2i32));
        args.truncate(1);
        assert!(args.contains("a"));
        assert!(!args.contains("b"));
    }
}
