//! The engine: configuration, registration, dispatch, and completion.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use cmdtree_settings::Settings;
use tracing::debug;

use crate::actor::Actor;
use crate::command::{CommandInfo, CommandSpec, Compiler};
use crate::context::ExecutionContext;
use crate::dispatch::Dispatcher;
use crate::error::{Failure, RegistrationError};
use crate::exception::{DefaultExceptionHandler, ExceptionHandler};
use crate::node::CommandTree;
use crate::permission::{AllowAll, Clock, CommandCondition, CooldownCondition, PermissionReader};
use crate::resolve::{
    LengthValidator, RangeValidator, Resolver, ResolverFactory, ResolverRegistry, TypedFactory,
    Validator,
};
use crate::response::{BuiltinResponses, ResponseHandlerFactory};
use crate::suggest::{Completer, SuggestionFactory, SuggestionProvider, TypeSuggestions};
use crate::value::Value;

// ── EngineBuilder ────────────────────────────────────────────────────────

/// Configures a [`CommandEngine`].
///
/// Every pluggable list is consulted in registration order, with the
/// built-in entries after the user ones.
pub struct EngineBuilder<A: Actor> {
    settings: Settings,
    resolver_factories: Vec<Arc<dyn ResolverFactory<A>>>,
    validators: Vec<Arc<dyn Validator<A>>>,
    suggestion_factories: Vec<Arc<dyn SuggestionFactory<A>>>,
    response_factories: Vec<Arc<dyn ResponseHandlerFactory<A>>>,
    conditions: Vec<Arc<dyn CommandCondition<A>>>,
    cooldown_clock: Option<Clock>,
    permissions: Arc<dyn PermissionReader<A>>,
    exception_handler: Arc<dyn ExceptionHandler<A>>,
}

impl<A: Actor> Default for EngineBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Actor> EngineBuilder<A> {
    /// Default settings, built-in resolvers only, everyone allowed.
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            resolver_factories: Vec::new(),
            validators: Vec::new(),
            suggestion_factories: Vec::new(),
            response_factories: Vec::new(),
            conditions: Vec::new(),
            cooldown_clock: None,
            permissions: Arc::new(AllowAll),
            exception_handler: Arc::new(DefaultExceptionHandler),
        }
    }

    /// Replace the settings.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a resolver factory, consulted before the built-ins.
    pub fn resolver_factory(mut self, factory: impl ResolverFactory<A> + 'static) -> Self {
        self.resolver_factories.push(Arc::new(factory));
        self
    }

    /// Use `resolver` for every parameter of type `T`.
    pub fn resolver<T: Any>(self, resolver: Resolver<A>) -> Self {
        self.resolver_factory(TypedFactory {
            id: TypeId::of::<T>(),
            resolver,
        })
    }

    /// Add a validator, run before the built-in range and length checks.
    pub fn validator(mut self, validator: impl Validator<A> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Add a suggestion factory for parameters that declare no provider.
    pub fn suggestion_factory(mut self, factory: impl SuggestionFactory<A> + 'static) -> Self {
        self.suggestion_factories.push(Arc::new(factory));
        self
    }

    /// Use `provider` for every parameter of type `T` that declares none.
    pub fn suggestions_for<T: Any>(self, provider: impl SuggestionProvider<A> + 'static) -> Self {
        self.suggestion_factory(TypeSuggestions::new::<T>(provider))
    }

    /// Add a response handler factory, consulted before the built-in one.
    pub fn response_handler_factory(
        mut self,
        factory: impl ResponseHandlerFactory<A> + 'static,
    ) -> Self {
        self.response_factories.push(Arc::new(factory));
        self
    }

    /// Add a condition checked before every handler call.
    pub fn condition(mut self, condition: impl CommandCondition<A> + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Measure command cooldowns on `clock` instead of the system clock.
    pub fn cooldown_clock(mut self, clock: impl Fn() -> Instant + Send + Sync + 'static) -> Self {
        let clock: Clock = Arc::new(clock);
        self.cooldown_clock = Some(clock);
        self
    }

    /// Replace the permission reader (default: allow everything).
    pub fn permission_reader(mut self, reader: impl PermissionReader<A> + 'static) -> Self {
        self.permissions = Arc::new(reader);
        self
    }

    /// Replace the exception handler.
    pub fn exception_handler(mut self, handler: impl ExceptionHandler<A> + 'static) -> Self {
        self.exception_handler = Arc::new(handler);
        self
    }

    /// Finish configuration.
    pub fn build(self) -> CommandEngine<A> {
        let mut validators = self.validators;
        validators.push(Arc::new(RangeValidator));
        validators.push(Arc::new(LengthValidator));
        let mut response_factories = self.response_factories;
        response_factories.push(Arc::new(BuiltinResponses));
        let mut conditions = self.conditions;
        conditions.push(Arc::new(match self.cooldown_clock {
            Some(clock) => CooldownCondition::with_clock(clock),
            None => CooldownCondition::new(),
        }));
        CommandEngine {
            settings: self.settings,
            registry: ResolverRegistry::new(self.resolver_factories),
            validators,
            suggestion_factories: self.suggestion_factories,
            response_factories,
            conditions,
            permissions: self.permissions,
            exception_handler: self.exception_handler,
            tree: CommandTree::default(),
        }
    }
}

impl<A: Actor + Clone + fmt::Debug> EngineBuilder<A> {
    /// Let commands declare `ParamSpec::context::<A>` to receive the actor.
    pub fn with_actor_parameter(self) -> Self {
        self.resolver::<A>(Resolver::context(|ctx: &ExecutionContext<A>| {
            Ok(Value::new(ctx.actor().clone()))
        }))
    }
}

// ── CommandEngine ────────────────────────────────────────────────────────

/// Registered commands plus everything needed to run them.
///
/// Registration takes `&mut self`; dispatch and completion take `&self`, so
/// a built engine can be shared across threads behind an `Arc`.
pub struct CommandEngine<A: Actor> {
    settings: Settings,
    registry: ResolverRegistry<A>,
    validators: Vec<Arc<dyn Validator<A>>>,
    suggestion_factories: Vec<Arc<dyn SuggestionFactory<A>>>,
    response_factories: Vec<Arc<dyn ResponseHandlerFactory<A>>>,
    conditions: Vec<Arc<dyn CommandCondition<A>>>,
    permissions: Arc<dyn PermissionReader<A>>,
    exception_handler: Arc<dyn ExceptionHandler<A>>,
    tree: CommandTree<A>,
}

impl<A: Actor> CommandEngine<A> {
    /// Shorthand for [`EngineBuilder::new`].
    pub fn builder() -> EngineBuilder<A> {
        EngineBuilder::new()
    }

    /// Compile `spec` and merge it (and its aliases) into the tree.
    ///
    /// Either every variant is added or none is.
    pub fn register(&mut self, spec: CommandSpec<A>) -> Result<(), RegistrationError> {
        let path = spec.path().to_string();
        let compiler = Compiler {
            settings: &self.settings,
            registry: &self.registry,
            validators: &self.validators,
            suggestion_factories: &self.suggestion_factories,
            response_factories: &self.response_factories,
        };
        let commands = spec.compile(&compiler)?;

        let mut staged = self.tree.clone();
        for command in commands {
            debug!(path = command.path(), usage = command.usage(), "registering command");
            staged.insert(Arc::new(command))?;
        }
        self.tree = staged;
        debug!(%path, "registered");
        Ok(())
    }

    /// Remove the command at `path` and every command below it, aliases
    /// included. Returns whether anything was removed.
    ///
    /// `path` is matched word by word against registered paths, with
    /// parameters written as `<name>` (e.g. `team add <name>`).
    pub fn unregister(&mut self, path: &str) -> bool {
        let removed = self.tree.remove(path);
        debug!(path, removed, "unregistered");
        removed > 0
    }

    /// Remove every registered command.
    pub fn unregister_all(&mut self) {
        self.tree.clear();
        debug!("unregistered all commands");
    }

    /// Parse and run `input` on behalf of `actor`.
    ///
    /// On failure the exception handler has already reported to the actor;
    /// the returned [`Failure`] is for the caller.
    pub fn dispatch(
        &self,
        actor: impl Into<Arc<A>>,
        input: &str,
    ) -> Result<ExecutionContext<A>, Failure<A>> {
        let actor = actor.into();
        let dispatcher = Dispatcher {
            tree: &self.tree,
            settings: &self.settings,
            permissions: self.permissions.as_ref(),
            conditions: &self.conditions,
            response_factories: &self.response_factories,
        };
        match dispatcher.dispatch(Arc::clone(&actor), input) {
            Ok(ctx) => {
                debug!(
                    actor = actor.name(),
                    command = ctx.command().map(|c| c.path()),
                    "dispatched"
                );
                Ok(ctx)
            }
            Err(failure) => {
                debug!(
                    actor = actor.name(),
                    input,
                    code = failure.error.code(),
                    context = failure.context.kind(),
                    "dispatch failed: {}",
                    failure.error
                );
                self.exception_handler.handle(&failure, &actor);
                Err(failure)
            }
        }
    }

    /// Completion candidates for `input` as typed so far by `actor`.
    pub fn suggest(&self, actor: impl Into<Arc<A>>, input: &str) -> Vec<String> {
        let completer = Completer {
            tree: &self.tree,
            settings: &self.settings,
            permissions: self.permissions.as_ref(),
        };
        completer.complete(actor.into(), input)
    }

    /// Summaries of every registered command, aliases included.
    pub fn commands(&self) -> Vec<CommandInfo> {
        self.tree
            .commands()
            .iter()
            .map(|c| c.info().clone())
            .collect()
    }

    /// The merged command tree.
    pub fn tree(&self) -> &CommandTree<A> {
        &self.tree
    }

    /// Active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<A: Actor> fmt::Debug for CommandEngine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEngine")
            .field("settings", &self.settings)
            .field("commands", &self.tree.commands().len())
            .finish_non_exhaustive()
    }
}
