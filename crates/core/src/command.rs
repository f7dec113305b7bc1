//! Command declarations and their compiled, executable form.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cmdtree_settings::Settings;
use serde::Serialize;

use crate::actor::Actor;
use crate::context::ExecutionContext;
use crate::error::{HandlerError, RegistrationError};
use crate::node::{ParameterNode, PathToken, Segment, parse_path};
use crate::param::{ParamKind, ParamSpec};
use crate::resolve::{Resolver, ResolverRegistry, ScalarKind, ScalarResolver, Validator};
use crate::response::{ResponseHandler, ResponseHandlerFactory};
use crate::suggest::SuggestionFactory;
use crate::value::{ParamType, Value};

/// What a handler returns: an optional value for the response handler.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// A command's bound callable.
pub type Handler<A> = Arc<dyn Fn(&Invocation<'_, A>) -> HandlerResult + Send + Sync>;

// ── Invocation ───────────────────────────────────────────────────────────

/// The arguments a handler is called with: positional parameters in path
/// order, named and context parameters at their declared positions.
pub struct Invocation<'a, A: Actor> {
    context: &'a ExecutionContext<A>,
    values: &'a [(String, Option<Value>)],
}

impl<'a, A: Actor> Invocation<'a, A> {
    pub(crate) fn new(
        context: &'a ExecutionContext<A>,
        values: &'a [(String, Option<Value>)],
    ) -> Self {
        Self { context, values }
    }

    /// The execution context.
    pub fn context(&self) -> &'a ExecutionContext<A> {
        self.context
    }

    /// The actor running the command.
    pub fn actor(&self) -> &'a A {
        self.context.actor()
    }

    /// Send a message to the actor.
    pub fn reply(&self, message: &str) {
        self.context.actor().reply(message);
    }

    /// The raw value of the named argument, if it was supplied.
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// The named argument as a `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&'a T> {
        self.value(name)?.get::<T>()
    }

    /// The argument at handler position `index` as a `T`.
    pub fn arg<T: Any>(&self, index: usize) -> Option<&'a T> {
        self.values.get(index)?.1.as_ref()?.get::<T>()
    }

    /// `(name, value)` pairs in handler order; absent optionals are `None`.
    pub fn args(&self) -> impl Iterator<Item = (&'a str, Option<&'a Value>)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    /// Number of declared arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the command declares no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ── CommandSpec ──────────────────────────────────────────────────────────

/// A command declaration, built fluently and passed to
/// [`CommandEngine::register`](crate::CommandEngine::register).
///
/// Path strings are whitespace-separated words; `<name>` refers to a
/// declared positional parameter (an undeclared name becomes a `String`
/// parameter). Declared positional parameters missing from the path are
/// appended in declaration order.
pub struct CommandSpec<A: Actor> {
    path: String,
    aliases: Vec<String>,
    params: Vec<ParamSpec<A>>,
    handler: Option<Handler<A>>,
    permission: Option<String>,
    description: Option<String>,
    secret: bool,
    cooldown: Option<Duration>,
    returns: Option<ParamType>,
    response: Option<Arc<dyn ResponseHandler<A>>>,
}

impl<A: Actor> CommandSpec<A> {
    /// Start a declaration at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            aliases: Vec::new(),
            params: Vec::new(),
            handler: None,
            permission: None,
            description: None,
            secret: false,
            cooldown: None,
            returns: None,
            response: None,
        }
    }

    /// Register the command a second time with its leading literals
    /// replaced by `literals` (e.g. `"tp"` for `teleport <target>`).
    pub fn alias(mut self, literals: impl Into<String>) -> Self {
        self.aliases.push(literals.into());
        self
    }

    /// Declare a parameter.
    ///
    /// Handler arguments list positional parameters in path order (declared
    /// ones missing from the path follow it). Flags, switches and context
    /// parameters keep their declaration position relative to them.
    pub fn param(mut self, param: ParamSpec<A>) -> Self {
        self.params.push(param);
        self
    }

    /// Bind the handler.
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Invocation<'_, A>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Bind a handler that cannot fail and returns nothing.
    pub fn run<F>(self, f: F) -> Self
    where
        F: Fn(&Invocation<'_, A>) + Send + Sync + 'static,
    {
        self.handler(move |inv| {
            f(inv);
            Ok(None)
        })
    }

    /// Permission the actor needs to run this command.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Human-readable description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Dispatchable but never suggested.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Let each actor run the command at most once per `duration`.
    ///
    /// Aliases share the cooldown of the command they alias.
    pub fn cooldown(mut self, duration: Duration) -> Self {
        self.cooldown = Some(duration);
        self
    }

    /// Declare the handler's return type; picks the response handler at
    /// registration instead of per call.
    pub fn returns<T: Any>(mut self) -> Self {
        self.returns = Some(ParamType::of::<T>());
        self
    }

    /// Use `handler` for return values instead of asking the factories.
    pub fn response(mut self, handler: impl ResponseHandler<A> + 'static) -> Self {
        self.response = Some(Arc::new(handler));
        self
    }

    /// The declared path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn compile(
        self,
        c: &Compiler<'_, A>,
    ) -> Result<Vec<ExecutableCommand<A>>, RegistrationError> {
        let path = self.path.trim().to_string();
        let handler = self
            .handler
            .ok_or_else(|| RegistrationError::MissingHandler { path: path.clone() })?;
        let tokens = parse_path(&path)?;
        let mut params = self.params;

        let mut names = HashSet::new();
        for p in &params {
            if !names.insert(p.name.clone()) {
                return Err(RegistrationError::DuplicateParameter {
                    path,
                    name: p.name.clone(),
                });
            }
        }

        // Undeclared path parameters are strings and come first, in path order.
        let implicit: Vec<ParamSpec<A>> = tokens
            .iter()
            .filter_map(|t| match t {
                PathToken::Parameter(name) if !params.iter().any(|p| p.name == *name) => {
                    Some(ParamSpec::new::<String>(name.clone()))
                }
                _ => None,
            })
            .collect();
        params.splice(0..0, implicit);

        let mut in_path = HashSet::new();
        for token in &tokens {
            let PathToken::Parameter(name) = token else {
                continue;
            };
            if !in_path.insert(name.as_str()) {
                return Err(RegistrationError::DuplicateParameter {
                    path,
                    name: name.clone(),
                });
            }
            if params.iter().any(|p| p.name == *name && p.attrs.kind != ParamKind::Positional) {
                return Err(RegistrationError::InvalidPath {
                    path,
                    reason: format!("'{name}' is not positional and cannot appear in the path"),
                });
            }
        }

        let mut order = tokens.clone();
        for p in &params {
            if p.attrs.kind == ParamKind::Positional && !in_path.contains(p.name.as_str()) {
                order.push(PathToken::Parameter(p.name.clone()));
            }
        }

        check_flags(&path, &params)?;

        let mut nodes: HashMap<String, Arc<ParameterNode<A>>> = HashMap::new();
        for p in &params {
            nodes.insert(p.name.clone(), Arc::new(c.compile_param(&path, p)?));
        }

        check_order(&path, &order, &nodes)?;

        let flags: Vec<_> = params
            .iter()
            .filter(|p| p.is_named())
            .filter_map(|p| nodes.get(&p.name).map(Arc::clone))
            .collect();
        // Positional slots are filled in path order; flags and context
        // parameters keep their declared position among them.
        let mut by_path = order.iter().filter_map(|t| match t {
            PathToken::Parameter(name) => Some(name),
            PathToken::Literal(_) => None,
        });
        let slots: Vec<_> = params
            .iter()
            .filter_map(|p| match p.attrs.kind {
                ParamKind::Context => nodes.get(&p.name).map(|n| Slot::Context(Arc::clone(n))),
                ParamKind::Positional => by_path.next().map(|name| Slot::Value(name.clone())),
                _ => Some(Slot::Value(p.name.clone())),
            })
            .collect();

        let returns = self.returns;
        let response = self
            .response
            .or_else(|| returns.as_ref().and_then(|ty| c.response_for(ty)));

        let mut variants = vec![order.clone()];
        let leading = order
            .iter()
            .take_while(|t| matches!(t, PathToken::Literal(_)))
            .count();
        for alias in &self.aliases {
            let alias_tokens = parse_path(alias)?;
            if alias_tokens
                .iter()
                .any(|t| matches!(t, PathToken::Parameter(_)))
            {
                return Err(RegistrationError::InvalidPath {
                    path: alias.clone(),
                    reason: "an alias may only contain literals".into(),
                });
            }
            let mut variant = alias_tokens;
            variant.extend(order[leading..].iter().cloned());
            variants.push(variant);
        }

        let mut commands = Vec::with_capacity(variants.len());
        let mut origin: Option<Arc<str>> = None;
        let cooldown_ms = self
            .cooldown
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        for variant in variants {
            let leading = variant
                .iter()
                .take_while(|t| matches!(t, PathToken::Literal(_)))
                .count();
            let segments: Vec<Segment<A>> = variant
                .iter()
                .map(|t| match t {
                    PathToken::Literal(w) => Segment::Literal(w.clone()),
                    PathToken::Parameter(n) => Segment::Parameter(Arc::clone(&nodes[n])),
                })
                .collect();
            let rendered = render_path(&segments);
            if leading > c.settings.max_leading_literals {
                return Err(RegistrationError::TooManyLeadingLiterals {
                    path: rendered,
                    max: c.settings.max_leading_literals,
                });
            }
            let usage = render_usage(&segments, &flags, &c.settings.long_flag_prefix);
            // The first variant is the declared path; aliases point back at it.
            let origin = Arc::clone(origin.get_or_insert_with(|| Arc::from(rendered.as_str())));
            commands.push(ExecutableCommand {
                info: CommandInfo {
                    path: rendered,
                    usage,
                    description: self.description.clone(),
                    permission: self.permission.clone(),
                    secret: self.secret,
                    cooldown_ms,
                },
                origin,
                cooldown: self.cooldown,
                segments,
                flags: flags.clone(),
                slots: slots.clone(),
                handler: Arc::clone(&handler),
                returns: returns.clone(),
                response: response.as_ref().map(Arc::clone),
            });
        }
        Ok(commands)
    }
}

impl<A: Actor> fmt::Debug for CommandSpec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("path", &self.path)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn check_flags<A: Actor>(path: &str, params: &[ParamSpec<A>]) -> Result<(), RegistrationError> {
    let mut longs = HashSet::new();
    let mut shorts = HashSet::new();
    for p in params {
        let Some((long, short)) = p.attrs.kind.flag_names() else {
            continue;
        };
        if !long.starts_with(char::is_alphabetic) || long.contains(char::is_whitespace) {
            return Err(RegistrationError::InvalidPath {
                path: path.to_string(),
                reason: format!("flag name '{long}' must start with a letter and contain no spaces"),
            });
        }
        if !longs.insert(long.to_string()) {
            return Err(RegistrationError::DuplicateFlag {
                path: path.to_string(),
                flag: long.to_string(),
            });
        }
        if let Some(c) = short {
            if !c.is_alphabetic() {
                return Err(RegistrationError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("flag shorthand '{c}' must be a letter"),
                });
            }
            if !shorts.insert(c) {
                return Err(RegistrationError::DuplicateFlag {
                    path: path.to_string(),
                    flag: c.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// No literal or required parameter after an optional one; anything that
/// takes the rest of the input must come last.
fn check_order<A: Actor>(
    path: &str,
    order: &[PathToken],
    nodes: &HashMap<String, Arc<ParameterNode<A>>>,
) -> Result<(), RegistrationError> {
    let invalid = |reason: String| RegistrationError::InvalidOrder {
        path: path.to_string(),
        reason,
    };
    let mut optional: Option<&str> = None;
    for (i, token) in order.iter().enumerate() {
        match token {
            PathToken::Literal(word) => {
                if let Some(opt) = optional {
                    return Err(invalid(format!(
                        "literal '{word}' follows optional parameter '{opt}'"
                    )));
                }
            }
            PathToken::Parameter(name) => {
                let node = &nodes[name];
                if node.is_optional() {
                    optional = Some(name);
                } else if let Some(opt) = optional {
                    return Err(invalid(format!(
                        "required parameter '{name}' follows optional parameter '{opt}'"
                    )));
                }
                if node.consumes_rest() && i + 1 != order.len() {
                    return Err(invalid(format!(
                        "'{name}' takes the rest of the input and must come last"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn render_path<A: Actor>(segments: &[Segment<A>]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Literal(w) => w.clone(),
            Segment::Parameter(p) => format!("<{}>", p.name()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_usage<A: Actor>(
    segments: &[Segment<A>],
    flags: &[Arc<ParameterNode<A>>],
    long_prefix: &str,
) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Literal(w) => w.clone(),
            Segment::Parameter(p) => p.usage(long_prefix),
        })
        .chain(flags.iter().map(|f| f.usage(long_prefix)))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Compiler ─────────────────────────────────────────────────────────────

/// Registration-time lookups used to turn a [`CommandSpec`] into
/// [`ExecutableCommand`]s.
pub(crate) struct Compiler<'a, A: Actor> {
    pub(crate) settings: &'a Settings,
    pub(crate) registry: &'a ResolverRegistry<A>,
    pub(crate) validators: &'a [Arc<dyn Validator<A>>],
    pub(crate) suggestion_factories: &'a [Arc<dyn SuggestionFactory<A>>],
    pub(crate) response_factories: &'a [Arc<dyn ResponseHandlerFactory<A>>],
}

impl<A: Actor> Compiler<'_, A> {
    fn compile_param(
        &self,
        path: &str,
        p: &ParamSpec<A>,
    ) -> Result<ParameterNode<A>, RegistrationError> {
        let resolver = match self.registry.find(p) {
            Some(r) => r,
            None if matches!(p.attrs.kind, ParamKind::Switch { .. }) => {
                Resolver::value(ScalarResolver::new(p.name.clone(), ScalarKind::Bool))
            }
            None => {
                return Err(RegistrationError::NoResolver {
                    path: path.to_string(),
                    name: p.name.clone(),
                    type_name: p.ty.name().to_string(),
                });
            }
        };

        let needs_context = p.is_context();
        let is_context = resolver.as_context().is_some();
        if needs_context != is_context {
            return Err(RegistrationError::WrongResolverKind {
                path: path.to_string(),
                name: p.name.clone(),
                expected: if needs_context { "context" } else { "value" },
            });
        }

        let suggestions = p
            .suggestions
            .clone()
            .or_else(|| self.suggestion_factories.iter().find_map(|f| f.create(p)))
            .or_else(|| resolver.as_value().and_then(|r| r.default_suggestions()));
        let validators = self
            .validators
            .iter()
            .filter(|v| v.applies_to(p))
            .map(Arc::clone)
            .collect();

        Ok(ParameterNode {
            name: p.name.clone(),
            ty: p.ty.clone(),
            attrs: p.attrs.clone(),
            description: p.description.clone(),
            resolver,
            suggestions,
            validators,
        })
    }

    pub(crate) fn response_for(&self, ty: &ParamType) -> Option<Arc<dyn ResponseHandler<A>>> {
        self.response_factories.iter().find_map(|f| f.create(ty))
    }
}

// ── ExecutableCommand ────────────────────────────────────────────────────

/// Serializable summary of a registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    /// Literals and parameter names, e.g. `give <selector> <item>`.
    pub path: String,
    /// Full usage with optional markers and flags.
    pub usage: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Permission required to run the command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    /// Hidden from suggestions.
    pub secret: bool,
    /// Per-actor cooldown in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,
}

/// Where a handler argument comes from.
pub enum Slot<A: Actor> {
    /// A positional or flag value, by parameter name.
    Value(String),
    /// A context parameter resolved just before invocation.
    Context(Arc<ParameterNode<A>>),
}

impl<A: Actor> Clone for Slot<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(n) => Self::Value(n.clone()),
            Self::Context(p) => Self::Context(Arc::clone(p)),
        }
    }
}

/// A registered command: its path, compiled parameters, and handler.
pub struct ExecutableCommand<A: Actor> {
    info: CommandInfo,
    origin: Arc<str>,
    cooldown: Option<Duration>,
    segments: Vec<Segment<A>>,
    flags: Vec<Arc<ParameterNode<A>>>,
    slots: Vec<Slot<A>>,
    handler: Handler<A>,
    returns: Option<ParamType>,
    response: Option<Arc<dyn ResponseHandler<A>>>,
}

impl<A: Actor> ExecutableCommand<A> {
    /// Serializable summary.
    pub fn info(&self) -> &CommandInfo {
        &self.info
    }

    /// Path as registered, e.g. `give <selector> <item>`.
    pub fn path(&self) -> &str {
        &self.info.path
    }

    /// Usage string, e.g. `give <selector> <item> [amount] [--silent]`.
    pub fn usage(&self) -> &str {
        &self.info.usage
    }

    /// Permission required to run the command.
    pub fn permission(&self) -> Option<&str> {
        self.info.permission.as_deref()
    }

    /// Whether the command is hidden from suggestions.
    pub fn is_secret(&self) -> bool {
        self.info.secret
    }

    /// Rendered path of the declaration this command was compiled from.
    /// Equal to [`path`](Self::path) except for aliases.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Per-actor cooldown, if declared.
    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    /// Path segments in order.
    pub fn segments(&self) -> &[Segment<A>] {
        &self.segments
    }

    /// Flags and switches, in declaration order.
    pub fn flags(&self) -> &[Arc<ParameterNode<A>>] {
        &self.flags
    }

    /// Handler argument sources, in handler order.
    pub fn slots(&self) -> &[Slot<A>] {
        &self.slots
    }

    /// The flag whose long name is `name`.
    pub fn flag_by_name(&self, name: &str) -> Option<&Arc<ParameterNode<A>>> {
        self.flags
            .iter()
            .find(|f| f.flag_names().is_some_and(|(long, _)| long == name))
    }

    /// The flag whose shorthand is `c`.
    pub fn flag_by_shorthand(&self, c: char) -> Option<&Arc<ParameterNode<A>>> {
        self.flags
            .iter()
            .find(|f| f.flag_names().is_some_and(|(_, short)| short == Some(c)))
    }

    pub(crate) fn handler(&self) -> &Handler<A> {
        &self.handler
    }

    pub(crate) fn returns(&self) -> Option<&ParamType> {
        self.returns.as_ref()
    }

    pub(crate) fn response(&self) -> Option<&Arc<dyn ResponseHandler<A>>> {
        self.response.as_ref()
    }
}

impl<A: Actor> fmt::Debug for ExecutableCommand<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableCommand")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
