//! Turning input tokens and ambient context into typed values.
//!
//! A [`Resolver`] is either a [`ValueResolver`] (reads from the stream) or a
//! [`ContextResolver`] (reads from the [`ExecutionContext`]). Resolvers are
//! picked once per parameter at registration by asking the
//! [`ResolverFactory`]s in order; user factories come before the built-ins.

mod builtin;
mod validate;

use std::fmt;
use std::sync::Arc;

pub use builtin::{
    BuiltinFactory, ChoiceResolver, EitherResolver, GreedyStringResolver, ListResolver,
    ScalarResolver, ScalarKind,
};
pub use validate::{LengthValidator, RangeValidator, Validator};

use crate::actor::Actor;
use crate::context::ExecutionContext;
use crate::error::CommandError;
use crate::param::ParamSpec;
use crate::stream::MutableStringStream;
use crate::suggest::SuggestionProvider;
use crate::value::Value;

/// Reads a value from the input stream.
///
/// Implementations must be deterministic: the same stream state and context
/// always yield the same value and the same cursor advance.
pub trait ValueResolver<A: Actor>: Send + Sync {
    /// Consume input and produce a value.
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        context: &ExecutionContext<A>,
    ) -> Result<Value, CommandError>;

    /// Suggestions to offer when the parameter declares none.
    fn default_suggestions(&self) -> Option<Arc<dyn SuggestionProvider<A>>> {
        None
    }

    /// Whether an omitted optional parameter without a default should be
    /// resolved against an empty stream. When `false` it is left absent.
    fn resolves_empty(&self) -> bool {
        false
    }
}

impl<A, F> ValueResolver<A> for F
where
    A: Actor,
    F: Fn(&mut MutableStringStream, &ExecutionContext<A>) -> Result<Value, CommandError>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        context: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        self(input, context)
    }
}

/// Produces a value without consuming input.
pub trait ContextResolver<A: Actor>: Send + Sync {
    /// Produce the value for this dispatch.
    fn resolve(&self, context: &ExecutionContext<A>) -> Result<Value, CommandError>;
}

impl<A, F> ContextResolver<A> for F
where
    A: Actor,
    F: Fn(&ExecutionContext<A>) -> Result<Value, CommandError> + Send + Sync,
{
    fn resolve(&self, context: &ExecutionContext<A>) -> Result<Value, CommandError> {
        self(context)
    }
}

/// One of the two resolver kinds.
pub enum Resolver<A: Actor> {
    /// Consumes input tokens.
    Value(Arc<dyn ValueResolver<A>>),
    /// Reads ambient context.
    Context(Arc<dyn ContextResolver<A>>),
}

impl<A: Actor> Resolver<A> {
    /// Wrap a value resolver.
    pub fn value(resolver: impl ValueResolver<A> + 'static) -> Self {
        Self::Value(Arc::new(resolver))
    }

    /// Wrap a context resolver.
    pub fn context(resolver: impl ContextResolver<A> + 'static) -> Self {
        Self::Context(Arc::new(resolver))
    }

    /// The value resolver, if this is one.
    pub fn as_value(&self) -> Option<&Arc<dyn ValueResolver<A>>> {
        match self {
            Self::Value(r) => Some(r),
            Self::Context(_) => None,
        }
    }

    /// The context resolver, if this is one.
    pub fn as_context(&self) -> Option<&Arc<dyn ContextResolver<A>>> {
        match self {
            Self::Context(r) => Some(r),
            Self::Value(_) => None,
        }
    }
}

impl<A: Actor> Clone for Resolver<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(r) => Self::Value(Arc::clone(r)),
            Self::Context(r) => Self::Context(Arc::clone(r)),
        }
    }
}

impl<A: Actor> fmt::Debug for Resolver<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Resolver::Value"),
            Self::Context(_) => f.write_str("Resolver::Context"),
        }
    }
}

/// Picks a resolver for a parameter declaration.
pub trait ResolverFactory<A: Actor>: Send + Sync {
    /// Return a resolver if this factory handles `param`. `registry` can be
    /// used to look up resolvers for component types.
    fn create(&self, param: &ParamSpec<A>, registry: &ResolverRegistry<A>) -> Option<Resolver<A>>;
}

impl<A, F> ResolverFactory<A> for F
where
    A: Actor,
    F: Fn(&ParamSpec<A>, &ResolverRegistry<A>) -> Option<Resolver<A>> + Send + Sync,
{
    fn create(&self, param: &ParamSpec<A>, registry: &ResolverRegistry<A>) -> Option<Resolver<A>> {
        self(param, registry)
    }
}

/// Ordered resolver factories.
pub struct ResolverRegistry<A: Actor> {
    factories: Vec<Arc<dyn ResolverFactory<A>>>,
}

impl<A: Actor> ResolverRegistry<A> {
    /// Build a registry from user factories followed by the built-in ones.
    pub fn new(user: Vec<Arc<dyn ResolverFactory<A>>>) -> Self {
        let mut factories = user;
        factories.push(Arc::new(BuiltinFactory));
        Self { factories }
    }

    /// The parameter's explicit resolver, or the first factory answer.
    pub fn find(&self, param: &ParamSpec<A>) -> Option<Resolver<A>> {
        if let Some(explicit) = &param.resolver {
            return Some(explicit.clone());
        }
        self.factories.iter().find_map(|f| f.create(param, self))
    }

    /// Number of factories, built-ins included.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Always `false`: the built-in factory is always present.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// A factory that answers for exactly one scalar type.
pub(crate) struct TypedFactory<A: Actor> {
    pub(crate) id: std::any::TypeId,
    pub(crate) resolver: Resolver<A>,
}

impl<A: Actor> ResolverFactory<A> for TypedFactory<A> {
    fn create(&self, param: &ParamSpec<A>, _: &ResolverRegistry<A>) -> Option<Resolver<A>> {
        (param.ty().id() == self.id).then(|| self.resolver.clone())
    }
}
