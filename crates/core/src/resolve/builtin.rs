use std::sync::Arc;

use tracing::trace;

use super::{Resolver, ResolverFactory, ResolverRegistry, ValueResolver};
use crate::actor::{Actor, ActorName};
use crate::context::ExecutionContext;
use crate::error::{CommandError, InvalidReason};
use crate::param::{ParamKind, ParamSpec};
use crate::stream::MutableStringStream;
use crate::suggest::{StaticSuggestions, SuggestionProvider, UnionSuggestions};
use crate::value::{ChoiceMaker, Either, ParamType, TypeShape, Value};

/// The primitive types with built-in resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// One (possibly quoted) word.
    String,
    /// Exactly one character.
    Char,
    /// `true`/`yes`/`false`/`no`/`nope`.
    Bool,
    /// `i8`.
    I8,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `f32`, finite only.
    F32,
    /// `f64`, finite only.
    F64,
}

impl ScalarKind {
    /// The kind for a scalar type, if it is a built-in primitive.
    pub fn of(ty: &ParamType) -> Option<Self> {
        Some(if ty.is::<String>() {
            Self::String
        } else if ty.is::<char>() {
            Self::Char
        } else if ty.is::<bool>() {
            Self::Bool
        } else if ty.is::<i8>() {
            Self::I8
        } else if ty.is::<i16>() {
            Self::I16
        } else if ty.is::<i32>() {
            Self::I32
        } else if ty.is::<i64>() {
            Self::I64
        } else if ty.is::<f32>() {
            Self::F32
        } else if ty.is::<f64>() {
            Self::F64
        } else {
            return None;
        })
    }
}

/// Reads one token as a primitive.
#[derive(Debug, Clone)]
pub struct ScalarResolver {
    parameter: String,
    kind: ScalarKind,
}

impl ScalarResolver {
    /// Resolver for `kind`, reporting errors against `parameter`.
    pub fn new(parameter: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            parameter: parameter.into(),
            kind,
        }
    }
}

impl<A: Actor> ValueResolver<A> for ScalarResolver {
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        _: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        Ok(match self.kind {
            ScalarKind::String => Value::new(input.read_string()?),
            ScalarKind::Char => {
                let start = input.position();
                let word = input.read_string()?;
                let mut chars = word.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::new(c),
                    _ => {
                        input.set_position(start);
                        return Err(CommandError::invalid_value(
                            &self.parameter,
                            word,
                            InvalidReason::Custom("expected a single character".into()),
                        ));
                    }
                }
            }
            ScalarKind::Bool => Value::new(input.read_boolean()?),
            ScalarKind::I8 => Value::new(input.read_byte()?),
            ScalarKind::I16 => Value::new(input.read_short()?),
            ScalarKind::I32 => Value::new(input.read_int()?),
            ScalarKind::I64 => Value::new(input.read_long()?),
            ScalarKind::F32 => Value::new(input.read_float()?),
            ScalarKind::F64 => Value::new(input.read_double()?),
        })
    }

    fn default_suggestions(&self) -> Option<Arc<dyn SuggestionProvider<A>>> {
        (self.kind == ScalarKind::Bool)
            .then(|| Arc::new(StaticSuggestions::new(["true", "false"])) as Arc<dyn SuggestionProvider<A>>)
    }
}

/// Takes the rest of the input as one string.
///
/// If the rest is exactly one quoted string, the quotes are removed and
/// escapes applied; otherwise the text is taken verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyStringResolver;

impl<A: Actor> ValueResolver<A> for GreedyStringResolver {
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        _: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        if input.peek() == Some('"') {
            let mut quoted = input.clone();
            if let Ok(text) = quoted.read_string()
                && quoted.peek_remaining().trim().is_empty()
            {
                input.skip_to_end();
                return Ok(Value::new(text));
            }
        }
        Ok(Value::new(input.consume_remaining()))
    }
}

/// Case-insensitive match against a fixed set of constants.
#[derive(Clone)]
pub struct ChoiceResolver {
    parameter: String,
    constants: Arc<[String]>,
    make: ChoiceMaker,
}

impl ChoiceResolver {
    /// Resolver for the choice constants of `ty`. Returns `None` if `ty` is
    /// not a choice type.
    pub fn new(parameter: impl Into<String>, ty: &ParamType) -> Option<Self> {
        match ty.shape() {
            TypeShape::Choice { constants, make } => Some(Self {
                parameter: parameter.into(),
                constants: Arc::clone(constants),
                make: Arc::clone(make),
            }),
            _ => None,
        }
    }
}

impl<A: Actor> ValueResolver<A> for ChoiceResolver {
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        _: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        let start = input.position();
        let word = input.read_string()?;
        let lowered = word.to_lowercase();
        match self
            .constants
            .iter()
            .position(|c| c.to_lowercase() == lowered)
        {
            Some(index) => Ok((self.make)(index)),
            None => {
                input.set_position(start);
                Err(CommandError::invalid_value(
                    &self.parameter,
                    word,
                    InvalidReason::NotAChoice {
                        choices: self.constants.to_vec(),
                    },
                ))
            }
        }
    }

    fn default_suggestions(&self) -> Option<Arc<dyn SuggestionProvider<A>>> {
        Some(Arc::new(StaticSuggestions::new(self.constants.iter().cloned())))
    }
}

/// Reads a delimited list of element values into a `Vec<Value>`.
///
/// With the default space delimiter the list takes the rest of the input.
/// With any other delimiter it takes one token and splits it.
pub struct ListResolver<A: Actor> {
    parameter: String,
    element: Arc<dyn ValueResolver<A>>,
    delimiter: char,
    size: Option<(usize, Option<usize>)>,
}

impl<A: Actor> ListResolver<A> {
    /// Resolver for lists of `element`.
    pub fn new(
        parameter: impl Into<String>,
        element: Arc<dyn ValueResolver<A>>,
        delimiter: char,
        size: Option<(usize, Option<usize>)>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            element,
            delimiter,
            size,
        }
    }

    fn read_spaced(
        &self,
        input: &mut MutableStringStream,
        context: &ExecutionContext<A>,
    ) -> Result<Vec<Value>, CommandError> {
        let mut items = Vec::new();
        while input.has_remaining() {
            items.push(self.element.resolve(input, context)?);
            if input.has_remaining() {
                if !input.peek().is_some_and(char::is_whitespace) {
                    return Err(CommandError::ExpectedWhitespace);
                }
                input.skip_whitespace();
            }
        }
        Ok(items)
    }

    fn read_split(
        &self,
        input: &mut MutableStringStream,
        context: &ExecutionContext<A>,
    ) -> Result<Vec<Value>, CommandError> {
        let token = input.read_string()?;
        if token.is_empty() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        for piece in token.split(self.delimiter) {
            let mut sub = MutableStringStream::new(piece);
            items.push(self.element.resolve(&mut sub, context)?);
            if sub.has_remaining() {
                return Err(CommandError::invalid_value(
                    &self.parameter,
                    piece,
                    InvalidReason::Custom(format!(
                        "unexpected '{}' in list element",
                        sub.peek_remaining()
                    )),
                ));
            }
        }
        Ok(items)
    }
}

impl<A: Actor> ValueResolver<A> for ListResolver<A> {
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        context: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        let start = input.position();
        let items = if self.delimiter == ' ' {
            self.read_spaced(input, context)?
        } else {
            self.read_split(input, context)?
        };
        if let Some((min, max)) = self.size {
            let actual = items.len();
            if actual < min || max.is_some_and(|max| actual > max) {
                let text = input.source()[start..input.position()].to_string();
                return Err(CommandError::invalid_value(
                    &self.parameter,
                    text,
                    InvalidReason::ListSize { min, max, actual },
                ));
            }
        }
        Ok(Value::new(items))
    }

    fn default_suggestions(&self) -> Option<Arc<dyn SuggestionProvider<A>>> {
        self.element.default_suggestions()
    }

    fn resolves_empty(&self) -> bool {
        true
    }
}

/// Tries one resolver, then another from the same starting position.
///
/// Resolves to [`Either::First`] or [`Either::Second`]. When both fail the
/// second branch's error is reported.
pub struct EitherResolver<A: Actor> {
    first: Arc<dyn ValueResolver<A>>,
    second: Arc<dyn ValueResolver<A>>,
}

impl<A: Actor> EitherResolver<A> {
    /// Resolver trying `first`, then `second`.
    pub fn new(first: Arc<dyn ValueResolver<A>>, second: Arc<dyn ValueResolver<A>>) -> Self {
        Self { first, second }
    }
}

impl<A: Actor> ValueResolver<A> for EitherResolver<A> {
    fn resolve(
        &self,
        input: &mut MutableStringStream,
        context: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        let start = input.position();
        match self.first.resolve(input, context) {
            Ok(value) => Ok(Value::new(Either::First(value))),
            Err(error) => {
                trace!(%error, "first branch failed, trying second");
                input.set_position(start);
                let value = self.second.resolve(input, context)?;
                Ok(Value::new(Either::Second(value)))
            }
        }
    }

    fn default_suggestions(&self) -> Option<Arc<dyn SuggestionProvider<A>>> {
        let providers: Vec<_> = [&self.first, &self.second]
            .into_iter()
            .filter_map(|r| r.default_suggestions())
            .collect();
        match providers.len() {
            0 => None,
            1 => providers.into_iter().next(),
            _ => Some(Arc::new(providers.into_iter().collect::<UnionSuggestions<A>>())),
        }
    }
}

/// Resolvers for primitives, enums and choices, lists, either types, and
/// [`ActorName`].
///
/// Registered after every user factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFactory;

impl<A: Actor> ResolverFactory<A> for BuiltinFactory {
    fn create(&self, param: &ParamSpec<A>, registry: &ResolverRegistry<A>) -> Option<Resolver<A>> {
        let ty = param.ty();
        if param.attrs().kind == ParamKind::Context {
            return ty.is::<ActorName>().then(|| {
                Resolver::context(|ctx: &ExecutionContext<A>| {
                    Ok(Value::new(ActorName(ctx.actor().name().to_string())))
                })
            });
        }
        match ty.shape() {
            TypeShape::Scalar => {
                let kind = ScalarKind::of(ty)?;
                if kind == ScalarKind::String && param.attrs().greedy {
                    return Some(Resolver::value(GreedyStringResolver));
                }
                Some(Resolver::value(ScalarResolver::new(param.name(), kind)))
            }
            TypeShape::Choice { .. } => {
                ChoiceResolver::new(param.name(), ty).map(Resolver::value)
            }
            TypeShape::List(element) => {
                let element_spec = ParamSpec::of(param.name(), (**element).clone());
                let Some(Resolver::Value(element)) = registry.find(&element_spec) else {
                    trace!(parameter = param.name(), "no value resolver for list element");
                    return None;
                };
                Some(Resolver::value(ListResolver::new(
                    param.name(),
                    element,
                    param.attrs().delimiter,
                    param.attrs().size,
                )))
            }
            TypeShape::Either(first, second) => {
                let branch = |ty: &ParamType| {
                    let spec = ParamSpec::of(param.name(), ty.clone());
                    if let Some(Resolver::Value(r)) = registry.find(&spec) {
                        return Some(r);
                    }
                    trace!(parameter = param.name(), branch = ty.name(), "no value resolver for either branch");
                    None
                };
                let first = branch(first)?;
                let second = branch(second)?;
                Some(Resolver::value(EitherResolver::new(first, second)))
            }
        }
    }
}
