//! Declarative parameter definitions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::actor::Actor;
use crate::resolve::Resolver;
use crate::suggest::{StaticSuggestions, SuggestionProvider};
use crate::value::{ParamType, TypeShape};

/// How a parameter receives its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Read from input in path order.
    Positional,
    /// A named option that takes a value: `--name value` / `-n value`.
    Flag {
        /// Long name (without prefix).
        name: String,
        /// Single-character shorthand, if any.
        shorthand: Option<char>,
    },
    /// A named boolean: present means `true`, absent means `false`.
    Switch {
        /// Long name (without prefix).
        name: String,
        /// Single-character shorthand, if any.
        shorthand: Option<char>,
    },
    /// Produced from the execution context; consumes no input.
    Context,
}

impl ParamKind {
    /// Long name and shorthand for flags and switches.
    pub fn flag_names(&self) -> Option<(&str, Option<char>)> {
        match self {
            Self::Flag { name, shorthand } | Self::Switch { name, shorthand } => {
                Some((name, *shorthand))
            }
            _ => None,
        }
    }
}

/// Structural parameter attributes. Two declarations of the same parameter
/// can share a tree node only if these are equal.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamAttrs {
    /// How the value is supplied.
    pub kind: ParamKind,
    /// Whether the parameter may be omitted.
    pub optional: bool,
    /// Text resolved in place of a missing optional value.
    pub default: Option<String>,
    /// Whether the parameter consumes the rest of the input.
    pub greedy: bool,
    /// Inclusive numeric bounds.
    pub range: Option<(Option<f64>, Option<f64>)>,
    /// Inclusive string length bounds in characters.
    pub length: Option<(usize, Option<usize>)>,
    /// Inclusive list size bounds.
    pub size: Option<(usize, Option<usize>)>,
    /// Separator between list elements.
    pub delimiter: char,
    /// Permission needed to supply this parameter.
    pub permission: Option<String>,
}

impl Default for ParamAttrs {
    fn default() -> Self {
        Self {
            kind: ParamKind::Positional,
            optional: false,
            default: None,
            greedy: false,
            range: None,
            length: None,
            size: None,
            delimiter: ' ',
            permission: None,
        }
    }
}

/// A parameter declaration attached to a [`CommandSpec`](crate::CommandSpec).
///
/// ```
/// use cmdtree_core::ParamSpec;
/// # struct Console;
/// # impl cmdtree_core::Actor for Console {
/// #     fn name(&self) -> &str { "console" }
/// #     fn reply(&self, _: &str) {}
/// #     fn error(&self, _: &str) {}
/// # }
/// let amount: ParamSpec<Console> = ParamSpec::new::<i32>("amount")
///     .optional()
///     .default_value("1")
///     .range(1.0, 64.0);
/// assert_eq!(amount.name(), "amount");
/// ```
pub struct ParamSpec<A: Actor> {
    pub(crate) name: String,
    pub(crate) ty: ParamType,
    pub(crate) attrs: ParamAttrs,
    pub(crate) suggestions: Option<Arc<dyn SuggestionProvider<A>>>,
    pub(crate) resolver: Option<Resolver<A>>,
    pub(crate) description: Option<String>,
}

impl<A: Actor> ParamSpec<A> {
    /// A positional parameter of scalar type `T`.
    pub fn new<T: Any>(name: impl Into<String>) -> Self {
        Self::of(name, ParamType::of::<T>())
    }

    /// A positional parameter of the given type.
    pub fn of(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            attrs: ParamAttrs::default(),
            suggestions: None,
            resolver: None,
            description: None,
        }
    }

    /// A context parameter of type `T`, filled by a context resolver.
    pub fn context<T: Any>(name: impl Into<String>) -> Self {
        let mut spec = Self::new::<T>(name);
        spec.attrs.kind = ParamKind::Context;
        spec
    }

    /// A boolean switch named after the parameter.
    pub fn switch(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut spec = Self::new::<bool>(name.clone());
        spec.attrs.kind = ParamKind::Switch {
            name,
            shorthand: None,
        };
        spec
    }

    /// Make this a flag whose long name is the parameter name.
    pub fn flag(mut self) -> Self {
        self.attrs.kind = ParamKind::Flag {
            name: self.name.clone(),
            shorthand: None,
        };
        self
    }

    /// Override the long name of a flag or switch.
    pub fn long(mut self, long: impl Into<String>) -> Self {
        match &mut self.attrs.kind {
            ParamKind::Flag { name, .. } | ParamKind::Switch { name, .. } => *name = long.into(),
            kind => {
                *kind = ParamKind::Flag {
                    name: long.into(),
                    shorthand: None,
                }
            }
        }
        self
    }

    /// Set the shorthand of a flag or switch (turning a positional into a flag).
    pub fn shorthand(mut self, c: char) -> Self {
        match &mut self.attrs.kind {
            ParamKind::Flag { shorthand, .. } | ParamKind::Switch { shorthand, .. } => {
                *shorthand = Some(c);
            }
            kind => {
                *kind = ParamKind::Flag {
                    name: self.name.clone(),
                    shorthand: Some(c),
                }
            }
        }
        self
    }

    /// Allow the parameter to be omitted.
    pub fn optional(mut self) -> Self {
        self.attrs.optional = true;
        self
    }

    /// Text resolved when the parameter is omitted. Implies [`optional`](Self::optional).
    pub fn default_value(mut self, text: impl Into<String>) -> Self {
        self.attrs.optional = true;
        self.attrs.default = Some(text.into());
        self
    }

    /// Consume the rest of the input as one value.
    pub fn greedy(mut self) -> Self {
        self.attrs.greedy = true;
        self
    }

    /// Inclusive numeric bounds.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.attrs.range = Some((Some(min), Some(max)));
        self
    }

    /// Inclusive lower numeric bound.
    pub fn min(mut self, min: f64) -> Self {
        let max = self.attrs.range.and_then(|(_, hi)| hi);
        self.attrs.range = Some((Some(min), max));
        self
    }

    /// Inclusive upper numeric bound.
    pub fn max(mut self, max: f64) -> Self {
        let min = self.attrs.range.and_then(|(lo, _)| lo);
        self.attrs.range = Some((min, Some(max)));
        self
    }

    /// Inclusive string length bounds, in characters.
    pub fn length(mut self, min: usize, max: Option<usize>) -> Self {
        self.attrs.length = Some((min, max));
        self
    }

    /// Inclusive list size bounds.
    pub fn size(mut self, min: usize, max: Option<usize>) -> Self {
        self.attrs.size = Some((min, max));
        self
    }

    /// Separator between list elements (default: space).
    pub fn delimiter(mut self, c: char) -> Self {
        self.attrs.delimiter = c;
        self
    }

    /// Permission needed to supply this parameter.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.attrs.permission = Some(permission.into());
        self
    }

    /// Suggestion provider for this parameter.
    pub fn suggest(mut self, provider: impl SuggestionProvider<A> + 'static) -> Self {
        self.suggestions = Some(Arc::new(provider));
        self
    }

    /// Fixed suggestion list for this parameter.
    pub fn suggest_values<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggest(StaticSuggestions::new(values))
    }

    /// Resolver to use instead of asking the factories.
    pub fn resolver(mut self, resolver: Resolver<A>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Human-readable description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    /// Structural attributes.
    pub fn attrs(&self) -> &ParamAttrs {
        &self.attrs
    }

    /// Whether this is a flag or switch.
    pub fn is_named(&self) -> bool {
        self.attrs.kind.flag_names().is_some()
    }

    /// Whether this parameter is filled from context.
    pub fn is_context(&self) -> bool {
        self.attrs.kind == ParamKind::Context
    }

    /// Whether the parameter takes everything left in the input: greedy
    /// parameters and space-delimited lists.
    pub fn consumes_rest(&self) -> bool {
        self.attrs.greedy
            || (matches!(self.ty.shape(), TypeShape::List(_)) && self.attrs.delimiter == ' ')
    }
}

impl<A: Actor> Clone for ParamSpec<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            ty: self.ty.clone(),
            attrs: self.attrs.clone(),
            suggestions: self.suggestions.clone(),
            resolver: self.resolver.clone(),
            description: self.description.clone(),
        }
    }
}

impl<A: Actor> fmt::Debug for ParamSpec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}
