//! Runtime-typed argument values and declared parameter types.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

// ── Value ────────────────────────────────────────────────────────────────

/// A resolved argument value of any `Send + Sync` type.
///
/// Cloning is cheap (the payload is shared). Use [`Value::get`] to recover
/// the concrete type.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    debug: Option<fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result>,
}

impl Value {
    /// Wrap a debuggable value.
    pub fn new<T: Any + Send + Sync + fmt::Debug>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            debug: Some(|any, f| match any.downcast_ref::<T>() {
                Some(v) => fmt::Debug::fmt(v, f),
                None => f.write_str("<?>"),
            }),
        }
    }

    /// Wrap a value whose type has no `Debug` impl.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            debug: None,
        }
    }

    /// Borrow the payload as `T`, if that is its type.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// `TypeId` of the payload.
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Fully qualified type name of the payload.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The elements of a list value, if this is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        self.get::<Vec<Value>>().map(Vec::as_slice)
    }

    /// Clone the elements of a list value out as `T`s.
    ///
    /// Returns `None` if this is not a list or any element is not a `T`.
    pub fn to_vec<T: Any + Clone>(&self) -> Option<Vec<T>> {
        self.as_list()?
            .iter()
            .map(|v| v.get::<T>().cloned())
            .collect()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.debug {
            Some(debug) => debug(&*self.inner, f),
            None => write!(f, "<{}>", self.type_name),
        }
    }
}

// ── Either ───────────────────────────────────────────────────────────────

/// The value of an [`either`](ParamType::either) parameter, tagged with
/// the branch that resolved it.
#[derive(Debug, Clone)]
pub enum Either {
    /// Resolved by the first type.
    First(Value),
    /// The first type failed; resolved by the second.
    Second(Value),
}

impl Either {
    /// The resolved value, whichever branch produced it.
    pub fn value(&self) -> &Value {
        match self {
            Either::First(v) | Either::Second(v) => v,
        }
    }

    /// The value as `T`, whichever branch produced it.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.value().get::<T>()
    }

    /// Whether the first type resolved the input.
    pub fn is_first(&self) -> bool {
        matches!(self, Either::First(_))
    }
}

// ── CommandEnum ──────────────────────────────────────────────────────────

/// A Rust enum usable as a parameter type.
///
/// Constants are matched case-insensitively against [`name`](Self::name)
/// and double as the parameter's default suggestions.
///
/// ```
/// use cmdtree_core::CommandEnum;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Mode { Survival, Creative }
///
/// impl CommandEnum for Mode {
///     fn constants() -> &'static [Self] { &[Mode::Survival, Mode::Creative] }
///     fn name(&self) -> &'static str {
///         match self { Mode::Survival => "survival", Mode::Creative => "creative" }
///     }
/// }
/// ```
pub trait CommandEnum: Copy + fmt::Debug + Send + Sync + 'static {
    /// Every constant, in suggestion order.
    fn constants() -> &'static [Self];
    /// The word a user types to pick this constant.
    fn name(&self) -> &'static str;
}

// ── ParamType ────────────────────────────────────────────────────────────

/// Constructor for the value of the `n`th choice constant.
pub type ChoiceMaker = Arc<dyn Fn(usize) -> Value + Send + Sync>;

/// The structure of a declared parameter type.
#[derive(Clone)]
pub enum TypeShape {
    /// A plain value type resolved by a scalar resolver.
    Scalar,
    /// A list of `element` values.
    List(Box<ParamType>),
    /// One of a fixed set of named constants.
    Choice {
        /// Constant names, in declaration order.
        constants: Arc<[String]>,
        /// Builds the value for the constant at a given index.
        make: ChoiceMaker,
    },
    /// A value of the first type, or failing that, of the second.
    Either(Box<ParamType>, Box<ParamType>),
}

/// The declared type of a parameter.
///
/// Two types are equal when they have the same `TypeId` and shape (list
/// element types, either branches, and choice constants included). The
/// display name is informational only.
#[derive(Clone)]
pub struct ParamType {
    id: TypeId,
    name: Cow<'static, str>,
    shape: TypeShape,
}

/// Marker `TypeId` for runtime-defined choice sets.
struct RuntimeChoice;

impl ParamType {
    /// The scalar type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: Cow::Borrowed(short_type_name(std::any::type_name::<T>())),
            shape: TypeShape::Scalar,
        }
    }

    /// A list of `element`. Resolves to a `Vec<Value>`.
    pub fn list_of(element: ParamType) -> Self {
        Self {
            id: TypeId::of::<Vec<Value>>(),
            name: Cow::Owned(format!("List<{}>", element.name)),
            shape: TypeShape::List(Box::new(element)),
        }
    }

    /// Either `first` or `second`, tried in that order. Resolves to an
    /// [`Either`].
    pub fn either(first: ParamType, second: ParamType) -> Self {
        Self {
            id: TypeId::of::<Either>(),
            name: Cow::Owned(format!("Either<{}, {}>", first.name, second.name)),
            shape: TypeShape::Either(Box::new(first), Box::new(second)),
        }
    }

    /// The enum `E`. Resolves to an `E`.
    pub fn enumeration<E: CommandEnum>() -> Self {
        let constants: Arc<[String]> = E::constants().iter().map(|c| c.name().to_string()).collect();
        Self {
            id: TypeId::of::<E>(),
            name: Cow::Borrowed(short_type_name(std::any::type_name::<E>())),
            shape: TypeShape::Choice {
                constants,
                make: Arc::new(|i| match E::constants().get(i) {
                    Some(c) => Value::new(*c),
                    None => Value::opaque(()),
                }),
            },
        }
    }

    /// A runtime-defined set of constants named `name`. Resolves to the
    /// matched constant as a `String`, spelled as declared.
    pub fn choice<I, S>(name: impl Into<Cow<'static, str>>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constants: Arc<[String]> = constants.into_iter().map(Into::into).collect();
        let lookup = Arc::clone(&constants);
        Self {
            id: TypeId::of::<RuntimeChoice>(),
            name: name.into(),
            shape: TypeShape::Choice {
                constants,
                make: Arc::new(move |i| Value::new(lookup.get(i).cloned().unwrap_or_default())),
            },
        }
    }

    /// The scalar type of an already resolved value.
    pub(crate) fn of_value(value: &Value) -> Self {
        Self {
            id: value.type_id(),
            name: Cow::Borrowed(short_type_name(value.type_name())),
            shape: TypeShape::Scalar,
        }
    }

    /// Replace the display name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// `TypeId` of the resolved value.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Whether this is the scalar type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>() && matches!(self.shape, TypeShape::Scalar)
    }

    /// Short display name (e.g. `i32`, `String`, `List<i32>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type's shape.
    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    /// Choice constants, if this is an enum or choice type.
    pub fn constants(&self) -> Option<&[String]> {
        match &self.shape {
            TypeShape::Choice { constants, .. } => Some(constants),
            _ => None,
        }
    }

    /// Whether this is one of the built-in numeric types.
    pub fn is_numeric(&self) -> bool {
        self.is::<i8>()
            || self.is::<i16>()
            || self.is::<i32>()
            || self.is::<i64>()
            || self.is::<f32>()
            || self.is::<f64>()
    }
}

impl PartialEq for ParamType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && match (&self.shape, &other.shape) {
                (TypeShape::Scalar, TypeShape::Scalar) => true,
                (TypeShape::List(a), TypeShape::List(b)) => a == b,
                (TypeShape::Either(a1, b1), TypeShape::Either(a2, b2)) => a1 == a2 && b1 == b2,
                (TypeShape::Choice { constants: a, .. }, TypeShape::Choice { constants: b, .. }) => {
                    a == b
                }
                _ => false,
            }
    }
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Strip module paths from a type name, keeping generic arguments readable:
/// `alloc::string::String` becomes `String`.
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

/// Convert a numeric value to `f64` for range checks.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    if let Some(v) = value.get::<i8>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.get::<i16>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.get::<i32>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.get::<i64>() {
        return Some(*v as f64);
    }
    if let Some(v) = value.get::<f32>() {
        return Some(f64::from(*v));
    }
    value.get::<f64>().copied()
}
