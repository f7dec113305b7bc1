//! The closed error taxonomy, error contexts, and registration errors.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cmdtree_diagnostics::{Diagnostic, Span, codes};
use thiserror::Error;

use crate::actor::Actor;
use crate::context::ExecutionContext;

macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        BTreeMap::from([$(($k.to_string(), $v.to_string())),+])
    };
}

// ── CommandError ─────────────────────────────────────────────────────────

/// Every way a single dispatch can fail.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// A quoted string was never closed.
    #[error("unclosed quoted string")]
    UnclosedQuote,

    /// A backslash escaped something other than the delimiter or a backslash.
    #[error("invalid escape character '{0}'")]
    InvalidEscapeCharacter(char),

    /// An argument ran straight into the next one without whitespace.
    #[error("expected whitespace after argument")]
    ExpectedWhitespace,

    /// A token could not be parsed as an integer of the declared width.
    #[error("expected an integer, but found '{input}'")]
    InvalidInteger {
        /// The offending token.
        input: String,
    },

    /// A token could not be parsed as a finite decimal.
    #[error("expected a number, but found '{input}'")]
    InvalidDecimal {
        /// The offending token.
        input: String,
    },

    /// A token was not a recognized boolean word.
    #[error("expected true or false, but found '{input}'")]
    InvalidBoolean {
        /// The offending token.
        input: String,
    },

    /// Input ended before a required parameter or subcommand.
    #[error("missing argument: {expected}")]
    MissingArgument {
        /// What was expected: `<name>` for a parameter, `--name` for a flag,
        /// or the subcommand alternatives.
        expected: String,
    },

    /// Input continued after a complete command while trailing input is rejected.
    #[error("too many arguments, usage: {usage}")]
    TooManyArguments {
        /// Usage string of the matched command.
        usage: String,
        /// The unconsumed text.
        extra: String,
    },

    /// The first word is not a registered command.
    #[error("unknown command: {input}")]
    UnknownCommand {
        /// The word that matched nothing.
        input: String,
    },

    /// A flag or subcommand below the root matched nothing.
    #[error("unknown parameter: {input}")]
    UnknownParameter {
        /// The token that matched nothing.
        input: String,
    },

    /// A resolver or validator rejected the input for a parameter.
    #[error("invalid {parameter} '{input}': {reason}")]
    InvalidValue {
        /// Name of the parameter being resolved.
        parameter: String,
        /// The offending input text.
        input: String,
        /// The constraint that was violated.
        reason: InvalidReason,
    },

    /// The actor lacks a permission the command or parameter requires.
    #[error("you do not have permission to do this")]
    NoPermission {
        /// The permission that was checked.
        permission: String,
    },

    /// The actor ran a command again before its cooldown elapsed.
    #[error("you must wait {} more second(s) before using this command again", whole_seconds(.remaining))]
    OnCooldown {
        /// Time left until the command may run again.
        remaining: Duration,
    },

    /// The command handler failed with an error not meant for the actor.
    #[error("an error occurred while executing this command")]
    CommandInvocationFailed {
        /// The handler's original error.
        #[source]
        cause: Arc<dyn StdError + Send + Sync>,
    },

    /// A direct message to show the actor instead of running the command.
    #[error("{0}")]
    SendableMessage(String),
}

impl CommandError {
    /// Shorthand for [`CommandError::InvalidValue`].
    pub fn invalid_value(
        parameter: impl Into<String>,
        input: impl Into<String>,
        reason: InvalidReason,
    ) -> Self {
        Self::InvalidValue {
            parameter: parameter.into(),
            input: input.into(),
            reason,
        }
    }

    /// Shorthand for [`CommandError::SendableMessage`].
    pub fn message(text: impl Into<String>) -> Self {
        Self::SendableMessage(text.into())
    }

    /// Stable diagnostic code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnclosedQuote => codes::UNCLOSED_QUOTE,
            Self::InvalidEscapeCharacter(_) => codes::INVALID_ESCAPE,
            Self::ExpectedWhitespace => codes::EXPECTED_WHITESPACE,
            Self::InvalidInteger { .. } => codes::INVALID_INTEGER,
            Self::InvalidDecimal { .. } => codes::INVALID_DECIMAL,
            Self::InvalidBoolean { .. } => codes::INVALID_BOOLEAN,
            Self::MissingArgument { .. } => codes::MISSING_ARGUMENT,
            Self::TooManyArguments { .. } => codes::TOO_MANY_ARGUMENTS,
            Self::UnknownCommand { .. } => codes::UNKNOWN_COMMAND,
            Self::UnknownParameter { .. } => codes::UNKNOWN_PARAMETER,
            Self::InvalidValue { .. } => codes::INVALID_VALUE,
            Self::NoPermission { .. } => codes::NO_PERMISSION,
            Self::OnCooldown { .. } => codes::ON_COOLDOWN,
            Self::CommandInvocationFailed { .. } => codes::COMMAND_INVOCATION_FAILED,
            Self::SendableMessage(_) => codes::SENDABLE_MESSAGE,
        }
    }
}

/// Seconds left on a cooldown, rounded up and never below one.
fn whole_seconds(remaining: &Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

/// The specific constraint behind an [`CommandError::InvalidValue`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InvalidReason {
    /// Input is not one of the allowed constants.
    NotAChoice {
        /// The allowed constants.
        choices: Vec<String>,
    },
    /// Numeric value outside `[min, max]`.
    OutOfRange {
        /// Inclusive lower bound, if any.
        min: Option<f64>,
        /// Inclusive upper bound, if any.
        max: Option<f64>,
    },
    /// String length (in characters) outside `[min, max]`.
    Length {
        /// Inclusive minimum.
        min: usize,
        /// Inclusive maximum, if any.
        max: Option<usize>,
        /// The actual length.
        actual: usize,
    },
    /// List element count outside `[min, max]`.
    ListSize {
        /// Inclusive minimum.
        min: usize,
        /// Inclusive maximum, if any.
        max: Option<usize>,
        /// The actual count.
        actual: usize,
    },
    /// Free-form reason from a custom resolver or validator.
    Custom(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAChoice { choices } => write!(f, "expected one of: {}", choices.join(", ")),
            Self::OutOfRange { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "must be between {lo} and {hi}"),
                (Some(lo), None) => write!(f, "must be at least {lo}"),
                (None, Some(hi)) => write!(f, "must be at most {hi}"),
                (None, None) => write!(f, "out of range"),
            },
            Self::Length { min, max, actual } => {
                write!(f, "length {actual} ")?;
                write_bounds(f, *min, *max, "character")
            }
            Self::ListSize { min, max, actual } => {
                write!(f, "size {actual} ")?;
                write_bounds(f, *min, *max, "element")
            }
            Self::Custom(reason) => f.write_str(reason),
        }
    }
}

fn write_bounds(
    f: &mut fmt::Formatter<'_>,
    min: usize,
    max: Option<usize>,
    unit: &str,
) -> fmt::Result {
    match max {
        Some(max) => write!(f, "(expected {min} to {max} {unit}s)"),
        None => write!(f, "(expected at least {min} {unit}s)"),
    }
}

// ── HandlerError ─────────────────────────────────────────────────────────

/// What a command handler may return on failure.
///
/// [`HandlerError::Command`] is surfaced to the exception handler as-is;
/// anything else is wrapped in [`CommandError::CommandInvocationFailed`].
#[derive(Debug)]
pub enum HandlerError {
    /// An error meant for the actor (e.g. a [`CommandError::SendableMessage`]).
    Command(CommandError),
    /// An internal failure; the actor sees a generic message.
    Failed(Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    /// Wrap an internal failure.
    pub fn failed(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Failed(error.into())
    }

    /// A message shown directly to the actor.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Command(CommandError::message(text))
    }
}

impl From<CommandError> for HandlerError {
    fn from(error: CommandError) -> Self {
        Self::Command(error)
    }
}

// ── ErrorContext ─────────────────────────────────────────────────────────

/// Where in the pipeline a failure happened.
///
/// Spans are byte ranges into the original input.
pub enum ErrorContext<A: Actor> {
    /// The first word matched no command. No execution context exists.
    UnknownCommand {
        /// The full input.
        input: Arc<str>,
        /// The unmatched word.
        span: Span,
    },
    /// A token could not be matched against the subcommands of a literal node.
    ParsingLiteral {
        /// Execution state when the failure happened.
        context: ExecutionContext<A>,
        /// The subcommands that were available.
        expected: Vec<String>,
        /// The offending token.
        span: Span,
    },
    /// A parameter failed to resolve or validate.
    ParsingParameter {
        /// Execution state when the failure happened.
        context: ExecutionContext<A>,
        /// Name of the parameter.
        parameter: String,
        /// The offending token.
        span: Span,
    },
    /// A flag token named no flag of the matched command.
    UnknownParameter {
        /// Execution state when the failure happened.
        context: ExecutionContext<A>,
        /// The unknown flag token.
        span: Span,
    },
    /// Failure after all arguments resolved: permission, condition, or the handler itself.
    ExecutingFunction {
        /// Execution state when the failure happened.
        context: ExecutionContext<A>,
    },
}

impl<A: Actor> ErrorContext<A> {
    /// The execution context, if a command path was entered.
    pub fn execution_context(&self) -> Option<&ExecutionContext<A>> {
        match self {
            Self::UnknownCommand { .. } => None,
            Self::ParsingLiteral { context, .. }
            | Self::ParsingParameter { context, .. }
            | Self::UnknownParameter { context, .. }
            | Self::ExecutingFunction { context } => Some(context),
        }
    }

    /// The offending span, if the failure points at specific input.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnknownCommand { span, .. }
            | Self::ParsingLiteral { span, .. }
            | Self::ParsingParameter { span, .. }
            | Self::UnknownParameter { span, .. } => Some(*span),
            Self::ExecutingFunction { .. } => None,
        }
    }

    /// The full input text.
    pub fn input(&self) -> &str {
        match self {
            Self::UnknownCommand { input, .. } => input,
            other => other
                .execution_context()
                .map_or("", |c| c.input()),
        }
    }

    /// Variant name, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCommand { .. } => "unknown_command",
            Self::ParsingLiteral { .. } => "parsing_literal",
            Self::ParsingParameter { .. } => "parsing_parameter",
            Self::UnknownParameter { .. } => "unknown_parameter",
            Self::ExecutingFunction { .. } => "executing_function",
        }
    }
}

impl<A: Actor> Clone for ErrorContext<A> {
    fn clone(&self) -> Self {
        match self {
            Self::UnknownCommand { input, span } => Self::UnknownCommand {
                input: Arc::clone(input),
                span: *span,
            },
            Self::ParsingLiteral {
                context,
                expected,
                span,
            } => Self::ParsingLiteral {
                context: context.clone(),
                expected: expected.clone(),
                span: *span,
            },
            Self::ParsingParameter {
                context,
                parameter,
                span,
            } => Self::ParsingParameter {
                context: context.clone(),
                parameter: parameter.clone(),
                span: *span,
            },
            Self::UnknownParameter { context, span } => Self::UnknownParameter {
                context: context.clone(),
                span: *span,
            },
            Self::ExecutingFunction { context } => Self::ExecutingFunction {
                context: context.clone(),
            },
        }
    }
}

impl<A: Actor> fmt::Debug for ErrorContext<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.kind());
        if let Some(span) = self.span() {
            s.field("span", &span);
        }
        if let Self::ParsingParameter { parameter, .. } = self {
            s.field("parameter", parameter);
        }
        if let Some(ctx) = self.execution_context() {
            s.field("path", &ctx.literal_path());
        }
        s.finish()
    }
}

// ── Failure ──────────────────────────────────────────────────────────────

/// A failed dispatch: the error plus where it happened.
pub struct Failure<A: Actor> {
    /// What went wrong.
    pub error: CommandError,
    /// Where it went wrong.
    pub context: ErrorContext<A>,
}

impl<A: Actor> Failure<A> {
    /// Offending span in the original input, if any.
    pub fn span(&self) -> Option<Span> {
        self.context.span()
    }

    /// Convert to a [`Diagnostic`] with a stable code, span, and context map.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut map: BTreeMap<String, String> = ctx! {
            "context" => self.context.kind(),
            "input" => self.context.input(),
        };
        if let Some(ctx) = self.context.execution_context() {
            map.insert("command".into(), ctx.literal_path().join(" "));
        }
        match &self.context {
            ErrorContext::ParsingParameter { parameter, .. } => {
                map.insert("parameter".into(), parameter.clone());
            }
            ErrorContext::ParsingLiteral { expected, .. } => {
                map.insert("expected".into(), expected.join("|"));
            }
            _ => {}
        }
        match &self.error {
            CommandError::InvalidValue { input, .. }
            | CommandError::InvalidInteger { input }
            | CommandError::InvalidDecimal { input }
            | CommandError::InvalidBoolean { input }
            | CommandError::UnknownParameter { input }
            | CommandError::UnknownCommand { input } => {
                map.insert("token".into(), input.clone());
            }
            CommandError::NoPermission { permission } => {
                map.insert("permission".into(), permission.clone());
            }
            CommandError::OnCooldown { remaining } => {
                map.insert("remaining_ms".into(), remaining.as_millis().to_string());
            }
            CommandError::CommandInvocationFailed { cause } => {
                map.insert("cause".into(), cause.to_string());
            }
            _ => {}
        }
        Diagnostic::for_code(self.error.code(), self.error.to_string(), self.span()).with_context(map)
    }
}

impl<A: Actor> Clone for Failure<A> {
    fn clone(&self) -> Self {
        Self {
            error: self.error.clone(),
            context: self.context.clone(),
        }
    }
}

impl<A: Actor> fmt::Debug for Failure<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.error)
            .field("context", &self.context)
            .finish()
    }
}

impl<A: Actor> fmt::Display for Failure<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<A: Actor> StdError for Failure<A> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

// ── RegistrationError ────────────────────────────────────────────────────

/// A command definition that cannot be added to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistrationError {
    /// The path string is malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The command has no handler.
    #[error("command '{path}' has no handler")]
    MissingHandler {
        /// The command path.
        path: String,
    },

    /// Two parameters share a name.
    #[error("command '{path}' declares parameter '{name}' twice")]
    DuplicateParameter {
        /// The command path.
        path: String,
        /// The duplicated name.
        name: String,
    },

    /// Parameter ordering rules were broken.
    #[error("command '{path}': {reason}")]
    InvalidOrder {
        /// The command path.
        path: String,
        /// Which rule was broken.
        reason: String,
    },

    /// Two flags share a long name or shorthand.
    #[error("command '{path}' declares flag '{flag}' twice")]
    DuplicateFlag {
        /// The command path.
        path: String,
        /// The duplicated name or shorthand.
        flag: String,
    },

    /// No resolver could be found for a parameter.
    #[error("command '{path}': no resolver for parameter '{name}' of type {type_name}")]
    NoResolver {
        /// The command path.
        path: String,
        /// The parameter name.
        name: String,
        /// The declared type.
        type_name: String,
    },

    /// A resolver of the wrong kind was supplied for a parameter.
    #[error("command '{path}': parameter '{name}' needs a {expected} resolver")]
    WrongResolverKind {
        /// The command path.
        path: String,
        /// The parameter name.
        name: String,
        /// `"value"` or `"context"`.
        expected: &'static str,
    },

    /// Another command is already registered at the same path.
    #[error("a command is already registered at '{path}'")]
    DuplicateCommand {
        /// The command path.
        path: String,
    },

    /// Sibling parameters of the same type could not be told apart.
    #[error("'{path}': parameter '{new}' is ambiguous with existing parameter '{existing}'")]
    AmbiguousParameters {
        /// The shared prefix.
        path: String,
        /// The already registered parameter.
        existing: String,
        /// The parameter being registered.
        new: String,
    },

    /// A shared parameter node was redeclared with different attributes.
    #[error("'{path}': parameter '{name}' conflicts with an existing declaration")]
    ConflictingParameter {
        /// The shared prefix.
        path: String,
        /// The parameter name.
        name: String,
    },

    /// A category with a default handler mixes subcommands and parameters.
    #[error("'{path}' has a default handler and both subcommands and parameters")]
    CategoryConflict {
        /// The category path.
        path: String,
    },

    /// The path starts with more literals than allowed.
    #[error("'{path}' starts with more than {max} literals")]
    TooManyLeadingLiterals {
        /// The offending path.
        path: String,
        /// The configured limit.
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CommandError::UnclosedQuote.code(), "CMD1001");
        assert_eq!(
            CommandError::InvalidInteger { input: "x".into() }.code(),
            "CMD1101"
        );
        assert_eq!(CommandError::message("hi").code(), "CMD1701");
    }

    #[test]
    fn cooldown_rounds_up_to_whole_seconds() {
        let wait = |ms| CommandError::OnCooldown {
            remaining: Duration::from_millis(ms),
        };
        assert_eq!(wait(0).code(), "CMD1502");
        assert!(wait(250).to_string().contains("wait 1 more second"));
        assert!(wait(2_001).to_string().contains("wait 3 more second"));
        assert!(wait(4_000).to_string().contains("wait 4 more second"));
    }

    #[test]
    fn invalid_value_message() {
        let err = CommandError::invalid_value(
            "amount",
            "500",
            InvalidReason::OutOfRange {
                min: Some(1.0),
                max: Some(64.0),
            },
        );
        assert_eq!(err.to_string(), "invalid amount '500': must be between 1 and 64");
    }

    #[test]
    fn reason_messages() {
        let r = InvalidReason::NotAChoice {
            choices: vec!["red".into(), "green".into()],
        };
        assert_eq!(r.to_string(), "expected one of: red, green");
        let r = InvalidReason::Length {
            min: 3,
            max: Some(16),
            actual: 2,
        };
        assert_eq!(r.to_string(), "length 2 (expected 3 to 16 characters)");
        let r = InvalidReason::ListSize {
            min: 1,
            max: None,
            actual: 0,
        };
        assert_eq!(r.to_string(), "size 0 (expected at least 1 elements)");
    }

    #[test]
    fn handler_error_conversions() {
        let e: HandlerError = CommandError::ExpectedWhitespace.into();
        assert!(matches!(e, HandlerError::Command(CommandError::ExpectedWhitespace)));
        let e = HandlerError::failed("disk on fire");
        match e {
            HandlerError::Failed(cause) => assert_eq!(cause.to_string(), "disk on fire"),
            HandlerError::Command(_) => panic!("expected Failed"),
        }
    }

    #[test]
    fn invocation_failure_keeps_cause() {
        let cause: Arc<dyn StdError + Send + Sync> = Arc::from(Box::<dyn StdError + Send + Sync>::from("boom"));
        let err = CommandError::CommandInvocationFailed { cause };
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("boom")
        );
    }
}
