//! cmdtree core library.
//!
//! A command parsing and dispatch engine. Commands are declared with
//! [`CommandSpec`], merged into a [`CommandTree`] by shared prefix, and run
//! with [`CommandEngine::dispatch`]. [`CommandEngine::suggest`] completes
//! partial input against the same tree.

#![warn(missing_docs)]

/// The entity that runs commands.
pub mod actor;
/// Command declarations and their compiled form.
pub mod command;
/// Per-dispatch state.
pub mod context;
mod dispatch;
/// Configuration, registration, and the public entry points.
pub mod engine;
/// Error taxonomy, error contexts, and registration errors.
pub mod error;
/// Reporting failures to the actor.
pub mod exception;
/// The merged command tree.
pub mod node;
/// Parameter declarations.
pub mod param;
/// Permission checks and conditions.
pub mod permission;
/// Value and context resolvers, factories, and validators.
pub mod resolve;
/// Handling of handler return values.
pub mod response;
/// Input cursors.
pub mod stream;
/// Suggestion providers and completion.
pub mod suggest;
/// Runtime-typed values and declared types.
pub mod value;

// ── Convenience re-exports ──────────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Engine
pub use engine::{CommandEngine, EngineBuilder};

// Declarations
pub use command::{CommandInfo, CommandSpec, HandlerResult, Invocation};
pub use param::{ParamKind, ParamSpec};
pub use value::{CommandEnum, Either, ParamType, Value};

// Runtime
pub use actor::{Actor, ActorName};
pub use context::{Arguments, ExecutionContext};
pub use node::CommandTree;
pub use stream::{MutableStringStream, StringStream};

// Errors
pub use error::{CommandError, ErrorContext, Failure, HandlerError, InvalidReason, RegistrationError};
pub use exception::{DefaultExceptionHandler, ExceptionHandler};

// Extension points
pub use permission::{CommandCondition, CooldownCondition, PermissionReader};
pub use resolve::{ContextResolver, Resolver, ResolverFactory, Validator, ValueResolver};
pub use response::{ResponseHandler, ResponseHandlerFactory};
pub use suggest::{StaticSuggestions, SuggestionProvider, UnionSuggestions};

// Diagnostics and settings (re-exported from their crates)
pub use cmdtree_diagnostics::{Diagnostic, Severity, Span, codes};
pub use cmdtree_settings::{Settings, TrailingInput};
