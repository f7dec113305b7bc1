//! Command definitions loaded from JSON.
//!
//! A definitions document lists commands declaratively. Each command replies
//! with a template (`{name}` placeholders are replaced by the rendered
//! argument, `{actor}` by the actor's name) or fails with a fixed message,
//! which is enough to exercise every part of the engine from the shell.

use std::time::Duration;

use cmdtree_core::{
    ActorName, CommandEngine, CommandSpec, Either, HandlerError, Invocation, ParamSpec,
    ParamType, RegistrationError, Value,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::actor::CliActor;

/// Definitions used when no `--commands` file is given.
pub(crate) const DEMO: &str = include_str!("demo.json");

/// Errors that can occur while loading command definitions.
#[derive(Debug, Error)]
pub(crate) enum DefinitionError {
    /// JSON deserialization failed.
    #[error("invalid definitions JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A parameter declaration is inconsistent.
    #[error("command '{path}', parameter '{param}': {reason}")]
    InvalidParam {
        path: String,
        param: String,
        reason: String,
    },

    /// The engine refused the command.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

// ── Document model ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    commands: Vec<CommandDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandDef {
    path: String,
    #[serde(default)]
    aliases: Vec<String>,
    description: Option<String>,
    permission: Option<String>,
    #[serde(default)]
    secret: bool,
    cooldown_secs: Option<u64>,
    #[serde(default)]
    params: Vec<ParamDef>,
    reply: Option<String>,
    fail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TypeName {
    #[default]
    String,
    Char,
    Bool,
    Int,
    Long,
    Float,
    Choice,
    /// Context parameter holding the actor's name.
    Actor,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum KindDef {
    #[default]
    Positional,
    Flag,
    Switch,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamDef {
    name: String,
    #[serde(rename = "type", default)]
    ty: TypeName,
    #[serde(default)]
    kind: KindDef,
    long: Option<String>,
    shorthand: Option<char>,
    #[serde(default)]
    optional: bool,
    default: Option<String>,
    #[serde(default)]
    greedy: bool,
    min: Option<f64>,
    max: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    list: bool,
    delimiter: Option<char>,
    min_size: Option<usize>,
    max_size: Option<usize>,
    permission: Option<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    description: Option<String>,
}

// ── Loading ─────────────────────────────────────────────────────────────

/// Parse `json` and register every command it declares, in order.
///
/// Returns the number of commands registered.
pub(crate) fn load_into(
    engine: &mut CommandEngine<CliActor>,
    json: &str,
) -> Result<usize, DefinitionError> {
    let doc: Document = serde_json::from_str(json)?;
    let count = doc.commands.len();
    for def in doc.commands {
        let spec = command_spec(def)?;
        engine.register(spec)?;
    }
    debug!(count, "loaded command definitions");
    Ok(count)
}

fn command_spec(def: CommandDef) -> Result<CommandSpec<CliActor>, DefinitionError> {
    let mut spec = CommandSpec::new(def.path.as_str());
    for alias in def.aliases {
        spec = spec.alias(alias);
    }
    for param in def.params {
        spec = spec.param(param_spec(&def.path, param)?);
    }
    if let Some(permission) = def.permission {
        spec = spec.permission(permission);
    }
    if let Some(description) = def.description {
        spec = spec.description(description);
    }
    if def.secret {
        spec = spec.secret();
    }
    if let Some(secs) = def.cooldown_secs {
        spec = spec.cooldown(Duration::from_secs(secs));
    }

    let reply = def.reply;
    let fail = def.fail;
    Ok(spec.handler(move |inv| {
        if let Some(message) = &fail {
            return Err(HandlerError::failed(message.clone()));
        }
        Ok(reply.as_deref().map(|t| Value::new(fill(t, inv))))
    }))
}

fn param_spec(path: &str, def: ParamDef) -> Result<ParamSpec<CliActor>, DefinitionError> {
    let invalid = |reason: &str| DefinitionError::InvalidParam {
        path: path.to_string(),
        param: def.name.clone(),
        reason: reason.to_string(),
    };

    if def.ty == TypeName::Choice && def.choices.is_empty() {
        return Err(invalid("choice parameters need at least one entry in 'choices'"));
    }
    if def.kind == KindDef::Switch && !matches!(def.ty, TypeName::Bool | TypeName::String) {
        return Err(invalid("switches are always boolean"));
    }

    let scalar = match def.ty {
        TypeName::String => ParamType::of::<String>(),
        TypeName::Char => ParamType::of::<char>(),
        TypeName::Bool => ParamType::of::<bool>(),
        TypeName::Int => ParamType::of::<i32>(),
        TypeName::Long => ParamType::of::<i64>(),
        TypeName::Float => ParamType::of::<f64>(),
        TypeName::Choice => ParamType::choice(def.name.clone(), def.choices.iter().cloned()),
        TypeName::Actor => {
            if def.kind != KindDef::Positional || def.list {
                return Err(invalid("actor parameters cannot be flags or lists"));
            }
            return Ok(ParamSpec::context::<ActorName>(def.name.as_str()));
        }
    };
    let ty = if def.list {
        ParamType::list_of(scalar)
    } else {
        scalar
    };

    let mut spec = match def.kind {
        KindDef::Positional => ParamSpec::of(def.name.as_str(), ty),
        KindDef::Flag => ParamSpec::of(def.name.as_str(), ty).flag(),
        KindDef::Switch => ParamSpec::switch(def.name.as_str()),
    };
    if let Some(long) = def.long {
        spec = spec.long(long);
    }
    if let Some(c) = def.shorthand {
        spec = spec.shorthand(c);
    }
    if def.optional {
        spec = spec.optional();
    }
    if let Some(text) = def.default {
        spec = spec.default_value(text);
    }
    if def.greedy {
        spec = spec.greedy();
    }
    match (def.min, def.max) {
        (Some(min), Some(max)) => spec = spec.range(min, max),
        (Some(min), None) => spec = spec.min(min),
        (None, Some(max)) => spec = spec.max(max),
        (None, None) => {}
    }
    if def.min_length.is_some() || def.max_length.is_some() {
        spec = spec.length(def.min_length.unwrap_or(0), def.max_length);
    }
    if def.min_size.is_some() || def.max_size.is_some() {
        spec = spec.size(def.min_size.unwrap_or(0), def.max_size);
    }
    if let Some(c) = def.delimiter {
        spec = spec.delimiter(c);
    }
    if let Some(permission) = def.permission {
        spec = spec.permission(permission);
    }
    if !def.suggestions.is_empty() {
        spec = spec.suggest_values(def.suggestions);
    }
    if let Some(text) = def.description {
        spec = spec.description(text);
    }
    Ok(spec)
}

// ── Reply templates ─────────────────────────────────────────────────────

/// Replace `{name}` with each rendered argument and `{actor}` with the
/// actor's name. Absent optionals render as the empty string.
fn fill(template: &str, inv: &Invocation<'_, CliActor>) -> String {
    let mut out = template.replace("{actor}", &inv.actor().name);
    for (name, value) in inv.args() {
        let rendered = value.map(render_value).unwrap_or_default();
        out = out.replace(&format!("{{{name}}}"), &rendered);
    }
    out
}

/// Display form of a value produced by the built-in resolvers.
pub(crate) fn render_value(value: &Value) -> String {
    if let Some(items) = value.as_list() {
        return items.iter().map(render_value).collect::<Vec<_>>().join(" ");
    }
    if let Some(either) = value.get::<Either>() {
        return render_value(either.value());
    }
    if let Some(s) = value.get::<String>() {
        return s.clone();
    }
    if let Some(ActorName(name)) = value.get::<ActorName>() {
        return name.clone();
    }
    if let Some(c) = value.get::<char>() {
        return c.to_string();
    }
    if let Some(b) = value.get::<bool>() {
        return b.to_string();
    }
    if let Some(n) = value.get::<i32>() {
        return n.to_string();
    }
    if let Some(n) = value.get::<i64>() {
        return n.to_string();
    }
    if let Some(n) = value.get::<f64>() {
        return n.to_string();
    }
    format!("{value:?}")
}
