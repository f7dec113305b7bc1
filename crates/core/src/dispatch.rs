//! Dispatch: tree descent, flag extraction, and invocation.
//!
//! One dispatch runs in four passes:
//!
//! 1. match the root literal (failure here is `UnknownCommand`);
//! 2. pull flag tokens out of the rest of the input, leaving a stripped
//!    text whose offsets map back to the original;
//! 3. descend the tree over the stripped text, committing on literal
//!    matches and backtracking across sibling parameters;
//! 4. at the leaf, resolve flags, check permissions and conditions, build
//!    the handler arguments, and invoke.

use std::sync::Arc;

use cmdtree_diagnostics::Span;
use cmdtree_settings::{Settings, TrailingInput};
use tracing::trace;

use crate::actor::Actor;
use crate::command::{ExecutableCommand, Invocation, Slot};
use crate::context::ExecutionContext;
use crate::error::{CommandError, ErrorContext, Failure, HandlerError};
use crate::node::{CommandTree, ParameterNode, TreeNode};
use crate::permission::{CommandCondition, PermissionReader};
use crate::response::ResponseHandlerFactory;
use crate::stream::MutableStringStream;
use crate::value::{ParamType, Value};

// ── Flag tokens ──────────────────────────────────────────────────────────

/// A word that names flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FlagToken<'t> {
    /// `--name`
    Long(&'t str),
    /// `-abc`: one or more shorthands.
    Short(&'t str),
}

/// Classify `text` as a flag token. The character after the prefix must be
/// a letter, so `-5` and `--` stay ordinary input.
pub(crate) fn flag_token<'t>(text: &'t str, settings: &Settings) -> Option<FlagToken<'t>> {
    if let Some(name) = text.strip_prefix(settings.long_flag_prefix.as_str()) {
        return name
            .starts_with(char::is_alphabetic)
            .then_some(FlagToken::Long(name));
    }
    let cluster = text.strip_prefix(settings.short_flag_prefix.as_str())?;
    cluster
        .starts_with(char::is_alphabetic)
        .then_some(FlagToken::Short(cluster))
}

/// Byte ranges of the words of `source` from `from` on. Quoted strings are
/// one word, quotes included.
fn words(source: &str, from: usize) -> Vec<(usize, usize)> {
    let mut stream = MutableStringStream::new(source);
    stream.set_position(from);
    let mut out = Vec::new();
    stream.skip_whitespace();
    while stream.has_remaining() {
        let start = stream.position();
        if stream.peek() == Some('"') {
            if stream.read_string().is_err() {
                stream.skip_to_end();
            }
        } else {
            stream.read_unquoted_string();
        }
        out.push((start, stream.position()));
        stream.skip_whitespace();
    }
    out
}

/// A flag found in the input.
struct FlagHit {
    long: String,
    token: String,
    span: Span,
    value: Option<(String, Span)>,
}

/// Maps offsets in the flag-stripped text back to the original input.
struct OffsetMap {
    /// `(stripped_start, original_start)` of each kept piece.
    pieces: Vec<(usize, usize)>,
}

impl OffsetMap {
    fn identity() -> Self {
        Self {
            pieces: vec![(0, 0)],
        }
    }

    fn to_original(&self, pos: usize) -> usize {
        let (stripped, original) = self
            .pieces
            .iter()
            .rev()
            .find(|(s, _)| *s <= pos)
            .copied()
            .unwrap_or((0, 0));
        original + (pos - stripped)
    }

    fn span(&self, start: usize, end: usize) -> Span {
        let start = self.to_original(start);
        let end = self.to_original(end).max(start);
        Span::new(start, end)
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────────

/// Best failure seen while backtracking, and how far it got.
struct Trip<A: Actor> {
    failure: Failure<A>,
    at: usize,
}

impl<A: Actor> Trip<A> {
    fn keep_furthest(best: &mut Option<Self>, trip: Self) {
        if best.as_ref().is_none_or(|b| trip.at > b.at) {
            *best = Some(trip);
        }
    }
}

/// Borrowed engine state for a single dispatch.
pub(crate) struct Dispatcher<'a, A: Actor> {
    pub(crate) tree: &'a CommandTree<A>,
    pub(crate) settings: &'a Settings,
    pub(crate) permissions: &'a dyn PermissionReader<A>,
    pub(crate) conditions: &'a [Arc<dyn CommandCondition<A>>],
    pub(crate) response_factories: &'a [Arc<dyn ResponseHandlerFactory<A>>],
}

impl<A: Actor> Dispatcher<'_, A> {
    pub(crate) fn dispatch(
        &self,
        actor: Arc<A>,
        input: &str,
    ) -> Result<ExecutionContext<A>, Failure<A>> {
        let source: Arc<str> = Arc::from(input);
        let mut stream = MutableStringStream::new(Arc::clone(&source));
        stream.skip_whitespace();

        let start = stream.position();
        let word = stream.read_unquoted_string();
        let Some((name, node)) = self
            .tree
            .root()
            .literal(&word, self.settings.case_sensitive_literals)
        else {
            return Err(Failure {
                error: CommandError::UnknownCommand { input: word },
                context: ErrorContext::UnknownCommand {
                    input: source,
                    span: Span::new(start, stream.position()),
                },
            });
        };

        let mut ctx = ExecutionContext::new(actor, Arc::clone(&source));
        ctx.push_literal(name);

        // Flags are only removed after the root word, so its end offset is
        // the same in the stripped text.
        let after_root = stream.position();
        let (hits, stripped, map) = self.extract_flags(node, &source, after_root, &ctx)?;
        let mut stream = MutableStringStream::new(stripped);
        stream.set_position(after_root);

        let command = self
            .descend(node, &mut stream, &mut ctx, &map)
            .map_err(|trip| trip.failure)?;
        self.execute(&command, &hits, ctx, &map, stream.position())
    }

    // ── Flags ────────────────────────────────────────────────────────────

    /// Remove every flag token (and value) after `from`, returning the hits,
    /// the stripped text, and the offset map back to `source`.
    fn extract_flags(
        &self,
        node: &TreeNode<A>,
        source: &str,
        from: usize,
        ctx: &ExecutionContext<A>,
    ) -> Result<(Vec<FlagHit>, String, OffsetMap), Failure<A>> {
        let flags: Vec<Arc<ParameterNode<A>>> = node
            .commands()
            .iter()
            .flat_map(|c| c.flags().iter().map(Arc::clone))
            .collect();
        if flags.is_empty() {
            return Ok((Vec::new(), source.to_string(), OffsetMap::identity()));
        }
        let by_long = |name: &str| {
            flags
                .iter()
                .find(|f| f.flag_names().is_some_and(|(long, _)| long == name))
        };
        let by_short = |c: char| {
            flags
                .iter()
                .find(|f| f.flag_names().is_some_and(|(_, short)| short == Some(c)))
        };
        let unknown = |token: &str, s: usize, e: usize| Failure {
            error: CommandError::UnknownParameter {
                input: token.to_string(),
            },
            context: ErrorContext::UnknownParameter {
                context: ctx.clone(),
                span: Span::new(s, e),
            },
        };

        let words = words(source, from);
        let mut hits = Vec::new();
        let mut removed = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let (s, e) = words[i];
            let token = &source[s..e];
            let Some(flag) = flag_token(token, self.settings) else {
                i += 1;
                continue;
            };
            let named: Vec<&Arc<ParameterNode<A>>> = match flag {
                FlagToken::Long(name) => {
                    vec![by_long(name).ok_or_else(|| unknown(token, s, e))?]
                }
                FlagToken::Short(cluster) => cluster
                    .chars()
                    .map(|c| by_short(c).ok_or_else(|| unknown(token, s, e)))
                    .collect::<Result<_, _>>()?,
            };

            let mut end = e;
            let last = named.len() - 1;
            for (k, param) in named.iter().enumerate() {
                let Some((long, _)) = param.flag_names() else {
                    continue;
                };
                let value = if param.is_switch() {
                    None
                } else {
                    let next = words.get(i + 1).filter(|_| k == last);
                    let Some(&(vs, ve)) = next else {
                        return Err(Failure {
                            error: CommandError::MissingArgument {
                                expected: format!("<{}>", param.name()),
                            },
                            context: ErrorContext::ParsingParameter {
                                context: ctx.clone(),
                                parameter: param.name().to_string(),
                                span: Span::new(s, e),
                            },
                        });
                    };
                    end = ve;
                    Some((source[vs..ve].to_string(), Span::new(vs, ve)))
                };
                hits.push(FlagHit {
                    long: long.to_string(),
                    token: token.to_string(),
                    span: Span::new(s, e),
                    value,
                });
            }
            removed.push((s, end));
            i += if end == e { 1 } else { 2 };
        }

        let mut text = String::with_capacity(source.len());
        let mut pieces = Vec::with_capacity(removed.len() + 1);
        let mut cursor = 0;
        for (s, e) in removed {
            pieces.push((text.len(), cursor));
            text.push_str(&source[cursor..s]);
            cursor = e;
        }
        pieces.push((text.len(), cursor));
        text.push_str(&source[cursor..]);
        trace!(flags = hits.len(), stripped = %text, "extracted flags");
        Ok((hits, text, OffsetMap { pieces }))
    }

    // ── Descent ──────────────────────────────────────────────────────────

    fn descend(
        &self,
        node: &TreeNode<A>,
        stream: &mut MutableStringStream,
        ctx: &mut ExecutionContext<A>,
        map: &OffsetMap,
    ) -> Result<Arc<ExecutableCommand<A>>, Trip<A>> {
        stream.skip_whitespace();
        let start = stream.position();

        if !stream.has_remaining() {
            if let Some(command) = node.command() {
                return Ok(Arc::clone(command));
            }
            if let Some(branch) = node.parameters().iter().find(|b| b.node.is_optional()) {
                self.fill_optional(&branch.node, ctx, map, start)?;
                return self.descend(&branch.next, stream, ctx, map);
            }
            let span = map.span(start, start);
            let failure = match node.parameters().first() {
                Some(branch) => Failure {
                    error: CommandError::MissingArgument {
                        expected: format!("<{}>", branch.node.name()),
                    },
                    context: ErrorContext::ParsingParameter {
                        context: ctx.clone(),
                        parameter: branch.node.name().to_string(),
                        span,
                    },
                },
                None => {
                    let expected = literal_names(node);
                    Failure {
                        error: CommandError::MissingArgument {
                            expected: expected.join("|"),
                        },
                        context: ErrorContext::ParsingLiteral {
                            context: ctx.clone(),
                            expected,
                            span,
                        },
                    }
                }
            };
            return Err(Trip { failure, at: start });
        }

        let word = stream.peek_unquoted_string().to_string();
        let word_end = start + word.len();
        if let Some((name, child)) = node.literal(&word, self.settings.case_sensitive_literals) {
            stream.set_position(word_end);
            ctx.push_literal(name);
            return self.descend(child, stream, ctx, map);
        }

        let mut best: Option<Trip<A>> = None;
        let (literals, arguments) = (ctx.literal_path().len(), ctx.arguments().len());
        for branch in node.parameters() {
            let attempt = self
                .resolve_positional(&branch.node, stream, ctx, map)
                .and_then(|()| self.descend(&branch.next, stream, ctx, map));
            match attempt {
                Ok(command) => return Ok(command),
                Err(trip) => Trip::keep_furthest(&mut best, trip),
            }
            ctx.rewind(literals, arguments);
            stream.set_position(start);
        }
        if let Some(trip) = best {
            return Err(trip);
        }

        if let Some(command) = node.command() {
            return match self.settings.trailing_input {
                TrailingInput::Ignore => {
                    stream.skip_to_end();
                    Ok(Arc::clone(command))
                }
                TrailingInput::Reject => {
                    let extra = stream.peek_remaining().to_string();
                    let end = start + extra.len();
                    Err(Trip {
                        failure: Failure {
                            error: CommandError::TooManyArguments {
                                usage: command.usage().to_string(),
                                extra,
                            },
                            context: ErrorContext::ParsingLiteral {
                                context: ctx.clone(),
                                expected: literal_names(node),
                                span: map.span(start, end),
                            },
                        },
                        at: start,
                    })
                }
            };
        }

        Err(Trip {
            failure: Failure {
                error: CommandError::UnknownParameter { input: word },
                context: ErrorContext::ParsingLiteral {
                    context: ctx.clone(),
                    expected: literal_names(node),
                    span: map.span(start, word_end),
                },
            },
            at: start,
        })
    }

    /// Resolve one positional parameter at the cursor, then check the
    /// separator, validators, and parameter permission.
    fn resolve_positional(
        &self,
        param: &ParameterNode<A>,
        stream: &mut MutableStringStream,
        ctx: &mut ExecutionContext<A>,
        map: &OffsetMap,
    ) -> Result<(), Trip<A>> {
        let start = stream.position();
        let token_end = start + stream.peek_unquoted_string().len();
        let trip = |error: CommandError, ctx: &ExecutionContext<A>, end: usize| Trip {
            failure: Failure {
                error,
                context: ErrorContext::ParsingParameter {
                    context: ctx.clone(),
                    parameter: param.name().to_string(),
                    span: map.span(start, end.max(start)),
                },
            },
            at: start,
        };

        if let Some(permission) = param.attrs().permission.as_deref()
            && !self.permissions.has_permission(ctx.actor(), permission)
        {
            let error = CommandError::NoPermission {
                permission: permission.to_string(),
            };
            return Err(trip(error, ctx, token_end));
        }
        let Some(resolver) = param.value_resolver() else {
            return Err(trip(
                CommandError::MissingArgument {
                    expected: format!("<{}>", param.name()),
                },
                ctx,
                token_end,
            ));
        };

        let value = match resolver.resolve(stream, ctx) {
            Ok(value) => value,
            Err(error) => {
                let end = stream.position().max(token_end);
                return Err(trip(error, ctx, end));
            }
        };
        let end = stream.position();
        if stream.has_remaining() && !stream.peek().is_some_and(char::is_whitespace) {
            return Err(trip(CommandError::ExpectedWhitespace, ctx, end));
        }
        let text = &stream.source()[start..end];
        for validator in param.validators() {
            if let Err(error) = validator.validate(&value, text, param, ctx) {
                return Err(trip(error, ctx, end));
            }
        }
        ctx.arguments_mut().insert(param.name(), value);
        Ok(())
    }

    /// Value for an omitted optional parameter: its default text, an empty
    /// read for resolvers that accept one, or nothing.
    fn fill_optional(
        &self,
        param: &ParameterNode<A>,
        ctx: &mut ExecutionContext<A>,
        map: &OffsetMap,
        at: usize,
    ) -> Result<(), Trip<A>> {
        let value = self.default_value(param, ctx).map_err(|error| Trip {
            failure: Failure {
                error,
                context: ErrorContext::ParsingParameter {
                    context: ctx.clone(),
                    parameter: param.name().to_string(),
                    span: map.span(at, at),
                },
            },
            at,
        })?;
        if let Some(value) = value {
            ctx.arguments_mut().insert(param.name(), value);
        }
        Ok(())
    }

    fn default_value(
        &self,
        param: &ParameterNode<A>,
        ctx: &ExecutionContext<A>,
    ) -> Result<Option<Value>, CommandError> {
        let Some(resolver) = param.value_resolver() else {
            return Ok(None);
        };
        let text = match param.attrs().default.as_deref() {
            Some(text) => text,
            None if resolver.resolves_empty() => "",
            None => return Ok(None),
        };
        let mut stream = MutableStringStream::new(text);
        let value = resolver.resolve(&mut stream, ctx)?;
        for validator in param.validators() {
            validator.validate(&value, text, param, ctx)?;
        }
        Ok(Some(value))
    }

    // ── Execution ────────────────────────────────────────────────────────

    fn execute(
        &self,
        command: &Arc<ExecutableCommand<A>>,
        hits: &[FlagHit],
        mut ctx: ExecutionContext<A>,
        map: &OffsetMap,
        end: usize,
    ) -> Result<ExecutionContext<A>, Failure<A>> {
        ctx.set_command(Arc::clone(command));

        for hit in hits {
            if command.flag_by_name(&hit.long).is_none() {
                return Err(Failure {
                    error: CommandError::UnknownParameter {
                        input: hit.token.clone(),
                    },
                    context: ErrorContext::UnknownParameter {
                        context: ctx.clone(),
                        span: hit.span,
                    },
                });
            }
        }

        let tail = map.span(end, end);
        for flag in command.flags() {
            let Some((long, _)) = flag.flag_names() else {
                continue;
            };
            let hit = hits.iter().rev().find(|h| h.long == long);
            let span = hit.map_or(tail, |h| h.value.as_ref().map_or(h.span, |(_, s)| *s));
            let fail = |error: CommandError, ctx: &ExecutionContext<A>| Failure {
                error,
                context: ErrorContext::ParsingParameter {
                    context: ctx.clone(),
                    parameter: flag.name().to_string(),
                    span,
                },
            };

            if hit.is_some()
                && let Some(permission) = flag.attrs().permission.as_deref()
                && !self.permissions.has_permission(ctx.actor(), permission)
            {
                let error = CommandError::NoPermission {
                    permission: permission.to_string(),
                };
                return Err(fail(error, &ctx));
            }

            let value = match hit {
                Some(_) if flag.is_switch() => Some(Value::new(true)),
                None if flag.is_switch() => Some(Value::new(false)),
                Some(FlagHit {
                    value: Some((text, _)),
                    ..
                }) => Some(self.resolve_flag(flag, text, &ctx).map_err(|e| fail(e, &ctx))?),
                Some(_) => None,
                None if flag.is_optional() => {
                    self.default_value(flag, &ctx).map_err(|e| fail(e, &ctx))?
                }
                None => {
                    let error = CommandError::MissingArgument {
                        expected: format!("{}{long}", self.settings.long_flag_prefix),
                    };
                    return Err(fail(error, &ctx));
                }
            };
            if let Some(value) = value {
                ctx.arguments_mut().insert(flag.name(), value);
            }
        }

        let executing = |error: CommandError, ctx: &ExecutionContext<A>| Failure {
            error,
            context: ErrorContext::ExecutingFunction {
                context: ctx.clone(),
            },
        };

        if let Some(permission) = command.permission()
            && !self.permissions.has_permission(ctx.actor(), permission)
        {
            let error = CommandError::NoPermission {
                permission: permission.to_string(),
            };
            return Err(executing(error, &ctx));
        }
        for condition in self.conditions {
            condition.check(&ctx).map_err(|e| executing(e, &ctx))?;
        }

        let mut values = Vec::with_capacity(command.slots().len());
        for slot in command.slots() {
            match slot {
                Slot::Value(name) => {
                    values.push((name.clone(), ctx.arguments().value(name).cloned()));
                }
                Slot::Context(param) => {
                    let Some(resolver) = param.resolver().as_context() else {
                        values.push((param.name().to_string(), None));
                        continue;
                    };
                    let value = resolver.resolve(&ctx).map_err(|e| executing(e, &ctx))?;
                    ctx.arguments_mut().insert(param.name(), value.clone());
                    values.push((param.name().to_string(), Some(value)));
                }
            }
        }

        let result = (command.handler())(&Invocation::new(&ctx, &values));
        match result {
            Ok(Some(value)) => self.respond(command, value, &ctx),
            Ok(None) => {}
            Err(HandlerError::Command(error)) => return Err(executing(error, &ctx)),
            Err(HandlerError::Failed(cause)) => {
                let error = CommandError::CommandInvocationFailed {
                    cause: Arc::from(cause),
                };
                return Err(executing(error, &ctx));
            }
        }
        Ok(ctx)
    }

    fn resolve_flag(
        &self,
        flag: &ParameterNode<A>,
        text: &str,
        ctx: &ExecutionContext<A>,
    ) -> Result<Value, CommandError> {
        let Some(resolver) = flag.value_resolver() else {
            return Err(CommandError::MissingArgument {
                expected: format!("<{}>", flag.name()),
            });
        };
        let mut stream = MutableStringStream::new(text);
        let value = resolver.resolve(&mut stream, ctx)?;
        if stream.has_remaining() {
            return Err(CommandError::ExpectedWhitespace);
        }
        for validator in flag.validators() {
            validator.validate(&value, text, flag, ctx)?;
        }
        Ok(value)
    }

    /// Hand a return value to the command's response handler, or pick one
    /// by the value's runtime type.
    fn respond(&self, command: &ExecutableCommand<A>, value: Value, ctx: &ExecutionContext<A>) {
        if let Some(handler) = command.response() {
            handler.handle(value, ctx);
            return;
        }
        if command.returns().is_some() {
            trace!(command = command.path(), "declared return type has no response handler");
            return;
        }
        let ty = ParamType::of_value(&value);
        match self.response_factories.iter().find_map(|f| f.create(&ty)) {
            Some(handler) => handler.handle(value, ctx),
            None => trace!(command = command.path(), ty = %ty, "return value dropped"),
        }
    }
}

fn literal_names<A: Actor>(node: &TreeNode<A>) -> Vec<String> {
    node.literals().map(|(name, _)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_tokens_need_a_letter() {
        let settings = Settings::default();
        assert_eq!(flag_token("--silent", &settings), Some(FlagToken::Long("silent")));
        assert_eq!(flag_token("-sv", &settings), Some(FlagToken::Short("sv")));
        assert_eq!(flag_token("-5", &settings), None);
        assert_eq!(flag_token("--", &settings), None);
        assert_eq!(flag_token("--5", &settings), None);
        assert_eq!(flag_token("word", &settings), None);
    }

    #[test]
    fn words_keep_quotes_together() {
        let text = "say \"hello world\"  -s";
        let found: Vec<_> = words(text, 3).iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(found, ["\"hello world\"", "-s"]);
    }

    #[test]
    fn offset_map_skips_removed_ranges() {
        // "give --silent @s" with "--silent" removed: "give  @s"
        let map = OffsetMap {
            pieces: vec![(0, 0), (5, 13)],
        };
        assert_eq!(map.to_original(2), 2);
        assert_eq!(map.to_original(6), 14);
        assert_eq!(map.span(6, 8), Span::new(14, 16));
    }
}
