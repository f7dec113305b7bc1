//! Suggestion providers and tab completion.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

use cmdtree_settings::Settings;
use tracing::trace;

use crate::actor::Actor;
use crate::command::ExecutableCommand;
use crate::context::ExecutionContext;
use crate::dispatch::{FlagToken, flag_token};
use crate::node::{CommandTree, ParameterNode, TreeNode};
use crate::param::ParamSpec;
use crate::permission::PermissionReader;
use crate::stream::MutableStringStream;

/// Produces completion candidates for one parameter.
pub trait SuggestionProvider<A: Actor>: Send + Sync {
    /// Candidates given what has been resolved so far.
    fn suggestions(&self, context: &ExecutionContext<A>) -> Vec<String>;
}

impl<A, F> SuggestionProvider<A> for F
where
    A: Actor,
    F: Fn(&ExecutionContext<A>) -> Vec<String> + Send + Sync,
{
    fn suggestions(&self, context: &ExecutionContext<A>) -> Vec<String> {
        self(context)
    }
}

/// A fixed list of candidates.
#[derive(Debug, Clone, Default)]
pub struct StaticSuggestions {
    values: Vec<String>,
}

impl StaticSuggestions {
    /// Suggest exactly `values`, in order.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl<A: Actor> SuggestionProvider<A> for StaticSuggestions {
    fn suggestions(&self, _: &ExecutionContext<A>) -> Vec<String> {
        self.values.clone()
    }
}

/// Concatenation of several providers, in order.
pub struct UnionSuggestions<A: Actor> {
    providers: Vec<Arc<dyn SuggestionProvider<A>>>,
}

impl<A: Actor> Default for UnionSuggestions<A> {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
        }
    }
}

impl<A: Actor> UnionSuggestions<A> {
    /// An empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `provider`.
    pub fn with(mut self, provider: impl SuggestionProvider<A> + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }
}

impl<A: Actor> FromIterator<Arc<dyn SuggestionProvider<A>>> for UnionSuggestions<A> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn SuggestionProvider<A>>>>(iter: I) -> Self {
        Self {
            providers: iter.into_iter().collect(),
        }
    }
}

impl<A: Actor> SuggestionProvider<A> for UnionSuggestions<A> {
    fn suggestions(&self, context: &ExecutionContext<A>) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|p| p.suggestions(context))
            .collect()
    }
}

/// Picks a provider for parameters that declare none.
pub trait SuggestionFactory<A: Actor>: Send + Sync {
    /// A provider for `param`, if this factory handles it.
    fn create(&self, param: &ParamSpec<A>) -> Option<Arc<dyn SuggestionProvider<A>>>;
}

impl<A, F> SuggestionFactory<A> for F
where
    A: Actor,
    F: Fn(&ParamSpec<A>) -> Option<Arc<dyn SuggestionProvider<A>>> + Send + Sync,
{
    fn create(&self, param: &ParamSpec<A>) -> Option<Arc<dyn SuggestionProvider<A>>> {
        self(param)
    }
}

/// Supplies one provider to every parameter of scalar type `T`.
pub struct TypeSuggestions<A: Actor> {
    id: TypeId,
    provider: Arc<dyn SuggestionProvider<A>>,
}

impl<A: Actor> TypeSuggestions<A> {
    /// Use `provider` for every `T` parameter.
    pub fn new<T: Any>(provider: impl SuggestionProvider<A> + 'static) -> Self {
        Self {
            id: TypeId::of::<T>(),
            provider: Arc::new(provider),
        }
    }
}

impl<A: Actor> SuggestionFactory<A> for TypeSuggestions<A> {
    fn create(&self, param: &ParamSpec<A>) -> Option<Arc<dyn SuggestionProvider<A>>> {
        (param.ty().id() == self.id).then(|| Arc::clone(&self.provider))
    }
}

// ── Completion ───────────────────────────────────────────────────────────

/// Split on whitespace, keeping quoted strings together. The final element is
/// the word being typed: empty when the input ends in whitespace.
fn tokenize(input: &str) -> (Vec<&str>, &str) {
    let mut stream = MutableStringStream::new(input);
    let mut tokens = Vec::new();
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
        tokens.push(&input[start..stream.position()]);
        stream.skip_whitespace();
    }
    if input.ends_with(char::is_whitespace) || tokens.is_empty() {
        return (tokens, "");
    }
    let partial = tokens.pop().unwrap_or_default();
    (tokens, partial)
}

/// Walks the tree along the complete words of an input and asks the
/// providers at the position of the word being typed.
pub(crate) struct Completer<'a, A: Actor> {
    pub(crate) tree: &'a CommandTree<A>,
    pub(crate) settings: &'a Settings,
    pub(crate) permissions: &'a dyn PermissionReader<A>,
}

enum Walk<'t, A: Actor> {
    /// Stopped at a node; the partial word is a child of it.
    At(&'t TreeNode<A>),
    /// The partial word is the value of this parameter.
    Value(Arc<ParameterNode<A>>),
    /// Nothing can follow.
    Dead,
}

impl<A: Actor> Completer<'_, A> {
    pub(crate) fn complete(&self, actor: Arc<A>, input: &str) -> Vec<String> {
        let (tokens, partial) = tokenize(input);
        let mut context = ExecutionContext::new(actor, input);
        let mut used_flags = HashSet::new();

        let candidates = match self.walk(&tokens, &mut context, &mut used_flags) {
            Walk::Dead => Vec::new(),
            Walk::Value(param) => param
                .suggestions()
                .map(|p| p.suggestions(&context))
                .unwrap_or_default(),
            Walk::At(node) => {
                let flags = if std::ptr::eq(node, self.tree.root()) || !self.is_flag_prefix(partial) {
                    Vec::new()
                } else {
                    self.flag_names(node, context.actor(), &used_flags)
                };
                if flags.is_empty() {
                    self.children(node, &context)
                } else {
                    flags
                }
            }
        };

        let mut seen = HashSet::new();
        let mut out: Vec<String> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
        if self.settings.max_suggestions > 0 {
            out.truncate(self.settings.max_suggestions);
        }
        trace!(input, partial, count = out.len(), "completed");
        out
    }

    fn walk<'t>(
        &'t self,
        tokens: &[&str],
        context: &mut ExecutionContext<A>,
        used_flags: &mut HashSet<String>,
    ) -> Walk<'t, A> {
        let case_sensitive = self.settings.case_sensitive_literals;
        let mut node = self.tree.root();
        let mut i = 0;
        while i < tokens.len() {
            let text = tokens[i];
            let is_root = std::ptr::eq(node, self.tree.root());

            if !is_root && let Some(flag) = flag_token(text, self.settings) {
                let last = self.mark_flags(node, context.actor(), &flag, used_flags);
                if let Some(param) = last.filter(|p| !p.is_switch()) {
                    if i + 1 == tokens.len() {
                        return Walk::Value(param);
                    }
                    i += 1;
                }
                i += 1;
                continue;
            }

            if let Some((name, child)) = node.literal(text, case_sensitive) {
                if !self.literal_visible(child, context.actor()) {
                    return Walk::Dead;
                }
                context.push_literal(name);
                node = child;
                i += 1;
                continue;
            }

            let allowed: Vec<_> = node
                .parameters()
                .iter()
                .filter(|b| self.param_allowed(&b.node, context.actor()))
                .collect();
            let matched = allowed
                .iter()
                .find(|b| b.node.consumes_rest() || self.accepts(&b.node, text, context))
                .or_else(|| allowed.first());
            let Some(branch) = matched else {
                return Walk::Dead;
            };
            if branch.node.consumes_rest() {
                return Walk::Value(Arc::clone(&branch.node));
            }
            node = &branch.next;
            i += 1;
        }
        Walk::At(node)
    }

    /// Whether `param` resolves `text` completely. Successful values are
    /// recorded so later providers can see them.
    fn accepts(&self, param: &ParameterNode<A>, text: &str, context: &mut ExecutionContext<A>) -> bool {
        let Some(resolver) = param.value_resolver() else {
            return false;
        };
        let mut stream = MutableStringStream::new(text);
        match resolver.resolve(&mut stream, context) {
            Ok(value) if !stream.has_remaining() => {
                context.arguments_mut().insert(param.name(), value);
                true
            }
            _ => false,
        }
    }

    /// Record the flags named by `flag`; returns the one whose value may follow.
    fn mark_flags(
        &self,
        node: &TreeNode<A>,
        actor: &A,
        flag: &FlagToken<'_>,
        used: &mut HashSet<String>,
    ) -> Option<Arc<ParameterNode<A>>> {
        let commands = self.visible_commands(node, actor);
        let lookup = |c: &ExecutableCommand<A>| match flag {
            FlagToken::Long(name) => c.flag_by_name(name).map(Arc::clone),
            FlagToken::Short(cluster) => cluster.chars().last().and_then(|s| c.flag_by_shorthand(s).map(Arc::clone)),
        };
        match flag {
            FlagToken::Long(name) => {
                used.insert((*name).to_string());
            }
            FlagToken::Short(cluster) => {
                for s in cluster.chars() {
                    if let Some((long, _)) = commands
                        .iter()
                        .find_map(|c| c.flag_by_shorthand(s))
                        .and_then(|f| f.flag_names())
                    {
                        used.insert(long.to_string());
                    }
                }
            }
        }
        commands.iter().find_map(|c| lookup(c))
    }

    /// `-`, `--`, or the start of a flag name.
    fn is_flag_prefix(&self, partial: &str) -> bool {
        let short = &self.settings.short_flag_prefix;
        let long = &self.settings.long_flag_prefix;
        let Some(rest) = partial.strip_prefix(short.as_str()) else {
            return false;
        };
        let rest = long
            .strip_prefix(short.as_str())
            .and_then(|tail| rest.strip_prefix(tail))
            .unwrap_or(rest);
        rest.chars().next().is_none_or(char::is_alphabetic)
    }

    fn flag_names(&self, node: &TreeNode<A>, actor: &A, used: &HashSet<String>) -> Vec<String> {
        let long = &self.settings.long_flag_prefix;
        let short = &self.settings.short_flag_prefix;
        let mut out = Vec::new();
        for command in self.visible_commands(node, actor) {
            for flag in command.flags() {
                let Some((name, shorthand)) = flag.flag_names() else {
                    continue;
                };
                if used.contains(name) || !self.param_allowed(flag, actor) {
                    continue;
                }
                out.push(format!("{long}{name}"));
                if let Some(c) = shorthand {
                    out.push(format!("{short}{c}"));
                }
            }
        }
        out
    }

    fn children(&self, node: &TreeNode<A>, context: &ExecutionContext<A>) -> Vec<String> {
        let actor = context.actor();
        let mut out: Vec<String> = node
            .literals()
            .filter(|(_, child)| self.literal_visible(child, actor))
            .map(|(name, _)| name.to_string())
            .collect();
        for branch in node.parameters() {
            if !self.param_allowed(&branch.node, actor) {
                continue;
            }
            if let Some(provider) = branch.node.suggestions() {
                out.extend(provider.suggestions(context));
            }
        }
        out
    }

    fn visible(&self, command: &ExecutableCommand<A>, actor: &A) -> bool {
        !command.is_secret()
            && command
                .permission()
                .is_none_or(|p| self.permissions.has_permission(actor, p))
    }

    fn visible_commands(&self, node: &TreeNode<A>, actor: &A) -> Vec<Arc<ExecutableCommand<A>>> {
        node.commands()
            .into_iter()
            .filter(|c| self.visible(c, actor))
            .collect()
    }

    fn literal_visible(&self, node: &TreeNode<A>, actor: &A) -> bool {
        node.commands().iter().any(|c| self.visible(c, actor))
    }

    fn param_allowed(&self, param: &ParameterNode<A>, actor: &A) -> bool {
        param
            .attrs()
            .permission
            .as_deref()
            .is_none_or(|p| self.permissions.has_permission(actor, p))
    }
}
