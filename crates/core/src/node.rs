//! The merged command tree.
//!
//! Every registered command is a sequence of [`Segment`]s. Commands that
//! share a prefix share tree nodes, so dispatch is a single descent. At each
//! node, literal children are tried before parameter children, and both are
//! kept in registration order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::actor::Actor;
use crate::command::ExecutableCommand;
use crate::error::RegistrationError;
use crate::param::{ParamAttrs, ParamKind};
use crate::resolve::{Resolver, Validator, ValueResolver};
use crate::suggest::SuggestionProvider;
use crate::value::{ParamType, TypeShape};

// ── ParameterNode ────────────────────────────────────────────────────────

/// A compiled parameter: declaration plus the resolver, suggestion provider,
/// and validators chosen for it at registration.
pub struct ParameterNode<A: Actor> {
    pub(crate) name: String,
    pub(crate) ty: ParamType,
    pub(crate) attrs: ParamAttrs,
    pub(crate) description: Option<String>,
    pub(crate) resolver: Resolver<A>,
    pub(crate) suggestions: Option<Arc<dyn SuggestionProvider<A>>>,
    pub(crate) validators: Vec<Arc<dyn Validator<A>>>,
}

impl<A: Actor> ParameterNode<A> {
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

    /// Human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The resolver chosen at registration.
    pub fn resolver(&self) -> &Resolver<A> {
        &self.resolver
    }

    /// The value resolver, for positional parameters and flags.
    pub fn value_resolver(&self) -> Option<&Arc<dyn ValueResolver<A>>> {
        self.resolver.as_value()
    }

    /// The suggestion provider chosen at registration, if any.
    pub fn suggestions(&self) -> Option<&Arc<dyn SuggestionProvider<A>>> {
        self.suggestions.as_ref()
    }

    /// Validators that apply to this parameter, in registration order.
    pub fn validators(&self) -> &[Arc<dyn Validator<A>>] {
        &self.validators
    }

    /// Whether the parameter may be omitted.
    pub fn is_optional(&self) -> bool {
        self.attrs.optional
    }

    /// Whether this is a switch.
    pub fn is_switch(&self) -> bool {
        matches!(self.attrs.kind, ParamKind::Switch { .. })
    }

    /// Long name and shorthand for flags and switches.
    pub fn flag_names(&self) -> Option<(&str, Option<char>)> {
        self.attrs.kind.flag_names()
    }

    /// Whether the parameter takes everything left in the input.
    pub fn consumes_rest(&self) -> bool {
        self.attrs.greedy
            || (matches!(self.ty.shape(), TypeShape::List(_)) && self.attrs.delimiter == ' ')
    }

    /// Whether two nodes can be merged into one tree position.
    pub(crate) fn same_shape(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.attrs == other.attrs
    }

    /// How this parameter appears in a usage string.
    pub fn usage(&self, long_prefix: &str) -> String {
        let body = match &self.attrs.kind {
            ParamKind::Positional => format!("<{}>", self.name),
            ParamKind::Flag { name, .. } => format!("{long_prefix}{name} <{}>", self.name),
            ParamKind::Switch { name, .. } => format!("{long_prefix}{name}"),
            ParamKind::Context => return String::new(),
        };
        let optional = self.attrs.optional || self.is_switch();
        if !optional {
            return body;
        }
        match &self.attrs.kind {
            ParamKind::Positional => format!("[{}]", self.name),
            _ => format!("[{body}]"),
        }
    }
}

impl<A: Actor> fmt::Debug for ParameterNode<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterNode")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

// ── Path parsing ─────────────────────────────────────────────────────────

/// One element of a parsed path string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathToken {
    Literal(String),
    Parameter(String),
}

/// Parse a path like `give <selector> <item>` into tokens.
///
/// The first token must be a literal. Parameter tokens are `<name>`;
/// everything else is a literal word.
pub(crate) fn parse_path(path: &str) -> Result<Vec<PathToken>, RegistrationError> {
    let invalid = |reason: String| RegistrationError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    let mut tokens = Vec::new();
    for word in path.split_whitespace() {
        if let Some(inner) = word.strip_prefix('<') {
            let name = inner
                .strip_suffix('>')
                .ok_or_else(|| invalid(format!("unclosed parameter '{word}'")))?;
            if name.is_empty() || name.contains(['<', '>']) {
                return Err(invalid(format!("bad parameter name in '{word}'")));
            }
            tokens.push(PathToken::Parameter(name.to_string()));
        } else {
            if word.contains(['<', '>', '"']) {
                return Err(invalid(format!("bad literal '{word}'")));
            }
            tokens.push(PathToken::Literal(word.to_string()));
        }
    }
    match tokens.first() {
        None => Err(invalid("path is empty".into())),
        Some(PathToken::Parameter(name)) => {
            Err(invalid(format!("must start with a literal, found <{name}>")))
        }
        Some(PathToken::Literal(_)) => Ok(tokens),
    }
}

// ── Tree ─────────────────────────────────────────────────────────────────

/// A compiled path element.
pub enum Segment<A: Actor> {
    /// A fixed word.
    Literal(String),
    /// A positional parameter.
    Parameter(Arc<ParameterNode<A>>),
}

impl<A: Actor> Clone for Segment<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(s) => Self::Literal(s.clone()),
            Self::Parameter(p) => Self::Parameter(Arc::clone(p)),
        }
    }
}

impl<A: Actor> fmt::Debug for Segment<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Parameter(p) => write!(f, "<{}>", p.name),
        }
    }
}

/// A parameter child and the subtree below it.
pub struct ParameterBranch<A: Actor> {
    /// The parameter at this position.
    pub node: Arc<ParameterNode<A>>,
    /// What follows it.
    pub next: TreeNode<A>,
}

/// One position in the command tree.
pub struct TreeNode<A: Actor> {
    pub(crate) literals: Vec<(String, TreeNode<A>)>,
    pub(crate) parameters: Vec<ParameterBranch<A>>,
    pub(crate) command: Option<Arc<ExecutableCommand<A>>>,
}

impl<A: Actor> Default for TreeNode<A> {
    fn default() -> Self {
        Self {
            literals: Vec::new(),
            parameters: Vec::new(),
            command: None,
        }
    }
}

impl<A: Actor> Clone for TreeNode<A> {
    fn clone(&self) -> Self {
        Self {
            literals: self.literals.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|b| ParameterBranch {
                    node: Arc::clone(&b.node),
                    next: b.next.clone(),
                })
                .collect(),
            command: self.command.as_ref().map(Arc::clone),
        }
    }
}

impl<A: Actor> TreeNode<A> {
    /// The first literal child matching `word`.
    pub fn literal(&self, word: &str, case_sensitive: bool) -> Option<(&str, &TreeNode<A>)> {
        self.literals
            .iter()
            .find(|(name, _)| {
                if case_sensitive {
                    name == word
                } else {
                    name.eq_ignore_ascii_case(word)
                }
            })
            .map(|(name, node)| (name.as_str(), node))
    }

    /// Literal children in registration order.
    pub fn literals(&self) -> impl Iterator<Item = (&str, &TreeNode<A>)> {
        self.literals.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Parameter children in registration order.
    pub fn parameters(&self) -> &[ParameterBranch<A>] {
        &self.parameters
    }

    /// The command that ends exactly here.
    pub fn command(&self) -> Option<&Arc<ExecutableCommand<A>>> {
        self.command.as_ref()
    }

    /// Whether nothing hangs below this node.
    pub fn is_leaf(&self) -> bool {
        self.literals.is_empty() && self.parameters.is_empty()
    }

    /// Whether neither a command nor any child is left here.
    fn is_empty(&self) -> bool {
        self.command.is_none() && self.is_leaf()
    }

    /// Drop commands failing `keep`, then every child left empty. Returns
    /// how many commands were dropped.
    fn prune(&mut self, keep: &dyn Fn(&ExecutableCommand<A>) -> bool) -> usize {
        let mut removed = 0;
        if self.command.as_ref().is_some_and(|c| !keep(c.as_ref())) {
            self.command = None;
            removed += 1;
        }
        for (_, child) in &mut self.literals {
            removed += child.prune(keep);
        }
        for branch in &mut self.parameters {
            removed += branch.next.prune(keep);
        }
        self.literals.retain(|(_, child)| !child.is_empty());
        self.parameters.retain(|b| !b.next.is_empty());
        removed
    }

    /// Every command at or below this node.
    pub fn commands(&self) -> Vec<Arc<ExecutableCommand<A>>> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<Arc<ExecutableCommand<A>>>) {
        if let Some(cmd) = &self.command {
            out.push(Arc::clone(cmd));
        }
        for (_, child) in &self.literals {
            child.collect(out);
        }
        for branch in &self.parameters {
            branch.next.collect(out);
        }
    }

    fn check_categories(&self, path: &mut Vec<String>) -> Result<(), RegistrationError> {
        if self.command.is_some() && !self.literals.is_empty() && !self.parameters.is_empty() {
            return Err(RegistrationError::CategoryConflict {
                path: path.join(" "),
            });
        }
        for (name, child) in &self.literals {
            path.push(name.clone());
            child.check_categories(path)?;
            path.pop();
        }
        for branch in &self.parameters {
            path.push(format!("<{}>", branch.node.name));
            branch.next.check_categories(path)?;
            path.pop();
        }
        Ok(())
    }
}

/// All registered commands, merged by shared prefix.
pub struct CommandTree<A: Actor> {
    root: TreeNode<A>,
}

impl<A: Actor> Default for CommandTree<A> {
    fn default() -> Self {
        Self {
            root: TreeNode::default(),
        }
    }
}

impl<A: Actor> Clone for CommandTree<A> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<A: Actor> CommandTree<A> {
    /// The root node; its literal children are the top-level commands.
    pub fn root(&self) -> &TreeNode<A> {
        &self.root
    }

    /// Merge `command` into the tree.
    ///
    /// The tree is left unchanged if the command cannot be merged.
    pub fn insert(&mut self, command: Arc<ExecutableCommand<A>>) -> Result<(), RegistrationError> {
        let mut root = self.root.clone();
        let mut node = &mut root;
        let mut walked: Vec<String> = Vec::new();

        for segment in command.segments() {
            match segment {
                Segment::Literal(word) => {
                    let index = match node.literals.iter().position(|(n, _)| n == word) {
                        Some(i) => i,
                        None => {
                            node.literals.push((word.clone(), TreeNode::default()));
                            node.literals.len() - 1
                        }
                    };
                    walked.push(word.clone());
                    node = &mut node.literals[index].1;
                }
                Segment::Parameter(param) => {
                    let index = match merge_position(node, param, &walked)? {
                        Some(i) => i,
                        None => {
                            node.parameters.push(ParameterBranch {
                                node: Arc::clone(param),
                                next: TreeNode::default(),
                            });
                            node.parameters.len() - 1
                        }
                    };
                    walked.push(format!("<{}>", param.name));
                    node = &mut node.parameters[index].next;
                }
            }
        }

        if node.command.is_some() {
            return Err(RegistrationError::DuplicateCommand {
                path: walked.join(" "),
            });
        }
        node.command = Some(command);

        root.check_categories(&mut Vec::new())?;
        self.root = root;
        Ok(())
    }

    /// Remove every command whose path starts with the words of `path`,
    /// along with the aliases of those commands. Nodes left without
    /// commands are pruned. Returns how many commands were removed.
    ///
    /// Words are compared against rendered paths, so parameters are
    /// written as `<name>`.
    pub fn remove(&mut self, path: &str) -> usize {
        let prefix: Vec<&str> = path.split_whitespace().collect();
        if prefix.is_empty() {
            return 0;
        }
        let origins: HashSet<String> = self
            .commands()
            .iter()
            .filter(|c| {
                let mut words = c.path().split_whitespace();
                prefix.iter().all(|p| words.next() == Some(*p))
            })
            .map(|c| c.origin().to_string())
            .collect();
        if origins.is_empty() {
            return 0;
        }
        self.root.prune(&|c| !origins.contains(c.origin()))
    }

    /// Remove every command.
    pub fn clear(&mut self) {
        self.root = TreeNode::default();
    }

    /// Every registered command, in tree order.
    pub fn commands(&self) -> Vec<Arc<ExecutableCommand<A>>> {
        self.root.commands()
    }
}

/// Find the existing branch `param` can share.
///
/// Same name, type, and attributes: reuse. Same type under another name,
/// or same name with different attributes: the two could never be told
/// apart, so registration fails. Different types coexist and are tried in
/// registration order.
fn merge_position<A: Actor>(
    node: &TreeNode<A>,
    param: &ParameterNode<A>,
    walked: &[String],
) -> Result<Option<usize>, RegistrationError> {
    for (i, branch) in node.parameters.iter().enumerate() {
        let existing = &branch.node;
        if existing.ty != param.ty {
            continue;
        }
        if existing.name != param.name {
            return Err(RegistrationError::AmbiguousParameters {
                path: walked.join(" "),
                existing: existing.name.clone(),
                new: param.name.clone(),
            });
        }
        if !existing.same_shape(param) {
            return Err(RegistrationError::ConflictingParameter {
                path: walked.join(" "),
                name: param.name.clone(),
            });
        }
        return Ok(Some(i));
    }
    Ok(None)
}
