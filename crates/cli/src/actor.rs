//! The actor the CLI dispatches as.

use std::sync::{Mutex, PoisonError};

use cmdtree_core::Actor;

/// Collects replies and errors so they can be printed in the chosen format
/// once the dispatch has finished.
#[derive(Debug, Default)]
pub(crate) struct CliActor {
    pub(crate) name: String,
    permissions: Vec<String>,
    replies: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl CliActor {
    pub(crate) fn new(name: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            permissions,
            ..Self::default()
        }
    }

    /// Whether the actor holds `permission`. `*` grants everything.
    pub(crate) fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == "*" || p == permission)
    }

    pub(crate) fn take_replies(&self) -> Vec<String> {
        std::mem::take(&mut *self.replies.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Actor for CliActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn reply(&self, message: &str) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// Permission reader for engines that dispatch as a [`CliActor`].
pub(crate) fn permission_reader(actor: &CliActor, permission: &str) -> bool {
    actor.has_permission(permission)
}
