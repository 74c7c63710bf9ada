// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script context handed to every node on initialization.

use crate::datamodel::PathResolver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a script context, usable as a lookup key by resolvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    /// Create a new random context ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborators a script's nodes may use while initializing.
///
/// The engine never looks inside; it passes the same context to every node.
#[derive(Clone, Default)]
pub struct ScriptContext {
    id: ContextId,
    resolver: Option<Arc<dyn PathResolver>>,
}

impl ScriptContext {
    /// Create a context without an external data model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that resolves data model paths through `resolver`
    pub fn with_resolver(resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            id: ContextId::new(),
            resolver: Some(resolver),
        }
    }

    /// Context ID
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Path resolver, if any
    pub fn resolver(&self) -> Option<&Arc<dyn PathResolver>> {
        self.resolver.as_ref()
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("id", &self.id)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}
