// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interface to the external, hierarchically addressed data model.
//!
//! Nodes bind to a [`DataModelPath`] through a [`PathResolver`]. Resolvers
//! report structural changes ("the path was revalidated") through a
//! [`RevalidationNotifier`], which only queues the node id; the owning script
//! applies the change between ticks.

pub mod memory;

use crate::context::ScriptContext;
use crate::node::NodeId;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::sync::Arc;

pub use memory::MemoryDataModel;

/// Dot separated path into the data model, e.g. `Audio.Volume.Level`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataModelPath {
    segments: Vec<String>,
}

impl DataModelPath {
    /// Parse a path
    pub fn parse(path: &str) -> Result<Self, DataModelError> {
        let segments: Vec<String> = path.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(DataModelError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    /// Path segments from the root
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `self` equals `other` or lies beneath it
    pub fn starts_with(&self, other: &DataModelPath) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Whether either path lies beneath (or equals) the other
    pub fn overlaps(&self, other: &DataModelPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for DataModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for DataModelPath {
    type Err = DataModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DataModelPath {
    type Error = DataModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DataModelPath> for String {
    fn from(path: DataModelPath) -> Self {
        path.to_string()
    }
}

/// Outcome of resolving a path
#[derive(Debug, Clone, PartialEq)]
pub struct PathResolution {
    /// Whether the path currently points at something
    pub is_valid: bool,
    /// Runtime type at the path, when valid
    pub runtime_type: Option<ValueType>,
    /// Current value at the path
    pub current_value: Value,
}

impl PathResolution {
    /// A resolution for a path that does not exist
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            runtime_type: None,
            current_value: Value::Null,
        }
    }

    /// A resolution for an existing path
    pub fn valid(runtime_type: ValueType, current_value: Value) -> Self {
        Self {
            is_valid: true,
            runtime_type: Some(runtime_type),
            current_value,
        }
    }
}

/// Handle of a revalidation subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Queues a "path revalidated" notification for one node of one script
#[derive(Debug, Clone)]
pub struct RevalidationNotifier {
    node_id: NodeId,
    sender: Sender<NodeId>,
}

impl RevalidationNotifier {
    pub(crate) fn new(node_id: NodeId, sender: Sender<NodeId>) -> Self {
        Self { node_id, sender }
    }

    /// The node to revalidate
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Queue the notification; returns `false` once the script is gone
    pub fn notify(&self) -> bool {
        self.sender.send(self.node_id).is_ok()
    }
}

/// Resolves data model paths and reports when they need revalidation
pub trait PathResolver: Send + Sync {
    /// Resolve `path` for the given script context
    fn resolve(&self, path: &DataModelPath, context: &ScriptContext) -> PathResolution;

    /// Start delivering revalidation notifications for `path`
    fn subscribe(&self, path: &DataModelPath, notifier: RevalidationNotifier) -> SubscriptionId;

    /// Stop delivering notifications for a subscription
    fn unsubscribe(&self, subscription: SubscriptionId);
}

/// A node's live binding to a data model path
pub struct PathBinding {
    path: DataModelPath,
    resolver: Arc<dyn PathResolver>,
    context: ScriptContext,
    subscription: SubscriptionId,
}

impl PathBinding {
    /// Bind to `path`, subscribing to revalidation; `None` when the context
    /// has no resolver
    pub fn bind(
        path: DataModelPath,
        context: &ScriptContext,
        notifier: RevalidationNotifier,
    ) -> Option<Self> {
        let resolver = Arc::clone(context.resolver()?);
        let subscription = resolver.subscribe(&path, notifier);
        Some(Self {
            path,
            resolver,
            context: context.clone(),
            subscription,
        })
    }

    /// The bound path
    pub fn path(&self) -> &DataModelPath {
        &self.path
    }

    /// Resolve the bound path now
    pub fn resolve(&self) -> PathResolution {
        self.resolver.resolve(&self.path, &self.context)
    }

    /// Release the subscription
    pub fn unbind(self) {
        self.resolver.unsubscribe(self.subscription);
    }
}

impl fmt::Debug for PathBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathBinding")
            .field("path", &self.path)
            .field("subscription", &self.subscription)
            .finish()
    }
}

/// Error from the data model
#[derive(Debug, thiserror::Error)]
pub enum DataModelError {
    /// Path is malformed
    #[error("Invalid data model path: '{0}'")]
    InvalidPath(String),

    /// Nothing exists at the path
    #[error("Data model path not found: {0}")]
    PathNotFound(DataModelPath),

    /// Value does not fit the declared type
    #[error("Value of type {found} does not fit {path} (declared {expected})")]
    TypeMismatch {
        /// The path
        path: DataModelPath,
        /// Declared type
        expected: ValueType,
        /// Type of the rejected value
        found: ValueType,
    },
}
