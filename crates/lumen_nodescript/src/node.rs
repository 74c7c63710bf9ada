// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the script graph.
//!
//! A [`Node`] is the graph-owned instance: id, display metadata, its
//! [`PinSet`] and lifecycle state. What the node actually does lives behind
//! the [`NodeBehavior`] trait, one implementation per catalog kind.

use crate::context::ScriptContext;
use crate::datamodel::RevalidationNotifier;
use crate::evaluation::EvaluationError;
use crate::pin::{PinId, PinSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Static values
    Input,
    /// Script result
    Output,
    /// Boolean logic and comparisons
    Logic,
    /// Arithmetic
    Math,
    /// Text operations
    Text,
    /// Type conversions
    Conversion,
    /// External data model bindings
    DataModel,
}

/// What a node is handed while it initializes or revalidates
pub struct NodeContext<'a> {
    /// The node being initialized
    pub node_id: NodeId,
    /// Script context, identical for every node of a script
    pub script: &'a ScriptContext,
    /// Queues a revalidation of this node
    pub notifier: RevalidationNotifier,
}

/// Kind-specific behavior of a node.
///
/// Implementations own the ids of the pins they created and read or write
/// them through the [`PinSet`] passed into every call.
pub trait NodeBehavior: Send {
    /// Resolve external configuration; may create or replace pins
    fn initialize(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        let _ = (pins, ctx);
    }

    /// Read inputs and write outputs. Must not add or remove pins.
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError>;

    /// An external binding reported a structural change; may reshape pins
    fn revalidate(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        let _ = (pins, ctx);
    }

    /// Storage was replaced on an initialized node; may rebind and reshape
    fn reconfigure(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        self.revalidate(pins, ctx);
    }

    /// Release anything taken in `initialize`
    fn dispose(&mut self) {}

    /// Clear internal state (counters, remembered values)
    fn reset(&mut self) {}

    /// Kind-specific configuration to persist
    fn storage(&self) -> Option<serde_json::Value> {
        None
    }

    /// Apply persisted configuration
    fn load_storage(&mut self, storage: serde_json::Value) -> Result<(), serde_json::Error> {
        let _ = storage;
        Ok(())
    }
}

/// Lifecycle of a node within one script load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Created, not yet initialized
    Uninitialized,
    /// Initialized against a script context
    Initialized,
    /// Disposed; will not be evaluated again
    Disposed,
}

/// A node instance in the script
pub struct Node {
    id: NodeId,
    kind: String,
    /// Display name (can be customized)
    pub name: String,
    /// Description shown in the editor
    pub description: String,
    /// Position in the editor
    pub position: [f64; 2],
    pins: PinSet,
    behavior: Box<dyn NodeBehavior>,
    state: NodeState,
    broken: Option<String>,
}

impl Node {
    /// Create a node from its kind and behavior
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        pins: PinSet,
        behavior: Box<dyn NodeBehavior>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            kind: kind.into(),
            name: name.into(),
            description: String::new(),
            position: [0.0, 0.0],
            pins,
            behavior,
            state: NodeState::Uninitialized,
            broken: None,
        }
    }

    /// Unique instance ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Re-key the node; only valid before it is placed in a script arena
    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// Set the position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = [x, y];
        self
    }

    /// Catalog kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Lifecycle state
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The node's pins
    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    /// Mutable access to the node's pins (e.g. to assign unconnected input values)
    pub fn pins_mut(&mut self) -> &mut PinSet {
        &mut self.pins
    }

    /// Whether the node has a pin with this id
    pub fn has_pin(&self, pin_id: PinId) -> bool {
        self.pins.contains(pin_id)
    }

    /// Message of the last failed evaluation, cleared by a successful one
    pub fn broken(&self) -> Option<&str> {
        self.broken.as_deref()
    }

    /// Persistable configuration
    pub fn storage(&self) -> Option<serde_json::Value> {
        self.behavior.storage()
    }

    pub(crate) fn load_storage(&mut self, storage: serde_json::Value) -> Result<(), serde_json::Error> {
        self.behavior.load_storage(storage)
    }

    pub(crate) fn initialize(&mut self, ctx: &NodeContext<'_>) {
        if self.state != NodeState::Uninitialized {
            return;
        }
        self.behavior.initialize(&mut self.pins, ctx);
        self.state = NodeState::Initialized;
    }

    pub(crate) fn revalidate(&mut self, ctx: &NodeContext<'_>) {
        if self.state == NodeState::Initialized {
            self.behavior.revalidate(&mut self.pins, ctx);
        }
    }

    pub(crate) fn reconfigure(&mut self, ctx: &NodeContext<'_>) {
        if self.state == NodeState::Initialized {
            self.behavior.reconfigure(&mut self.pins, ctx);
        }
    }

    /// Run the behavior; a failure resets outputs to their type defaults
    pub(crate) fn evaluate(&mut self) -> Result<(), EvaluationError> {
        match self.behavior.evaluate(&mut self.pins) {
            Ok(()) => {
                self.broken = None;
                Ok(())
            }
            Err(err) => {
                self.pins.reset_outputs();
                self.broken = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.pins.reset();
        self.behavior.reset();
        self.broken = None;
    }

    pub(crate) fn dispose(&mut self) {
        if self.state == NodeState::Disposed {
            return;
        }
        self.behavior.dispose();
        self.state = NodeState::Disposed;
    }

    pub(crate) fn has_pending_changes(&self) -> bool {
        self.pins.has_pending_changes()
    }

    pub(crate) fn take_removed_pins(&mut self) -> Vec<PinId> {
        self.pins.take_removed()
    }

    pub(crate) fn take_shape_changed(&mut self) -> bool {
        self.pins.take_shape_changed()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("pins", &self.pins.len())
            .finish()
    }
}

/// Builds the pins and behavior of a node kind
pub type NodeConstructor = fn(&mut PinSet) -> Box<dyn NodeBehavior>;

/// Node kind definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique kind identifier, persisted with every node
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Creates pins and behavior
    pub constructor: NodeConstructor,
}

/// Registry of available node kinds
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node kind
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node kind by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered kinds
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get kinds by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a kind ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        let node_type = self.get(type_id)?;
        let mut pins = PinSet::new();
        let behavior = (node_type.constructor)(&mut pins);
        let mut node = Node::new(node_type.id.clone(), node_type.name.clone(), pins, behavior);
        node.description = node_type.description.clone();
        Some(node)
    }
}
