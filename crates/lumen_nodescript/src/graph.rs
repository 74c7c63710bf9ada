// SPDX-License-Identifier: MIT OR Apache-2.0
//! The node script: nodes, connections, cached execution plan and lifecycle.

use crate::connection::{Connection, ConnectionId, PinAddress};
use crate::context::ScriptContext;
use crate::datamodel::RevalidationNotifier;
use crate::evaluation::{run_pass, CycleError, ExecutionPlan, PassReport};
use crate::node::{Node, NodeContext, NodeId, NodeRegistry, NodeState};
use crate::nodes::exit;
use crate::pin::{CollectionId, PinError, PinId};
use crate::value::{is_compatible, Value, ValueType};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Lifecycle of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    /// No context yet; nodes are not initialized
    Empty,
    /// Initialized, not ticked yet
    Loaded,
    /// Ticked at least once
    Running,
    /// Torn down; ticks are ignored
    Disposed,
}

/// Why a tick did not evaluate anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The script has not been initialized or loaded
    NotLoaded,
    /// The script was disposed
    Disposed,
    /// The connections contain a cycle
    Cycle,
}

/// Result of a tick
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A pass ran
    Evaluated(PassReport),
    /// No pass ran
    Skipped(SkipReason),
}

impl TickOutcome {
    /// Whether a pass ran
    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Evaluated(_))
    }
}

/// A user-authored dataflow graph evaluated once per frame
pub struct NodeScript {
    /// Script name
    pub name: String,
    /// Script description
    pub description: String,
    registry: Arc<NodeRegistry>,
    result_type: Option<ValueType>,
    exit_node: Option<NodeId>,
    context: Option<ScriptContext>,
    nodes: IndexMap<NodeId, Node>,
    connections: IndexMap<ConnectionId, Connection>,
    plan: Option<ExecutionPlan>,
    state: ScriptState,
    revalidation_tx: Sender<NodeId>,
    revalidation_rx: Receiver<NodeId>,
}

fn node_context<'a>(
    context: &'a ScriptContext,
    sender: &Sender<NodeId>,
    node_id: NodeId,
) -> NodeContext<'a> {
    NodeContext {
        node_id,
        script: context,
        notifier: RevalidationNotifier::new(node_id, sender.clone()),
    }
}

fn type_name(value_type: Option<&ValueType>) -> String {
    value_type.map_or_else(|| "unset".to_string(), ToString::to_string)
}

impl NodeScript {
    /// Create an empty script without a result
    pub fn new(name: impl Into<String>, registry: Arc<NodeRegistry>) -> Self {
        let (revalidation_tx, revalidation_rx) = mpsc::channel();
        Self {
            name: name.into(),
            description: String::new(),
            registry,
            result_type: None,
            exit_node: None,
            context: None,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            plan: None,
            state: ScriptState::Empty,
            revalidation_tx,
            revalidation_rx,
        }
    }

    /// Create an empty script whose exit node produces a value of `result_type`
    pub fn with_result(
        name: impl Into<String>,
        registry: Arc<NodeRegistry>,
        result_type: ValueType,
    ) -> Self {
        let mut script = Self::new(name, registry);
        let node = exit::create_exit_node(result_type.clone());
        script.exit_node = Some(node.id());
        script.result_type = Some(result_type);
        script.nodes.insert(node.id(), node);
        script
    }

    /// Lifecycle state
    pub fn state(&self) -> ScriptState {
        self.state
    }

    /// The context nodes were initialized with
    pub fn context(&self) -> Option<&ScriptContext> {
        self.context.as_ref()
    }

    /// The registry used to create nodes by kind
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Declared result type; `None` for scripts without an exit node
    pub fn result_type(&self) -> Option<&ValueType> {
        self.result_type.as_ref()
    }

    /// The exit node, if the script has a result
    pub fn exit_node(&self) -> Option<NodeId> {
        self.exit_node
    }

    /// The value arriving at the exit node
    pub fn result(&self) -> Option<&Value> {
        let node = self.nodes.get(&self.exit_node?)?;
        node.pins().inputs().next().map(|pin| pin.value())
    }

    /// Initialize every node against `context` and compute the execution order
    pub fn initialize(&mut self, context: ScriptContext) -> Result<(), ScriptError> {
        match self.state {
            ScriptState::Empty => {}
            ScriptState::Disposed => return Err(ScriptError::Disposed),
            ScriptState::Loaded | ScriptState::Running => return Err(ScriptError::AlreadyInitialized),
        }

        self.context = Some(context);
        if let Some(context) = self.context.as_ref() {
            for node in self.nodes.values_mut() {
                let id = node.id();
                node.initialize(&node_context(context, &self.revalidation_tx, id));
            }
        }
        self.reconcile();
        self.state = ScriptState::Loaded;
        if self.ensure_plan().is_err() {
            tracing::warn!("Script '{}' was initialized with a cycle", self.name);
        }
        tracing::debug!("Initialized script '{}' with {} nodes", self.name, self.nodes.len());
        Ok(())
    }

    /// Add a node; it is initialized right away when the script already has a context
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId, ScriptError> {
        if self.state == ScriptState::Disposed {
            return Err(ScriptError::Disposed);
        }
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(ScriptError::DuplicateNode(id));
        }
        if node.state() == NodeState::Disposed {
            return Err(ScriptError::NodeDisposed(id));
        }

        if let Some(context) = self.context.as_ref() {
            node.initialize(&node_context(context, &self.revalidation_tx, id));
        }
        node.take_removed_pins();
        node.take_shape_changed();
        self.nodes.insert(id, node);
        self.invalidate();
        Ok(id)
    }

    /// Create a node of a registered kind and add it
    pub fn add_node_of_kind(&mut self, kind: &str) -> Result<NodeId, ScriptError> {
        let node = self
            .registry
            .create_node(kind)
            .ok_or_else(|| ScriptError::UnknownNodeKind(kind.to_string()))?;
        self.add_node(node)
    }

    /// Remove a node and its connections; the node is disposed
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node, ScriptError> {
        if self.exit_node == Some(node_id) {
            return Err(ScriptError::ExitNodeRemoval);
        }
        let mut node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(ScriptError::NodeNotFound(node_id))?;
        self.connections.retain(|_, c| !c.involves_node(node_id));
        node.dispose();
        self.invalidate();
        Ok(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID.
    ///
    /// Pin shape changes made through it are reconciled before the next pass.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output pin to an input pin
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_pin: PinId,
        to_node: NodeId,
        to_pin: PinId,
    ) -> Result<ConnectionId, ConnectionError> {
        self.validate_connection(from_node, from_pin, to_node, to_pin)?;

        let connection = Connection::new(from_node, from_pin, to_node, to_pin);
        let id = connection.id;
        self.connections.insert(id, connection);
        self.invalidate();
        Ok(id)
    }

    fn validate_connection(
        &self,
        from_node: NodeId,
        from_pin: PinId,
        to_node: NodeId,
        to_pin: PinId,
    ) -> Result<(), ConnectionError> {
        // Validate nodes exist
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self
            .nodes
            .get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        // Validate pins exist
        let source_pin = source_node
            .pins()
            .pin(from_pin)
            .ok_or(ConnectionError::PinNotFound(PinAddress::new(from_node, from_pin)))?;
        let target_pin = target_node
            .pins()
            .pin(to_pin)
            .ok_or(ConnectionError::PinNotFound(PinAddress::new(to_node, to_pin)))?;

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        if !source_pin.is_output() || !target_pin.is_input() {
            return Err(ConnectionError::DirectionMismatch);
        }

        if !is_compatible(source_pin.value_type(), target_pin.value_type()) {
            return Err(ConnectionError::IncompatibleTypes {
                source_type: type_name(source_pin.value_type()),
                target_type: type_name(target_pin.value_type()),
            });
        }

        // One incoming connection per input
        let target = PinAddress::new(to_node, to_pin);
        if self.connections.values().any(|c| c.target() == target) {
            return Err(ConnectionError::PinAlreadyConnected(target));
        }

        if self.is_reachable(to_node, from_node) {
            return Err(ConnectionError::WouldCreateCycle);
        }

        Ok(())
    }

    /// Whether `goal` can be reached from `start` by following connections downstream
    fn is_reachable(&self, start: NodeId, goal: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == goal {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(
                self.connections
                    .values()
                    .filter(|c| c.from_node == current)
                    .map(|c| c.to_node),
            );
        }
        false
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.shift_remove(&connection_id);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Remove every connection attached to a pin
    pub fn disconnect_pin(&mut self, node_id: NodeId, pin_id: PinId) -> Vec<Connection> {
        let address = PinAddress::new(node_id, pin_id);
        let ids: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.involves_pin(address))
            .map(|c| c.id)
            .collect();
        ids.into_iter().filter_map(|id| self.disconnect(id)).collect()
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections from a specific output pin
    pub fn connections_from(&self, address: PinAddress) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.source() == address)
    }

    /// Get the connection into a specific input pin
    pub fn connection_to(&self, address: PinAddress) -> Option<&Connection> {
        self.connections.values().find(|c| c.target() == address)
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Append a pin to one of a node's pin collections
    pub fn add_collection_pin(
        &mut self,
        node_id: NodeId,
        collection: CollectionId,
    ) -> Result<PinId, ScriptError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(ScriptError::NodeNotFound(node_id))?;
        let pin = node.pins_mut().add_collection_pin(collection)?;
        self.reconcile();
        Ok(pin)
    }

    /// Remove a pin from one of a node's pin collections, dropping its connections
    pub fn remove_collection_pin(
        &mut self,
        node_id: NodeId,
        collection: CollectionId,
        pin: PinId,
    ) -> Result<Vec<Connection>, ScriptError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(ScriptError::NodeNotFound(node_id))?;
        node.pins_mut().remove_collection_pin(collection, pin)?;
        Ok(self.reconcile())
    }

    /// Replace a node's storage; an initialized node reconfigures itself.
    ///
    /// Returns the connections dropped because the node reshaped.
    pub fn update_storage(
        &mut self,
        node_id: NodeId,
        storage: serde_json::Value,
    ) -> Result<Vec<Connection>, ScriptError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(ScriptError::NodeNotFound(node_id))?;
        node.load_storage(storage)
            .map_err(|source| ScriptError::Storage { node: node_id, source })?;
        if let Some(context) = self.context.as_ref() {
            node.reconfigure(&node_context(context, &self.revalidation_tx, node_id));
        }
        Ok(self.reconcile())
    }

    /// Drop connections whose pins were removed, no longer exist, or are no
    /// longer type compatible, then invalidate the cached order.
    pub fn reconcile(&mut self) -> Vec<Connection> {
        let mut removed = HashSet::new();
        let mut changed = false;
        for node in self.nodes.values_mut() {
            removed.extend(
                node.take_removed_pins()
                    .into_iter()
                    .map(|pin| PinAddress::new(node.id(), pin)),
            );
            changed |= node.take_shape_changed();
        }

        let nodes = &self.nodes;
        let mut dropped = Vec::new();
        self.connections.retain(|_, c| {
            let keep = !removed.contains(&c.source())
                && !removed.contains(&c.target())
                && connection_is_valid(nodes, c);
            if !keep {
                dropped.push(c.clone());
            }
            keep
        });

        if changed || !dropped.is_empty() {
            self.invalidate();
        }
        if !dropped.is_empty() {
            tracing::debug!(
                "Reconciled script '{}': dropped {} connection(s)",
                self.name,
                dropped.len()
            );
        }
        dropped
    }

    /// Apply queued revalidation notifications; returns how many nodes revalidated
    pub fn process_revalidations(&mut self) -> usize {
        let pending: Vec<NodeId> = self.revalidation_rx.try_iter().collect();
        let Some(context) = self.context.as_ref() else {
            return 0;
        };
        if self.state == ScriptState::Disposed {
            return 0;
        }

        let mut seen = HashSet::new();
        let mut count = 0;
        for node_id in pending {
            if !seen.insert(node_id) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.revalidate(&node_context(context, &self.revalidation_tx, node_id));
                count += 1;
            }
        }

        if count > 0 {
            self.reconcile();
        }
        count
    }

    fn invalidate(&mut self) {
        self.plan = None;
    }

    fn ensure_plan(&mut self) -> Result<(), CycleError> {
        if self.plan.is_none() {
            self.plan = Some(ExecutionPlan::build(&self.nodes, &self.connections)?);
        }
        Ok(())
    }

    /// The current execution order, computed if invalidated
    pub fn execution_order(&mut self) -> Result<&[NodeId], CycleError> {
        self.ensure_plan()?;
        Ok(self.plan.as_ref().map(ExecutionPlan::order).unwrap_or_default())
    }

    /// Run one evaluation pass.
    ///
    /// Queued revalidations and pending pin changes are applied first. A
    /// script that is not loaded, disposed, or structurally broken is skipped.
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            ScriptState::Empty => return TickOutcome::Skipped(SkipReason::NotLoaded),
            ScriptState::Disposed => return TickOutcome::Skipped(SkipReason::Disposed),
            ScriptState::Loaded | ScriptState::Running => {}
        }

        self.process_revalidations();
        if self.nodes.values().any(Node::has_pending_changes) {
            self.reconcile();
        }
        self.state = ScriptState::Running;

        if self.ensure_plan().is_err() {
            tracing::warn!("Skipping pass of script '{}': connections contain a cycle", self.name);
            return TickOutcome::Skipped(SkipReason::Cycle);
        }
        let Some(plan) = self.plan.as_ref() else {
            return TickOutcome::Skipped(SkipReason::Cycle);
        };
        TickOutcome::Evaluated(run_pass(&mut self.nodes, plan))
    }

    /// Restore every pin to its default and clear node state
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
    }

    /// Dispose every node; further ticks are ignored
    pub fn dispose(&mut self) {
        if self.state == ScriptState::Disposed {
            return;
        }
        for node in self.nodes.values_mut() {
            node.dispose();
        }
        self.plan = None;
        self.state = ScriptState::Disposed;
        tracing::debug!("Disposed script '{}'", self.name);
    }

    /// Dispose and remove everything but the exit node, returning to `Empty`
    pub(crate) fn clear_for_load(&mut self) -> Result<(), ScriptError> {
        if self.state == ScriptState::Disposed {
            return Err(ScriptError::Disposed);
        }
        let exit_node = self.exit_node;
        for node in self.nodes.values_mut().filter(|n| Some(n.id()) != exit_node) {
            node.dispose();
        }
        self.nodes.retain(|id, _| Some(*id) == exit_node);
        self.connections.clear();
        // Revalidations queued for the old nodes are meaningless now
        self.revalidation_rx.try_iter().for_each(drop);
        self.plan = None;
        self.context = None;
        self.state = ScriptState::Empty;
        Ok(())
    }

    /// Insert a restored node without initializing it
    pub(crate) fn insert_restored(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id()) {
            return false;
        }
        self.nodes.insert(node.id(), node);
        true
    }

    /// Give the exit node a persisted identity
    pub(crate) fn rebind_exit_node(&mut self, id: NodeId, name: Option<&str>, position: [f64; 2]) {
        let Some(old_id) = self.exit_node else {
            return;
        };
        let Some(index) = self.nodes.get_index_of(&old_id) else {
            return;
        };
        let Some(mut node) = self.nodes.shift_remove(&old_id) else {
            return;
        };
        node.set_id(id);
        node.position = position;
        if let Some(name) = name {
            node.name = name.to_string();
        }
        self.nodes.shift_insert(index, id, node);
        self.exit_node = Some(id);
    }
}

fn connection_is_valid(nodes: &IndexMap<NodeId, Node>, connection: &Connection) -> bool {
    let source = nodes
        .get(&connection.from_node)
        .and_then(|n| n.pins().pin(connection.from_pin));
    let target = nodes
        .get(&connection.to_node)
        .and_then(|n| n.pins().pin(connection.to_pin));
    match (source, target) {
        (Some(source), Some(target)) => {
            source.is_output()
                && target.is_input()
                && is_compatible(source.value_type(), target.value_type())
        }
        _ => false,
    }
}

impl Drop for NodeScript {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for NodeScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeScript")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Pin not found
    #[error("Pin not found: {0:?}")]
    PinNotFound(PinAddress),

    /// Both ends on the same node
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Connections run from an output to an input
    #[error("Connections must run from an output pin to an input pin")]
    DirectionMismatch,

    /// Incompatible pin types
    #[error("Incompatible pin types: {source_type} cannot flow into {target_type}")]
    IncompatibleTypes {
        /// Source pin type
        source_type: String,
        /// Target pin type
        target_type: String,
    },

    /// Input already has a connection
    #[error("Input pin already connected: {0:?}")]
    PinAlreadyConnected(PinAddress),

    /// The connection would close a cycle
    #[error("Connection would create a cycle")]
    WouldCreateCycle,
}

/// Error from script-level operations
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node with this ID already exists
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Disposed nodes cannot join a script again
    #[error("Node {0} is disposed")]
    NodeDisposed(NodeId),

    /// Kind is not in the registry
    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    /// The exit node cannot be removed
    #[error("The exit node cannot be removed")]
    ExitNodeRemoval,

    /// The script was already initialized
    #[error("Script is already initialized")]
    AlreadyInitialized,

    /// The script was disposed
    #[error("Script is disposed")]
    Disposed,

    /// Pin edit failed
    #[error(transparent)]
    Pin(#[from] PinError),

    /// Connection failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Node storage could not be applied
    #[error("Invalid storage for node {node}: {source}")]
    Storage {
        /// The node
        node: NodeId,
        /// Deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// Persisted script is newer than supported
    #[error("Script format version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{DataModelPath, MemoryDataModel};
    use crate::nodes::create_default_registry;
    use crate::value::Numeric;
    use serde_json::json;

    fn script() -> NodeScript {
        let mut script = NodeScript::with_result(
            "test",
            Arc::new(create_default_registry()),
            ValueType::Numeric,
        );
        script.initialize(ScriptContext::new()).unwrap();
        script
    }

    fn output(script: &NodeScript, node: NodeId) -> PinId {
        script.node(node).unwrap().pins().outputs().next().unwrap().id()
    }

    fn input(script: &NodeScript, node: NodeId, index: usize) -> PinId {
        script.node(node).unwrap().pins().inputs().nth(index).unwrap().id()
    }

    fn constant(script: &mut NodeScript, value: serde_json::Value) -> NodeId {
        let node = script.add_node_of_kind("static_numeric").unwrap();
        script.update_storage(node, value).unwrap();
        node
    }

    fn position(order: &[NodeId], node: NodeId) -> usize {
        order.iter().position(|n| *n == node).unwrap()
    }

    #[test]
    fn test_execution_order_respects_connections() {
        let mut script = script();
        let exit = script.exit_node().unwrap();
        // Added in reverse dependency order
        let divide = script.add_node_of_kind("divide").unwrap();
        let sum = script.add_node_of_kind("sum").unwrap();
        let a = constant(&mut script, json!(6));
        let b = constant(&mut script, json!(2));

        script.connect(divide, output(&script, divide), exit, input(&script, exit, 0)).unwrap();
        script.connect(sum, output(&script, sum), divide, input(&script, divide, 0)).unwrap();
        script.connect(a, output(&script, a), sum, input(&script, sum, 0)).unwrap();
        script.connect(b, output(&script, b), sum, input(&script, sum, 1)).unwrap();
        script.connect(b, output(&script, b), divide, input(&script, divide, 1)).unwrap();

        let order = script.execution_order().unwrap().to_vec();
        for connection in script.connections() {
            assert!(position(&order, connection.from_node) < position(&order, connection.to_node));
        }
        assert_eq!(order.len(), 5);
        assert_eq!(script.execution_order().unwrap(), order.as_slice());

        assert!(script.tick().is_evaluated());
        assert_eq!(script.result(), Some(&Value::Numeric(Numeric::from(4.0))));
    }

    #[test]
    fn test_cycle_is_rejected_and_graph_unchanged() {
        let mut script = script();
        let first = script.add_node_of_kind("sum").unwrap();
        let second = script.add_node_of_kind("sum").unwrap();
        let third = script.add_node_of_kind("sum").unwrap();
        script.connect(first, output(&script, first), second, input(&script, second, 0)).unwrap();
        script.connect(second, output(&script, second), third, input(&script, third, 0)).unwrap();

        let result = script.connect(third, output(&script, third), first, input(&script, first, 0));
        assert!(matches!(result, Err(ConnectionError::WouldCreateCycle)));
        assert_eq!(script.connection_count(), 2);

        let self_loop = script.connect(first, output(&script, first), first, input(&script, first, 1));
        assert!(matches!(self_loop, Err(ConnectionError::SelfLoop)));
        assert!(script.tick().is_evaluated());
    }

    #[test]
    fn test_structural_errors_are_rejected() {
        let mut script = script();
        let a = constant(&mut script, json!(1));
        let b = constant(&mut script, json!(2));
        let not = script.add_node_of_kind("not").unwrap();
        let text = script.add_node_of_kind("static_text").unwrap();
        let sum = script.add_node_of_kind("sum").unwrap();
        let target = input(&script, sum, 0);

        script.connect(a, output(&script, a), sum, target).unwrap();
        assert!(matches!(
            script.connect(b, output(&script, b), sum, target),
            Err(ConnectionError::PinAlreadyConnected(_))
        ));
        let err = script
            .connect(text, output(&script, text), not, input(&script, not, 0))
            .unwrap_err();
        assert!(matches!(
            &err,
            ConnectionError::IncompatibleTypes { source_type, target_type }
                if source_type == "Text" && target_type == "Bool"
        ));
        assert_eq!(err.to_string(), "Incompatible pin types: Text cannot flow into Bool");
        assert!(std::error::Error::source(&err).is_none());
        assert!(matches!(
            script.connect(sum, target, a, output(&script, a)),
            Err(ConnectionError::DirectionMismatch)
        ));
        assert!(matches!(
            script.connect(a, PinId(99), sum, input(&script, sum, 1)),
            Err(ConnectionError::PinNotFound(_))
        ));
        assert_eq!(script.connection_count(), 1);
    }

    #[test]
    fn test_remove_node_drops_connections_and_leaves_order() {
        let mut script = script();
        let exit = script.exit_node().unwrap();
        let a = constant(&mut script, json!(3));
        script.connect(a, output(&script, a), exit, input(&script, exit, 0)).unwrap();
        assert!(script.tick().is_evaluated());
        assert_eq!(script.result(), Some(&Value::from(3)));

        let removed = script.remove_node(a).unwrap();
        assert_eq!(removed.state(), crate::node::NodeState::Disposed);
        assert_eq!(script.connection_count(), 0);
        assert!(!script.execution_order().unwrap().contains(&a));
        assert!(matches!(script.remove_node(exit), Err(ScriptError::ExitNodeRemoval)));
        assert!(matches!(script.remove_node(a), Err(ScriptError::NodeNotFound(_))));

        match script.tick() {
            TickOutcome::Evaluated(report) => assert_eq!(report.evaluated, 1),
            TickOutcome::Skipped(reason) => panic!("pass skipped: {reason:?}"),
        }
    }

    #[test]
    fn test_failed_node_does_not_stop_the_pass() {
        let mut script = script();
        let exit = script.exit_node().unwrap();
        let divide = script.add_node_of_kind("divide").unwrap();
        let sum = script.add_node_of_kind("sum").unwrap();
        let one = constant(&mut script, json!(1));
        script.connect(divide, output(&script, divide), sum, input(&script, sum, 0)).unwrap();
        script.connect(one, output(&script, one), sum, input(&script, sum, 1)).unwrap();
        script.connect(sum, output(&script, sum), exit, input(&script, exit, 0)).unwrap();

        let TickOutcome::Evaluated(report) = script.tick() else {
            panic!("pass skipped");
        };
        assert_eq!(report.evaluated, 4);
        assert_eq!(report.failed.len(), 1);
        assert!(script.node(divide).unwrap().broken().is_some());
        assert_eq!(script.result(), Some(&Value::from(1)));
    }

    #[test]
    fn test_collection_pin_removal_drops_its_connection() {
        let mut script = script();
        let a = constant(&mut script, json!(5));
        let sum = script.add_node_of_kind("sum").unwrap();
        let collection = CollectionId(0);
        let pin = script.add_collection_pin(sum, collection).unwrap();
        script.connect(a, output(&script, a), sum, pin).unwrap();

        let dropped = script.remove_collection_pin(sum, collection, pin).unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(script.connection_count(), 0);
        assert!(matches!(
            script.add_collection_pin(a, collection),
            Err(ScriptError::Pin(PinError::CollectionNotFound(_)))
        ));
    }

    #[test]
    fn test_revalidation_reshapes_and_drops_connection() {
        let model = Arc::new(MemoryDataModel::new());
        let level = DataModelPath::parse("Audio.Level").unwrap();
        model.insert(&level, ValueType::Integer, Value::from(2)).unwrap();

        let mut script = NodeScript::new("reactive", Arc::new(create_default_registry()));
        script.initialize(ScriptContext::with_resolver(model.clone())).unwrap();
        let source = script.add_node_of_kind("data_model_value").unwrap();
        script.update_storage(source, json!({ "path": "Audio.Level" })).unwrap();
        let text = script.add_node_of_kind("to_text").unwrap();
        let sum = script.add_node_of_kind("sum").unwrap();
        script.connect(source, PinId(0), sum, input(&script, sum, 0)).unwrap();
        script.connect(source, PinId(0), text, input(&script, text, 0)).unwrap();
        assert!(script.tick().is_evaluated());

        model.insert(&level, ValueType::Bool, Value::Bool(true)).unwrap();
        assert!(script.tick().is_evaluated());

        let pins = script.node(source).unwrap().pins();
        assert_eq!(pins.outputs().count(), 1);
        assert_eq!(pins.pin(PinId(0)).unwrap().value_type(), Some(&ValueType::Bool));
        // Both connections referenced the replaced pin
        assert_eq!(script.connection_count(), 0);
        assert_eq!(script.node(source).unwrap().pins().value(PinId(0)), &Value::Bool(true));
    }

    #[test]
    fn test_removed_node_cannot_rejoin() {
        let model = Arc::new(MemoryDataModel::new());
        let level = DataModelPath::parse("Audio.Level").unwrap();
        model.insert(&level, ValueType::Numeric, Value::from(0.5)).unwrap();

        let mut script = NodeScript::new("rejoin", Arc::new(create_default_registry()));
        script.initialize(ScriptContext::with_resolver(model.clone())).unwrap();
        let source = script.add_node_of_kind("data_model_value").unwrap();
        script.update_storage(source, json!({ "path": "Audio.Level" })).unwrap();
        assert_eq!(model.subscription_count(), 1);

        let removed = script.remove_node(source).unwrap();
        assert_eq!(model.subscription_count(), 0);
        assert!(matches!(
            script.add_node(removed),
            Err(ScriptError::NodeDisposed(id)) if id == source
        ));
        assert_eq!(script.node_count(), 0);

        match script.tick() {
            TickOutcome::Evaluated(report) => assert_eq!(report.evaluated, 0),
            TickOutcome::Skipped(reason) => panic!("pass skipped: {reason:?}"),
        }
    }

    #[test]
    fn test_lifecycle() {
        let registry = Arc::new(create_default_registry());
        let mut script = NodeScript::new("lifecycle", registry);
        assert!(matches!(script.tick(), TickOutcome::Skipped(SkipReason::NotLoaded)));

        script.initialize(ScriptContext::new()).unwrap();
        assert_eq!(script.state(), ScriptState::Loaded);
        assert!(matches!(
            script.initialize(ScriptContext::new()),
            Err(ScriptError::AlreadyInitialized)
        ));
        assert!(script.tick().is_evaluated());
        assert_eq!(script.state(), ScriptState::Running);

        let node = script.add_node_of_kind("static_numeric").unwrap();
        script.update_storage(node, json!(7)).unwrap();
        script.tick();
        let out = output(&script, node);
        assert_eq!(script.node(node).unwrap().pins().value(out), &Value::from(7));
        script.reset();
        assert_eq!(script.node(node).unwrap().pins().value(out), &Value::from(0));

        script.dispose();
        script.dispose();
        assert_eq!(script.state(), ScriptState::Disposed);
        assert!(matches!(script.tick(), TickOutcome::Skipped(SkipReason::Disposed)));
        assert!(matches!(script.add_node_of_kind("not"), Err(ScriptError::Disposed)));
    }
}
