// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-frame execution of a script.
//!
//! An [`ExecutionPlan`] is computed from the topology and cached by the
//! script until the next structural change. [`run_pass`] walks the plan once:
//! copy upstream values into each node's inputs, then evaluate the node.

use crate::connection::{Connection, ConnectionId, PinAddress};
use crate::node::{Node, NodeId, NodeState};
use crate::pin::PinId;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};

/// Evaluation order and input wiring for one topology
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    order: Vec<NodeId>,
    /// Destination input pin -> source output pin
    incoming: HashMap<PinAddress, PinAddress>,
}

impl ExecutionPlan {
    /// Build a plan, failing if the connections contain a cycle.
    ///
    /// Kahn's algorithm; among nodes that are ready at the same time the one
    /// added to the script first runs first, so the order is stable for a
    /// given topology.
    pub fn build(
        nodes: &IndexMap<NodeId, Node>,
        connections: &IndexMap<ConnectionId, Connection>,
    ) -> Result<Self, CycleError> {
        let mut in_degree: Vec<usize> = vec![0; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut incoming = HashMap::with_capacity(connections.len());

        for connection in connections.values() {
            let (Some(from), Some(to)) = (
                nodes.get_index_of(&connection.from_node),
                nodes.get_index_of(&connection.to_node),
            ) else {
                continue;
            };
            dependents[from].push(to);
            in_degree[to] += 1;
            incoming.insert(connection.target(), connection.source());
        }

        let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|i| in_degree[*i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != nodes.len() {
            return Err(CycleError);
        }

        let order = order
            .into_iter()
            .filter_map(|i| nodes.get_index(i).map(|(id, _)| *id))
            .collect();
        Ok(Self { order, incoming })
    }

    /// Nodes in evaluation order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// The output pin feeding an input pin, if connected
    pub fn source_of(&self, node_id: NodeId, pin_id: PinId) -> Option<PinAddress> {
        self.incoming.get(&PinAddress::new(node_id, pin_id)).copied()
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Number of nodes evaluated
    pub evaluated: usize,
    /// Nodes whose evaluation failed, with the failure
    pub failed: Vec<(NodeId, String)>,
}

impl PassReport {
    /// Whether every node evaluated cleanly
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Evaluate every node once, in plan order.
///
/// A failing node keeps default outputs and the pass continues, so nodes
/// downstream of it run with default input. Nodes that are not initialized
/// are skipped.
pub fn run_pass(nodes: &mut IndexMap<NodeId, Node>, plan: &ExecutionPlan) -> PassReport {
    let mut report = PassReport::default();

    for &node_id in plan.order() {
        let Some(node) = nodes.get(&node_id) else {
            continue;
        };
        if node.state() != NodeState::Initialized {
            continue;
        }
        let inputs: Vec<(PinId, Value)> = node
            .pins()
            .inputs()
            .filter_map(|pin| {
                let source = plan.source_of(node_id, pin.id())?;
                let value = nodes.get(&source.node)?.pins().pin(source.pin)?.value().clone();
                Some((pin.id(), value))
            })
            .collect();

        let Some(node) = nodes.get_mut(&node_id) else {
            continue;
        };
        for (pin_id, value) in inputs {
            node.pins_mut().set_value(pin_id, value);
        }

        report.evaluated += 1;
        if let Err(err) = node.evaluate() {
            tracing::warn!("Node '{}' ({}) failed to evaluate: {err}", node.name, node_id);
            report.failed.push((node_id, err.to_string()));
        }
    }

    tracing::trace!("Evaluated {} nodes", report.evaluated);
    report
}

/// Error raised by a node's evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Malformed format string or argument reference
    #[error("Invalid format string: {0}")]
    Format(String),

    /// Type mismatch
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Found type name
        found: String,
    },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Error when the connections contain a cycle
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::create_default_registry;

    fn nodes(count: usize) -> IndexMap<NodeId, Node> {
        let registry = create_default_registry();
        (0..count)
            .map(|_| {
                let node = registry.create_node("sum").unwrap();
                (node.id(), node)
            })
            .collect()
    }

    fn connect(
        connections: &mut IndexMap<ConnectionId, Connection>,
        nodes: &IndexMap<NodeId, Node>,
        from: usize,
        to: usize,
        pin: u32,
    ) {
        let (from, _) = nodes.get_index(from).unwrap();
        let (to, _) = nodes.get_index(to).unwrap();
        let connection = Connection::new(*from, PinId(2), *to, PinId(pin));
        connections.insert(connection.id, connection);
    }

    #[test]
    fn test_independent_nodes_keep_insertion_order() {
        let nodes = nodes(4);
        let plan = ExecutionPlan::build(&nodes, &IndexMap::new()).unwrap();
        let expected: Vec<NodeId> = nodes.keys().copied().collect();
        assert_eq!(plan.order(), expected.as_slice());
    }

    #[test]
    fn test_order_is_stable_across_builds() {
        let nodes = nodes(5);
        let mut connections = IndexMap::new();
        connect(&mut connections, &nodes, 4, 0, 0);
        connect(&mut connections, &nodes, 3, 0, 1);
        connect(&mut connections, &nodes, 0, 2, 0);

        let first = ExecutionPlan::build(&nodes, &connections).unwrap();
        let second = ExecutionPlan::build(&nodes, &connections).unwrap();
        assert_eq!(first.order(), second.order());

        let position = |index: usize| {
            let id = nodes.get_index(index).unwrap().0;
            first.order().iter().position(|n| n == id).unwrap()
        };
        assert!(position(4) < position(0));
        assert!(position(3) < position(0));
        assert!(position(0) < position(2));
        let (target, _) = nodes.get_index(0).unwrap();
        assert!(first.source_of(*target, PinId(1)).is_some());
    }

    #[test]
    fn test_pass_skips_nodes_that_are_not_initialized() {
        let mut nodes = nodes(2);
        let plan = ExecutionPlan::build(&nodes, &IndexMap::new()).unwrap();
        if let Some((_, node)) = nodes.get_index_mut(0) {
            node.dispose();
        }

        let report = run_pass(&mut nodes, &plan);
        assert_eq!(report.evaluated, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_cycle_is_reported() {
        let nodes = nodes(2);
        let mut connections = IndexMap::new();
        connect(&mut connections, &nodes, 0, 1, 0);
        connect(&mut connections, &nodes, 1, 0, 0);
        assert!(ExecutionPlan::build(&nodes, &connections).is_err());
    }
}
