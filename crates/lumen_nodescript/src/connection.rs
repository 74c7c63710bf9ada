// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the script graph.

use crate::node::NodeId;
use crate::pin::PinId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A pin addressed across the whole script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinAddress {
    /// Owning node
    pub node: NodeId,
    /// Pin within the node
    pub pin: PinId,
}

impl PinAddress {
    /// Create a pin address
    pub fn new(node: NodeId, pin: PinId) -> Self {
        Self { node, pin }
    }
}

/// A connection from an output pin to an input pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source (output) pin ID
    pub from_pin: PinId,
    /// Target node ID
    pub to_node: NodeId,
    /// Target (input) pin ID
    pub to_pin: PinId,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: NodeId, from_pin: PinId, to_node: NodeId, to_pin: PinId) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            from_pin,
            to_node,
            to_pin,
        }
    }

    /// The source pin
    pub fn source(&self) -> PinAddress {
        PinAddress::new(self.from_node, self.from_pin)
    }

    /// The target pin
    pub fn target(&self) -> PinAddress {
        PinAddress::new(self.to_node, self.to_pin)
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this connection involves a specific pin
    pub fn involves_pin(&self, address: PinAddress) -> bool {
        self.source() == address || self.target() == address
    }
}
