// SPDX-License-Identifier: MIT OR Apache-2.0
//! The exit node: whatever flows into its single input is the script result.

use crate::evaluation::EvaluationError;
use crate::node::{Node, NodeBehavior};
use crate::pin::PinSet;
use crate::value::ValueType;

/// Kind persisted for exit nodes
pub const EXIT_NODE_KIND: &str = "exit";

/// Holds the script result; evaluation is a no-op since the input already
/// carries the value
pub struct ExitNode;

impl NodeBehavior for ExitNode {
    fn evaluate(&mut self, _pins: &mut PinSet) -> Result<(), EvaluationError> {
        Ok(())
    }
}

/// Create an exit node whose input accepts `result_type`
pub fn create_exit_node(result_type: ValueType) -> Node {
    let mut pins = PinSet::new();
    pins.create_input(result_type, "Result");
    let mut node = Node::new(EXIT_NODE_KIND, "Exit", pins, Box::new(ExitNode));
    node.description = "Script result".to_string();
    node
}
