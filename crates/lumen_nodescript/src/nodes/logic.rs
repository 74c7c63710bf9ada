// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boolean algebra nodes.

use crate::evaluation::EvaluationError;
use crate::node::NodeBehavior;
use crate::pin::{CollectionId, PinDirection, PinId, PinSet};
use crate::value::ValueType;

#[derive(Debug, Clone, Copy)]
enum BoolOp {
    And,
    Or,
    Xor,
}

/// Folds a boolean pin collection into one result
pub struct BoolFoldNode {
    op: BoolOp,
    inputs: CollectionId,
    output: PinId,
}

impl NodeBehavior for BoolFoldNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let values: Vec<bool> = pins
            .collection_values(self.inputs)
            .map(|v| v.as_bool().unwrap_or(false))
            .collect();
        let result = match self.op {
            BoolOp::And => values.iter().all(|b| *b),
            BoolOp::Or => values.iter().any(|b| *b),
            BoolOp::Xor => values.iter().filter(|b| **b).count() == 1,
        };
        pins.set_value(self.output, result);
        Ok(())
    }
}

fn bool_fold(pins: &mut PinSet, op: BoolOp) -> Box<dyn NodeBehavior> {
    let inputs = pins.create_collection(PinDirection::Input, Some(ValueType::Bool), "Input", 0, 2);
    let output = pins.create_output(ValueType::Bool, "Result");
    Box::new(BoolFoldNode { op, inputs, output })
}

/// Construct an AND node: true when every input is true
pub fn and(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    bool_fold(pins, BoolOp::And)
}

/// Construct an OR node: true when any input is true
pub fn or(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    bool_fold(pins, BoolOp::Or)
}

/// Construct an XOR node: true when exactly one input is true
pub fn xor(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    bool_fold(pins, BoolOp::Xor)
}

/// Negates its input
pub struct NotNode {
    input: PinId,
    output: PinId,
}

impl NodeBehavior for NotNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let value = !pins.bool_value(self.input);
        pins.set_value(self.output, value);
        Ok(())
    }
}

/// Construct a NOT node
pub fn not(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let input = pins.create_input(ValueType::Bool, "Input");
    let output = pins.create_output(ValueType::Bool, "Result");
    Box::new(NotNode { input, output })
}
