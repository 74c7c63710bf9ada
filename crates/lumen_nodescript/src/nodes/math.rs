// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic nodes over the numeric family.

use crate::evaluation::EvaluationError;
use crate::node::NodeBehavior;
use crate::pin::{CollectionId, PinDirection, PinId, PinSet};
use crate::value::{Numeric, Value, ValueType};

#[derive(Debug, Clone, Copy)]
enum FoldOp {
    Sum,
    Product,
}

/// Folds a numeric pin collection into one result
pub struct NumericFoldNode {
    op: FoldOp,
    inputs: CollectionId,
    output: PinId,
}

impl NodeBehavior for NumericFoldNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let values = pins.collection_values(self.inputs).filter_map(Value::as_numeric);
        let result: Numeric = match self.op {
            FoldOp::Sum => values.sum(),
            FoldOp::Product => values.product(),
        };
        pins.set_value(self.output, result);
        Ok(())
    }
}

fn numeric_fold(pins: &mut PinSet, op: FoldOp) -> Box<dyn NodeBehavior> {
    let inputs = pins.create_collection(PinDirection::Input, Some(ValueType::Numeric), "Input", 0, 2);
    let output = pins.create_output(ValueType::Numeric, "Result");
    Box::new(NumericFoldNode { op, inputs, output })
}

/// Construct a sum node
pub fn sum(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    numeric_fold(pins, FoldOp::Sum)
}

/// Construct a multiply node
pub fn multiply(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    numeric_fold(pins, FoldOp::Product)
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Subtract,
    Divide,
}

/// `A - B` or `A / B`
pub struct BinaryMathNode {
    op: BinaryOp,
    a: PinId,
    b: PinId,
    output: PinId,
}

impl NodeBehavior for BinaryMathNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let a = pins.numeric_value(self.a);
        let b = pins.numeric_value(self.b);
        let result = match self.op {
            BinaryOp::Subtract => a - b,
            BinaryOp::Divide => a.checked_div(b).ok_or(EvaluationError::DivisionByZero)?,
        };
        pins.set_value(self.output, result);
        Ok(())
    }
}

fn binary(pins: &mut PinSet, op: BinaryOp) -> Box<dyn NodeBehavior> {
    let a = pins.create_input(ValueType::Numeric, "A");
    let b = pins.create_input(ValueType::Numeric, "B");
    let output = pins.create_output(ValueType::Numeric, "Result");
    Box::new(BinaryMathNode { op, a, b, output })
}

/// Construct a subtract node
pub fn subtract(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    binary(pins, BinaryOp::Subtract)
}

/// Construct a divide node
pub fn divide(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    binary(pins, BinaryOp::Divide)
}

/// Restricts a value to `[Min, Max]`
pub struct ClampNode {
    value: PinId,
    min: PinId,
    max: PinId,
    output: PinId,
}

impl NodeBehavior for ClampNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let value = pins.numeric_value(self.value);
        let result = value.clamp(pins.numeric_value(self.min), pins.numeric_value(self.max));
        pins.set_value(self.output, result);
        Ok(())
    }
}

/// Construct a clamp node
pub fn clamp(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let value = pins.create_input(ValueType::Numeric, "Value");
    let min = pins.create_input_with_default(ValueType::Numeric, "Min", Value::from(0));
    let max = pins.create_input_with_default(ValueType::Numeric, "Max", Value::from(1));
    let output = pins.create_output(ValueType::Numeric, "Result");
    Box::new(ClampNode {
        value,
        min,
        max,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(constructor: fn(&mut PinSet) -> Box<dyn NodeBehavior>, values: &[Value]) -> Numeric {
        let mut pins = PinSet::new();
        let mut node = constructor(&mut pins);
        let collection = CollectionId(0);
        let members = pins.collection(collection).unwrap().members().to_vec();
        for pin in members {
            pins.remove_collection_pin(collection, pin).unwrap();
        }
        for value in values {
            let pin = pins.add_collection_pin(collection).unwrap();
            pins.set_value(pin, value.clone());
        }
        node.evaluate(&mut pins).unwrap();
        let output = pins.outputs().next().unwrap().id();
        pins.numeric_value(output)
    }

    #[test]
    fn test_sum() {
        let values = [Value::from(1), Value::from(2), Value::from(3)];
        assert_eq!(fold(sum, &values), Numeric::Integer(6));
        assert_eq!(fold(sum, &[]), Numeric::ZERO);
        assert_eq!(fold(sum, &[Value::from(1), Value::from(0.5)]), Numeric::from(1.5));
    }

    #[test]
    fn test_product_of_empty_is_one() {
        assert_eq!(fold(multiply, &[]), Numeric::ONE);
        assert_eq!(fold(multiply, &[Value::from(4), Value::from(2.5)]), Numeric::from(10.0));
    }

    #[test]
    fn test_divide_by_zero_is_an_error() {
        let mut pins = PinSet::new();
        let mut node = divide(&mut pins);
        pins.set_value(PinId(0), 5);
        assert!(matches!(node.evaluate(&mut pins), Err(EvaluationError::DivisionByZero)));

        pins.set_value(PinId(1), 2);
        node.evaluate(&mut pins).unwrap();
        assert_eq!(pins.numeric_value(PinId(2)), Numeric::from(2.5));
    }

    #[test]
    fn test_subtract_saturates_integers() {
        let mut pins = PinSet::new();
        let mut node = subtract(&mut pins);
        pins.set_value(PinId(0), i64::MIN);
        pins.set_value(PinId(1), 1);
        node.evaluate(&mut pins).unwrap();
        assert_eq!(pins.numeric_value(PinId(2)), Numeric::Integer(i64::MIN));
    }

    #[test]
    fn test_clamp_uses_defaults() {
        let mut pins = PinSet::new();
        let mut node = clamp(&mut pins);
        pins.set_value(PinId(0), 7);
        node.evaluate(&mut pins).unwrap();
        assert_eq!(pins.numeric_value(PinId(3)), Numeric::ONE);
    }
}
