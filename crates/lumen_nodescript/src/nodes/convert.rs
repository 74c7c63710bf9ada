// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conversion nodes. Conversions default instead of failing.

use crate::evaluation::EvaluationError;
use crate::node::NodeBehavior;
use crate::pin::{PinId, PinSet};
use crate::value::{Numeric, Value, ValueType};

/// Convert any value to a number: booleans become 1 or 0, text is parsed,
/// everything else (and unparsable text) becomes 0
pub fn to_numeric_value(value: &Value) -> Numeric {
    match value {
        Value::Numeric(n) => *n,
        Value::Bool(true) => Numeric::ONE,
        Value::Text(text) => Numeric::parse(text).unwrap_or_default(),
        Value::Bool(false) | Value::Null | Value::Record(_) => Numeric::ZERO,
    }
}

/// Converts its input to a number
pub struct ToNumericNode {
    input: PinId,
    output: PinId,
}

impl NodeBehavior for ToNumericNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let result = to_numeric_value(pins.value(self.input));
        pins.set_value(self.output, result);
        Ok(())
    }
}

/// Construct a convert-to-numeric node
pub fn to_numeric(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let input = pins.create_input(ValueType::Any, "Input");
    let output = pins.create_output(ValueType::Numeric, "Result");
    Box::new(ToNumericNode { input, output })
}

/// Converts its input to text
pub struct ToTextNode {
    input: PinId,
    output: PinId,
}

impl NodeBehavior for ToTextNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let result = pins.value(self.input).to_string();
        pins.set_value(self.output, result);
        Ok(())
    }
}

/// Construct a convert-to-text node
pub fn to_text(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let input = pins.create_input(ValueType::Any, "Input");
    let output = pins.create_output(ValueType::Text, "Result");
    Box::new(ToTextNode { input, output })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_numeric_value() {
        assert_eq!(to_numeric_value(&Value::Bool(true)), Numeric::ONE);
        assert_eq!(to_numeric_value(&Value::Bool(false)), Numeric::ZERO);
        assert_eq!(to_numeric_value(&Value::from(" 42 ")), Numeric::Integer(42));
        assert_eq!(to_numeric_value(&Value::from("0.25")), Numeric::from(0.25));
        assert_eq!(to_numeric_value(&Value::from("bright")), Numeric::ZERO);
        assert_eq!(to_numeric_value(&Value::Null), Numeric::ZERO);
    }

    #[test]
    fn test_to_text_node() {
        let mut pins = PinSet::new();
        let mut node = to_text(&mut pins);
        pins.set_value(PinId(0), 1.5);
        node.evaluate(&mut pins).unwrap();
        assert_eq!(pins.value(PinId(1)).as_text(), Some("1.5"));
    }
}
