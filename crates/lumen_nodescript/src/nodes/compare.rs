// SPDX-License-Identifier: MIT OR Apache-2.0
//! Comparison nodes.
//!
//! Numbers compare by value whatever their representation; other values
//! fall back to [`Value::compare`]. Operands that cannot be ordered make the
//! comparison `false` instead of failing the node.

use crate::evaluation::EvaluationError;
use crate::node::NodeBehavior;
use crate::pin::{PinId, PinSet};
use crate::value::{Value, ValueType};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Equals,
    GreaterThan,
    LessThan,
}

impl Comparison {
    fn apply(self, a: &Value, b: &Value) -> bool {
        let ordering = match (a.as_numeric(), b.as_numeric()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => a.compare(b),
        };
        match (self, ordering) {
            (Self::Equals, Some(ordering)) => ordering == Ordering::Equal,
            // Records have no ordering but can still be equal
            (Self::Equals, None) => a == b,
            (Self::GreaterThan, ordering) => ordering == Some(Ordering::Greater),
            (Self::LessThan, ordering) => ordering == Some(Ordering::Less),
        }
    }
}

/// Compares input A against input B
pub struct CompareNode {
    comparison: Comparison,
    a: PinId,
    b: PinId,
    output: PinId,
}

impl NodeBehavior for CompareNode {
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let result = self.comparison.apply(pins.value(self.a), pins.value(self.b));
        pins.set_value(self.output, result);
        Ok(())
    }
}

fn compare(pins: &mut PinSet, comparison: Comparison) -> Box<dyn NodeBehavior> {
    let a = pins.create_input(ValueType::Any, "A");
    let b = pins.create_input(ValueType::Any, "B");
    let output = pins.create_output(ValueType::Bool, "Result");
    Box::new(CompareNode {
        comparison,
        a,
        b,
        output,
    })
}

/// Construct an equals node
pub fn equals(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    compare(pins, Comparison::Equals)
}

/// Construct a greater-than node
pub fn greater_than(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    compare(pins, Comparison::GreaterThan)
}

/// Construct a less-than node
pub fn less_than(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    compare(pins, Comparison::LessThan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{RecordType, RecordValue};

    fn run(
        constructor: fn(&mut PinSet) -> Box<dyn NodeBehavior>,
        a: impl Into<Value>,
        b: impl Into<Value>,
    ) -> bool {
        let mut pins = PinSet::new();
        let mut node = constructor(&mut pins);
        pins.set_value(PinId(0), a);
        pins.set_value(PinId(1), b);
        node.evaluate(&mut pins).unwrap();
        pins.bool_value(PinId(2))
    }

    #[test]
    fn test_numbers_compare_by_value_across_representations() {
        assert!(run(less_than, 3, 3.5));
        assert!(!run(greater_than, 3, 3.5));
        assert!(run(equals, 2, 2.0));
    }

    #[test]
    fn test_text_ordering() {
        assert!(run(less_than, "amber", "blue"));
        assert!(run(equals, "red", "red"));
    }

    #[test]
    fn test_incomparable_operands_are_false() {
        assert!(!run(less_than, "3", 4));
        assert!(!run(greater_than, true, 0));
        assert!(!run(equals, "1", 1));
    }

    #[test]
    fn test_records_are_only_equal() {
        let color = RecordType::new("Color");
        let red = RecordValue::new(color.clone()).with_field("r", 255);
        assert!(run(equals, red.clone(), red.clone()));
        assert!(!run(less_than, red.clone(), red));
    }
}
