// SPDX-License-Identifier: MIT OR Apache-2.0
//! The built-in node catalog.

pub mod compare;
pub mod constant;
pub mod convert;
pub mod datamodel;
pub mod exit;
pub mod logic;
pub mod math;
pub mod text;

use crate::node::{NodeCategory, NodeRegistry, NodeType};

/// Create a registry holding every built-in node kind
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Static Values
    // ========================================================================

    registry.register(NodeType {
        id: "static_numeric".to_string(),
        name: "Numeric".to_string(),
        category: NodeCategory::Input,
        description: "Outputs a configurable number".to_string(),
        constructor: constant::static_numeric,
    });

    registry.register(NodeType {
        id: "static_boolean".to_string(),
        name: "Boolean".to_string(),
        category: NodeCategory::Input,
        description: "Outputs a configurable boolean".to_string(),
        constructor: constant::static_boolean,
    });

    registry.register(NodeType {
        id: "static_text".to_string(),
        name: "Text".to_string(),
        category: NodeCategory::Input,
        description: "Outputs a configurable text".to_string(),
        constructor: constant::static_text,
    });

    // ========================================================================
    // Logic
    // ========================================================================

    registry.register(NodeType {
        id: "and".to_string(),
        name: "And".to_string(),
        category: NodeCategory::Logic,
        description: "True when every input is true".to_string(),
        constructor: logic::and,
    });

    registry.register(NodeType {
        id: "or".to_string(),
        name: "Or".to_string(),
        category: NodeCategory::Logic,
        description: "True when any input is true".to_string(),
        constructor: logic::or,
    });

    registry.register(NodeType {
        id: "xor".to_string(),
        name: "Exclusive Or".to_string(),
        category: NodeCategory::Logic,
        description: "True when exactly one input is true".to_string(),
        constructor: logic::xor,
    });

    registry.register(NodeType {
        id: "not".to_string(),
        name: "Not".to_string(),
        category: NodeCategory::Logic,
        description: "Inverts the input".to_string(),
        constructor: logic::not,
    });

    registry.register(NodeType {
        id: "equals".to_string(),
        name: "Equals".to_string(),
        category: NodeCategory::Logic,
        description: "True when A equals B".to_string(),
        constructor: compare::equals,
    });

    registry.register(NodeType {
        id: "greater_than".to_string(),
        name: "Greater Than".to_string(),
        category: NodeCategory::Logic,
        description: "True when A is greater than B".to_string(),
        constructor: compare::greater_than,
    });

    registry.register(NodeType {
        id: "less_than".to_string(),
        name: "Less Than".to_string(),
        category: NodeCategory::Logic,
        description: "True when A is less than B".to_string(),
        constructor: compare::less_than,
    });

    // ========================================================================
    // Math
    // ========================================================================

    registry.register(NodeType {
        id: "sum".to_string(),
        name: "Sum".to_string(),
        category: NodeCategory::Math,
        description: "Adds all inputs".to_string(),
        constructor: math::sum,
    });

    registry.register(NodeType {
        id: "multiply".to_string(),
        name: "Multiply".to_string(),
        category: NodeCategory::Math,
        description: "Multiplies all inputs".to_string(),
        constructor: math::multiply,
    });

    registry.register(NodeType {
        id: "subtract".to_string(),
        name: "Subtract".to_string(),
        category: NodeCategory::Math,
        description: "A - B".to_string(),
        constructor: math::subtract,
    });

    registry.register(NodeType {
        id: "divide".to_string(),
        name: "Divide".to_string(),
        category: NodeCategory::Math,
        description: "A / B".to_string(),
        constructor: math::divide,
    });

    registry.register(NodeType {
        id: "clamp".to_string(),
        name: "Clamp".to_string(),
        category: NodeCategory::Math,
        description: "Restricts a value to a range".to_string(),
        constructor: math::clamp,
    });

    // ========================================================================
    // Text & Conversion
    // ========================================================================

    registry.register(NodeType {
        id: "format".to_string(),
        name: "Format".to_string(),
        category: NodeCategory::Text,
        description: "Substitutes the arguments into a format string".to_string(),
        constructor: text::format,
    });

    registry.register(NodeType {
        id: "to_numeric".to_string(),
        name: "To Numeric".to_string(),
        category: NodeCategory::Conversion,
        description: "Converts the input to a number".to_string(),
        constructor: convert::to_numeric,
    });

    registry.register(NodeType {
        id: "to_text".to_string(),
        name: "To Text".to_string(),
        category: NodeCategory::Conversion,
        description: "Converts the input to text".to_string(),
        constructor: convert::to_text,
    });

    // ========================================================================
    // Data Model
    // ========================================================================

    registry.register(NodeType {
        id: "data_model_value".to_string(),
        name: "Data Model Value".to_string(),
        category: NodeCategory::DataModel,
        description: "Outputs the value at a data model path".to_string(),
        constructor: datamodel::data_model_value,
    });

    registry.register(NodeType {
        id: "data_model_value_changed".to_string(),
        name: "Data Model Value Changed".to_string(),
        category: NodeCategory::DataModel,
        description: "Outputs the previous and new value whenever a data model value changes"
            .to_string(),
        constructor: datamodel::data_model_value_changed,
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_kinds() {
        let registry = create_default_registry();
        assert_eq!(registry.types().count(), 20);
        assert_eq!(registry.types_in_category(NodeCategory::DataModel).count(), 2);
        assert!(registry.get(exit::EXIT_NODE_KIND).is_none());

        for node_type in registry.types() {
            let node = registry.create_node(&node_type.id).unwrap();
            assert_eq!(node.kind(), node_type.id);
        }
    }
}
