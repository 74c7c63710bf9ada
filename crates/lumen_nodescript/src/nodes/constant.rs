// SPDX-License-Identifier: MIT OR Apache-2.0
//! Static value nodes. The literal is the node's storage.

use crate::evaluation::EvaluationError;
use crate::node::NodeBehavior;
use crate::pin::{PinId, PinSet};
use crate::value::{Numeric, Value, ValueType};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Outputs a literal stored with the node
pub struct StaticValueNode<T> {
    output: PinId,
    value: T,
}

impl<T> NodeBehavior for StaticValueNode<T>
where
    T: Clone + Into<Value> + Serialize + DeserializeOwned + Send,
{
    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        pins.set_value(self.output, self.value.clone());
        Ok(())
    }

    fn storage(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.value).ok()
    }

    fn load_storage(&mut self, storage: serde_json::Value) -> Result<(), serde_json::Error> {
        self.value = serde_json::from_value(storage)?;
        Ok(())
    }
}

/// Construct a static numeric node
pub fn static_numeric(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let output = pins.create_output(ValueType::Numeric, "Output");
    Box::new(StaticValueNode {
        output,
        value: Numeric::ZERO,
    })
}

/// Construct a static boolean node
pub fn static_boolean(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let output = pins.create_output(ValueType::Bool, "Output");
    Box::new(StaticValueNode { output, value: false })
}

/// Construct a static text node
pub fn static_text(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let output = pins.create_output(ValueType::Text, "Output");
    Box::new(StaticValueNode {
        output,
        value: String::new(),
    })
}
