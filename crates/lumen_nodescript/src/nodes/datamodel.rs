// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes bound to a data model path.
//!
//! Their output pins are typed after whatever the bound path resolves to,
//! so the pins only exist once the path resolved at least once. Pin ids are
//! reserved at construction so persisted connections find them again after
//! the pins are materialized during initialization.

use crate::datamodel::{DataModelPath, PathBinding};
use crate::evaluation::EvaluationError;
use crate::node::{NodeBehavior, NodeContext};
use crate::pin::{PinDirection, PinId, PinSet};
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Persisted configuration of data model nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataModelStorage {
    /// The bound path, if any
    pub path: Option<DataModelPath>,
}

/// A path binding plus the type the node's pins were materialized with
#[derive(Debug, Default)]
struct BoundPath {
    storage: DataModelStorage,
    binding: Option<PathBinding>,
    value_type: Option<ValueType>,
}

impl BoundPath {
    fn bind(&mut self, ctx: &NodeContext<'_>) {
        self.unbind();
        let Some(path) = self.storage.path.clone() else {
            return;
        };
        self.binding = PathBinding::bind(path, ctx.script, ctx.notifier.clone());
        if self.binding.is_none() {
            tracing::debug!("Node {} has no path resolver to bind against", ctx.node_id);
        }
    }

    fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.unbind();
        }
    }

    /// The resolved type, when the path is valid and its type differs from
    /// the materialized one
    fn retyped(&self) -> Option<ValueType> {
        let resolution = self.binding.as_ref()?.resolve();
        if !resolution.is_valid {
            return None;
        }
        resolution
            .runtime_type
            .filter(|ty| self.value_type.as_ref() != Some(ty))
    }

    /// The current value, only when it still has the materialized type
    fn read(&self) -> Option<Value> {
        let resolution = self.binding.as_ref()?.resolve();
        (resolution.is_valid && resolution.runtime_type == self.value_type)
            .then_some(resolution.current_value)
    }

    fn leaf_name(&self) -> Option<&str> {
        self.storage
            .path
            .as_ref()
            .and_then(|path| path.segments().last())
            .map(String::as_str)
    }

    fn storage(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.storage).ok()
    }

    fn load_storage(&mut self, storage: serde_json::Value) -> Result<(), serde_json::Error> {
        self.storage = serde_json::from_value(storage)?;
        Ok(())
    }
}

/// Outputs the current value at a data model path
pub struct DataModelValueNode {
    path: BoundPath,
    output: PinId,
}

impl DataModelValueNode {
    fn reshape(&mut self, pins: &mut PinSet) {
        let Some(value_type) = self.path.retyped() else {
            return;
        };
        let name = self.path.leaf_name().unwrap_or("Value").to_string();
        pins.materialize(self.output, PinDirection::Output, Some(value_type.clone()), name);
        self.path.value_type = Some(value_type);
    }
}

impl NodeBehavior for DataModelValueNode {
    fn initialize(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        self.path.bind(ctx);
        self.reshape(pins);
    }

    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        if let Some(value_type) = &self.path.value_type {
            let value = self.path.read().unwrap_or_else(|| value_type.default_value());
            pins.set_value(self.output, value);
        }
        Ok(())
    }

    fn revalidate(&mut self, pins: &mut PinSet, _ctx: &NodeContext<'_>) {
        self.reshape(pins);
    }

    fn reconfigure(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        self.path.bind(ctx);
        if self.path.storage.path.is_none() {
            pins.remove_pin(self.output);
            self.path.value_type = None;
        }
        self.reshape(pins);
    }

    fn dispose(&mut self) {
        self.path.unbind();
    }

    fn storage(&self) -> Option<serde_json::Value> {
        self.path.storage()
    }

    fn load_storage(&mut self, storage: serde_json::Value) -> Result<(), serde_json::Error> {
        self.path.load_storage(storage)
    }
}

/// Construct a data model value node
pub fn data_model_value(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let output = pins.reserve_id();
    Box::new(DataModelValueNode {
        path: BoundPath::default(),
        output,
    })
}

/// Reports the previous and new value at a path whenever it changes
pub struct DataModelValueChangedNode {
    path: BoundPath,
    old_value: PinId,
    new_value: PinId,
    trigger_count: PinId,
    last: Option<Value>,
    previous: Value,
    count: i64,
}

impl DataModelValueChangedNode {
    fn reshape(&mut self, pins: &mut PinSet) {
        let Some(value_type) = self.path.retyped() else {
            return;
        };
        pins.materialize(self.old_value, PinDirection::Output, Some(value_type.clone()), "Old Value");
        pins.materialize(self.new_value, PinDirection::Output, Some(value_type.clone()), "New Value");
        self.last = None;
        self.previous = value_type.default_value();
        self.path.value_type = Some(value_type);
    }
}

impl NodeBehavior for DataModelValueChangedNode {
    fn initialize(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        self.path.bind(ctx);
        self.reshape(pins);
    }

    fn evaluate(&mut self, pins: &mut PinSet) -> Result<(), EvaluationError> {
        let Some(value_type) = self.path.value_type.clone() else {
            pins.set_value(self.trigger_count, self.count);
            return Ok(());
        };

        if let Some(current) = self.path.read() {
            if let Some(last) = self.last.take().filter(|last| *last != current) {
                self.previous = last;
                self.count = self.count.saturating_add(1);
            }
            self.last = Some(current);
        }

        let new_value = self.last.clone().unwrap_or_else(|| value_type.default_value());
        pins.set_value(self.old_value, self.previous.clone());
        pins.set_value(self.new_value, new_value);
        pins.set_value(self.trigger_count, self.count);
        Ok(())
    }

    fn revalidate(&mut self, pins: &mut PinSet, _ctx: &NodeContext<'_>) {
        self.reshape(pins);
    }

    fn reconfigure(&mut self, pins: &mut PinSet, ctx: &NodeContext<'_>) {
        self.path.bind(ctx);
        if self.path.storage.path.is_none() {
            pins.remove_pin(self.old_value);
            pins.remove_pin(self.new_value);
            self.path.value_type = None;
        }
        self.reset();
        self.reshape(pins);
    }

    fn dispose(&mut self) {
        self.path.unbind();
    }

    fn reset(&mut self) {
        self.last = None;
        self.previous = self
            .path
            .value_type
            .as_ref()
            .map(ValueType::default_value)
            .unwrap_or_default();
        self.count = 0;
    }

    fn storage(&self) -> Option<serde_json::Value> {
        self.path.storage()
    }

    fn load_storage(&mut self, storage: serde_json::Value) -> Result<(), serde_json::Error> {
        self.path.load_storage(storage)
    }
}

/// Construct a data model value-changed node
pub fn data_model_value_changed(pins: &mut PinSet) -> Box<dyn NodeBehavior> {
    let old_value = pins.reserve_id();
    let new_value = pins.reserve_id();
    let trigger_count = pins.create_output(ValueType::Numeric, "Trigger Count");
    Box::new(DataModelValueChangedNode {
        path: BoundPath::default(),
        old_value,
        new_value,
        trigger_count,
        last: None,
        previous: Value::Null,
        count: 0,
    })
}
