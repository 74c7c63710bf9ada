// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.
//!
//! Pins are owned by a [`PinSet`] inside each node and addressed by ids that
//! are scoped to that node. Ids are handed out in creation order, so a node
//! constructed the same way always ends up with the same ids; that is what
//! lets persisted connections find their pins again after a reload.

use crate::value::{Numeric, Value, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

static NULL_VALUE: Value = Value::Null;

/// Identifier of a pin, unique within its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

/// Identifier of a pin collection, unique within its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub u32);

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinDirection {
    /// Input pin
    Input,
    /// Output pin
    Output,
}

/// A pin on a node
#[derive(Debug, Clone)]
pub struct Pin {
    id: PinId,
    name: String,
    direction: PinDirection,
    value_type: Option<ValueType>,
    default_value: Value,
    value: Value,
    collection: Option<CollectionId>,
}

impl Pin {
    /// Create a new pin holding the default value of its type
    pub fn new(
        id: PinId,
        name: impl Into<String>,
        direction: PinDirection,
        value_type: Option<ValueType>,
    ) -> Self {
        let default_value = value_type
            .as_ref()
            .map(ValueType::default_value)
            .unwrap_or_default();
        Self {
            id,
            name: name.into(),
            direction,
            value_type,
            value: default_value.clone(),
            default_value,
            collection: None,
        }
    }

    /// Set the default value; the current value is reset to it
    pub fn with_default(mut self, value: Value) -> Self {
        self.value = value.clone();
        self.default_value = value;
        self
    }

    /// Pin ID
    pub fn id(&self) -> PinId {
        self.id
    }

    /// Pin name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pin direction
    pub fn direction(&self) -> PinDirection {
        self.direction
    }

    /// Declared value type, `None` while unresolved
    pub fn value_type(&self) -> Option<&ValueType> {
        self.value_type.as_ref()
    }

    /// Latest value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replace the latest value; values the declared type does not admit
    /// are refused and `false` is returned
    pub fn set_value(&mut self, value: Value) -> bool {
        if self.value_type.as_ref().is_some_and(|ty| !ty.admits(&value)) {
            return false;
        }
        self.value = value;
        true
    }

    /// The collection this pin belongs to, if any
    pub fn collection(&self) -> Option<CollectionId> {
        self.collection
    }

    /// Whether this is an input pin
    pub fn is_input(&self) -> bool {
        self.direction == PinDirection::Input
    }

    /// Whether this is an output pin
    pub fn is_output(&self) -> bool {
        self.direction == PinDirection::Output
    }

    /// Restore the default value
    pub fn reset(&mut self) {
        self.value = self.default_value.clone();
    }
}

/// An ordered, homogeneously typed group of pins with a variable count
#[derive(Debug, Clone)]
pub struct PinCollection {
    id: CollectionId,
    name: String,
    direction: PinDirection,
    value_type: Option<ValueType>,
    min_count: usize,
    members: Vec<PinId>,
}

impl PinCollection {
    /// Collection ID
    pub fn id(&self) -> CollectionId {
        self.id
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direction of every member pin
    pub fn direction(&self) -> PinDirection {
        self.direction
    }

    /// Type of every member pin
    pub fn value_type(&self) -> Option<&ValueType> {
        self.value_type.as_ref()
    }

    /// Minimum number of member pins
    pub fn min_count(&self) -> usize {
        self.min_count
    }

    /// Member pin ids in order
    pub fn members(&self) -> &[PinId] {
        &self.members
    }

    /// Number of member pins
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the collection has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All pins and pin collections of one node
#[derive(Debug, Clone, Default)]
pub struct PinSet {
    pins: IndexMap<PinId, Pin>,
    collections: IndexMap<CollectionId, PinCollection>,
    next_pin: u32,
    next_collection: u32,
    /// Pins removed since the owning graph last reconciled
    removed: Vec<PinId>,
    shape_changed: bool,
}

impl PinSet {
    /// Create an empty pin set
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a pin that will be materialized later
    pub fn reserve_id(&mut self) -> PinId {
        let id = PinId(self.next_pin);
        self.next_pin = self.next_pin.saturating_add(1);
        id
    }

    /// Create a pin with a fresh id
    pub fn create_pin(
        &mut self,
        direction: PinDirection,
        value_type: Option<ValueType>,
        name: impl Into<String>,
    ) -> PinId {
        let id = self.reserve_id();
        self.insert_pin(Pin::new(id, name, direction, value_type));
        id
    }

    /// Create an input pin
    pub fn create_input(&mut self, value_type: ValueType, name: impl Into<String>) -> PinId {
        self.create_pin(PinDirection::Input, Some(value_type), name)
    }

    /// Create an output pin
    pub fn create_output(&mut self, value_type: ValueType, name: impl Into<String>) -> PinId {
        self.create_pin(PinDirection::Output, Some(value_type), name)
    }

    /// Create an input pin with an explicit default value
    pub fn create_input_with_default(
        &mut self,
        value_type: ValueType,
        name: impl Into<String>,
        default: Value,
    ) -> PinId {
        let id = self.reserve_id();
        self.insert_pin(Pin::new(id, name, PinDirection::Input, Some(value_type)).with_default(default));
        id
    }

    /// Materialize a pin under a previously reserved id.
    ///
    /// An existing pin with the same id is replaced and reported as removed,
    /// so connections attached to it are dropped on reconciliation even
    /// though a pin with that id exists again.
    pub fn materialize(
        &mut self,
        id: PinId,
        direction: PinDirection,
        value_type: Option<ValueType>,
        name: impl Into<String>,
    ) {
        if self.pins.contains_key(&id) {
            self.removed.push(id);
        }
        self.next_pin = self.next_pin.max(id.0.saturating_add(1));
        self.insert_pin(Pin::new(id, name, direction, value_type));
    }

    fn insert_pin(&mut self, pin: Pin) {
        self.pins.insert(pin.id, pin);
        self.shape_changed = true;
    }

    /// Remove a standalone pin; collection members go through
    /// [`PinSet::remove_collection_pin`]
    pub fn remove_pin(&mut self, id: PinId) -> Option<Pin> {
        if self.pins.get(&id)?.collection.is_some() {
            return None;
        }
        let pin = self.pins.shift_remove(&id)?;
        self.removed.push(id);
        self.shape_changed = true;
        Some(pin)
    }

    /// Create a pin collection with `initial_count` members (at least `min_count`)
    pub fn create_collection(
        &mut self,
        direction: PinDirection,
        value_type: Option<ValueType>,
        name: impl Into<String>,
        min_count: usize,
        initial_count: usize,
    ) -> CollectionId {
        let id = CollectionId(self.next_collection);
        self.next_collection += 1;
        self.collections.insert(
            id,
            PinCollection {
                id,
                name: name.into(),
                direction,
                value_type,
                min_count,
                members: Vec::new(),
            },
        );
        for _ in 0..initial_count.max(min_count) {
            let pin_id = self.reserve_id();
            self.push_member(id, pin_id);
        }
        id
    }

    fn push_member(&mut self, collection_id: CollectionId, pin_id: PinId) {
        let Some(collection) = self.collections.get_mut(&collection_id) else {
            return;
        };
        let name = format!("{} {}", collection.name, collection.members.len() + 1);
        let mut pin = Pin::new(pin_id, name.trim(), collection.direction, collection.value_type.clone());
        pin.collection = Some(collection_id);
        collection.members.push(pin_id);
        self.insert_pin(pin);
    }

    /// Append a pin to a collection
    pub fn add_collection_pin(&mut self, collection_id: CollectionId) -> Result<PinId, PinError> {
        if !self.collections.contains_key(&collection_id) {
            return Err(PinError::CollectionNotFound(collection_id));
        }
        let pin_id = self.reserve_id();
        self.push_member(collection_id, pin_id);
        Ok(pin_id)
    }

    /// Remove a pin from a collection, respecting its minimum count
    pub fn remove_collection_pin(
        &mut self,
        collection_id: CollectionId,
        pin_id: PinId,
    ) -> Result<(), PinError> {
        let collection = self
            .collections
            .get_mut(&collection_id)
            .ok_or(PinError::CollectionNotFound(collection_id))?;
        let index = collection
            .members
            .iter()
            .position(|id| *id == pin_id)
            .ok_or(PinError::NotInCollection(pin_id))?;
        if collection.members.len() <= collection.min_count {
            return Err(PinError::BelowMinimum {
                collection: collection_id,
                min_count: collection.min_count,
            });
        }
        collection.members.remove(index);
        self.pins.shift_remove(&pin_id);
        self.removed.push(pin_id);
        self.shape_changed = true;
        Ok(())
    }

    /// Rebuild a collection so its members carry exactly `member_ids`.
    ///
    /// Used when restoring persisted arity; the minimum count is still honored.
    /// Ids already taken by another pin, or at the end of the id space, are
    /// skipped; the number skipped is returned.
    pub fn restore_collection(&mut self, collection_id: CollectionId, member_ids: &[PinId]) -> usize {
        let Some(collection) = self.collections.get_mut(&collection_id) else {
            return 0;
        };
        let min_count = collection.min_count;
        let old_members = std::mem::take(&mut collection.members);
        for id in old_members {
            self.pins.shift_remove(&id);
        }
        let mut skipped = 0;
        for id in member_ids {
            let Some(next) = id.0.checked_add(1).filter(|_| !self.pins.contains_key(id)) else {
                skipped += 1;
                continue;
            };
            self.next_pin = self.next_pin.max(next);
            self.push_member(collection_id, *id);
        }
        while self.collections.get(&collection_id).map_or(0, PinCollection::len) < min_count {
            let pin_id = self.reserve_id();
            if self.pins.contains_key(&pin_id) {
                break;
            }
            self.push_member(collection_id, pin_id);
        }
        skipped
    }

    /// Get a pin by ID
    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(&id)
    }

    /// Get a mutable pin by ID
    pub fn pin_mut(&mut self, id: PinId) -> Option<&mut Pin> {
        self.pins.get_mut(&id)
    }

    /// Whether a pin exists
    pub fn contains(&self, id: PinId) -> bool {
        self.pins.contains_key(&id)
    }

    /// All pins in creation order
    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.pins.values()
    }

    /// All input pins
    pub fn inputs(&self) -> impl Iterator<Item = &Pin> {
        self.pins.values().filter(|p| p.is_input())
    }

    /// All output pins
    pub fn outputs(&self) -> impl Iterator<Item = &Pin> {
        self.pins.values().filter(|p| p.is_output())
    }

    /// Number of pins, collection members included
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether there are no pins
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Get a collection by ID
    pub fn collection(&self, id: CollectionId) -> Option<&PinCollection> {
        self.collections.get(&id)
    }

    /// All collections
    pub fn collections(&self) -> impl Iterator<Item = &PinCollection> {
        self.collections.values()
    }

    /// Values of a collection's members in order
    pub fn collection_values(&self, id: CollectionId) -> impl Iterator<Item = &Value> + '_ {
        self.collections
            .get(&id)
            .into_iter()
            .flat_map(|c| c.members.iter())
            .filter_map(|pin_id| self.pins.get(pin_id))
            .map(Pin::value)
    }

    /// Latest value of a pin; `Null` for unknown pins
    pub fn value(&self, id: PinId) -> &Value {
        self.pins.get(&id).map_or(&NULL_VALUE, Pin::value)
    }

    /// Boolean value of a pin, `false` when absent or not a boolean
    pub fn bool_value(&self, id: PinId) -> bool {
        self.value(id).as_bool().unwrap_or(false)
    }

    /// Numeric value of a pin, zero when absent or not numeric
    pub fn numeric_value(&self, id: PinId) -> Numeric {
        self.value(id).as_numeric().unwrap_or_default()
    }

    /// Set the value of a pin; returns `false` for unknown pins and for
    /// values the pin's type does not admit
    pub fn set_value(&mut self, id: PinId, value: impl Into<Value>) -> bool {
        self.pins
            .get_mut(&id)
            .is_some_and(|pin| pin.set_value(value.into()))
    }

    /// Write the type default to every output pin
    pub fn reset_outputs(&mut self) {
        for pin in self.pins.values_mut().filter(|p| p.is_output()) {
            pin.reset();
        }
    }

    /// Restore every pin to its default value
    pub fn reset(&mut self) {
        for pin in self.pins.values_mut() {
            pin.reset();
        }
    }

    /// Whether pins were added or removed since the last reconciliation
    pub(crate) fn has_pending_changes(&self) -> bool {
        self.shape_changed || !self.removed.is_empty()
    }

    /// Drain the pins removed since the last call
    pub(crate) fn take_removed(&mut self) -> Vec<PinId> {
        std::mem::take(&mut self.removed)
    }

    /// Whether pins were added or removed since the last call
    pub(crate) fn take_shape_changed(&mut self) -> bool {
        std::mem::replace(&mut self.shape_changed, false)
    }
}

/// Error when editing pins
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    /// Collection not found
    #[error("Pin collection not found: {0:?}")]
    CollectionNotFound(CollectionId),

    /// Pin is not a member of the collection
    #[error("Pin {0} is not part of the collection")]
    NotInCollection(PinId),

    /// Removing would drop below the minimum count
    #[error("Pin collection {collection:?} requires at least {min_count} pins")]
    BelowMinimum {
        /// The collection
        collection: CollectionId,
        /// Its minimum count
        min_count: usize,
    },
}
