// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory data model.
//!
//! Entries live at full paths and carry a declared type. Redefining an entry
//! with a different type (or adding/removing entries) notifies every
//! subscription whose path overlaps the changed one; plain value updates do
//! not, since nodes read current values on every evaluation.

use super::{
    DataModelError, DataModelPath, PathResolution, PathResolver, RevalidationNotifier,
    SubscriptionId,
};
use crate::context::ScriptContext;
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use parking_lot::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value_type: ValueType,
    value: Value,
}

#[derive(Debug, Default)]
struct State {
    entries: IndexMap<DataModelPath, Entry>,
    subscriptions: IndexMap<SubscriptionId, (DataModelPath, RevalidationNotifier)>,
    next_subscription: u64,
}

impl State {
    fn notifiers_for(&self, changed: &DataModelPath) -> Vec<RevalidationNotifier> {
        self.subscriptions
            .values()
            .filter(|(path, _)| path.overlaps(changed))
            .map(|(_, notifier)| notifier.clone())
            .collect()
    }
}

/// Thread-safe in-memory data model
#[derive(Debug, Default)]
pub struct MemoryDataModel {
    state: RwLock<State>,
}

impl MemoryDataModel {
    /// Create an empty data model
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine the entry at `path`
    pub fn insert(
        &self,
        path: &DataModelPath,
        value_type: ValueType,
        value: Value,
    ) -> Result<(), DataModelError> {
        if !value_type.admits(&value) {
            return Err(DataModelError::TypeMismatch {
                path: path.clone(),
                expected: value_type,
                found: value.value_type(),
            });
        }

        let notifiers = {
            let mut state = self.state.write();
            let previous = state.entries.insert(
                path.clone(),
                Entry {
                    value_type: value_type.clone(),
                    value,
                },
            );
            let structural = previous.map_or(true, |entry| entry.value_type != value_type);
            if structural {
                state.notifiers_for(path)
            } else {
                Vec::new()
            }
        };

        notify_all(&notifiers);
        Ok(())
    }

    /// Update the value at an existing path
    pub fn set_value(&self, path: &DataModelPath, value: Value) -> Result<(), DataModelError> {
        let mut state = self.state.write();
        let entry = state
            .entries
            .get_mut(path)
            .ok_or_else(|| DataModelError::PathNotFound(path.clone()))?;
        if !entry.value_type.admits(&value) {
            return Err(DataModelError::TypeMismatch {
                path: path.clone(),
                expected: entry.value_type.clone(),
                found: value.value_type(),
            });
        }
        entry.value = value;
        Ok(())
    }

    /// Remove the entry at `path` and every entry beneath it; returns the number removed
    pub fn remove(&self, path: &DataModelPath) -> usize {
        let (removed, notifiers) = {
            let mut state = self.state.write();
            let before = state.entries.len();
            state.entries.retain(|p, _| !p.starts_with(path));
            let removed = before - state.entries.len();
            let notifiers = if removed > 0 {
                state.notifiers_for(path)
            } else {
                Vec::new()
            };
            (removed, notifiers)
        };

        notify_all(&notifiers);
        removed
    }

    /// Current value at `path`
    pub fn get(&self, path: &DataModelPath) -> Option<Value> {
        self.state.read().entries.get(path).map(|e| e.value.clone())
    }

    /// Declared type at `path`
    pub fn value_type(&self, path: &DataModelPath) -> Option<ValueType> {
        self.state.read().entries.get(path).map(|e| e.value_type.clone())
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.state.read().subscriptions.len()
    }
}

fn notify_all(notifiers: &[RevalidationNotifier]) {
    for notifier in notifiers {
        if !notifier.notify() {
            tracing::trace!("Revalidation for node {:?} dropped, script is gone", notifier.node_id());
        }
    }
}

impl PathResolver for MemoryDataModel {
    fn resolve(&self, path: &DataModelPath, _context: &ScriptContext) -> PathResolution {
        match self.state.read().entries.get(path) {
            Some(entry) => PathResolution::valid(entry.value_type.clone(), entry.value.clone()),
            None => PathResolution::invalid(),
        }
    }

    fn subscribe(&self, path: &DataModelPath, notifier: RevalidationNotifier) -> SubscriptionId {
        let mut state = self.state.write();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscriptions.insert(id, (path.clone(), notifier));
        id
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.state.write().subscriptions.shift_remove(&subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use std::sync::mpsc;

    fn path(p: &str) -> DataModelPath {
        DataModelPath::parse(p).unwrap()
    }

    #[test]
    fn test_resolve_existing_and_missing() {
        let model = MemoryDataModel::new();
        model.insert(&path("Time.Hour"), ValueType::Integer, Value::from(13)).unwrap();

        let ctx = ScriptContext::new();
        let hit = model.resolve(&path("Time.Hour"), &ctx);
        assert!(hit.is_valid);
        assert_eq!(hit.runtime_type, Some(ValueType::Integer));
        assert_eq!(hit.current_value, Value::from(13));
        assert!(!model.resolve(&path("Time.Minute"), &ctx).is_valid);
    }

    #[test]
    fn test_set_value_checks_declared_type() {
        let model = MemoryDataModel::new();
        model.insert(&path("Audio.Muted"), ValueType::Bool, Value::Bool(false)).unwrap();

        model.set_value(&path("Audio.Muted"), Value::Bool(true)).unwrap();
        assert_eq!(model.get(&path("Audio.Muted")), Some(Value::Bool(true)));
        assert!(matches!(
            model.set_value(&path("Audio.Muted"), Value::from("yes")),
            Err(DataModelError::TypeMismatch { .. })
        ));
        assert!(matches!(
            model.set_value(&path("Audio.Volume"), Value::from(1)),
            Err(DataModelError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_only_structural_changes_notify() {
        let model = MemoryDataModel::new();
        let (tx, rx) = mpsc::channel();
        let node = NodeId::new();
        model.insert(&path("Audio.Volume"), ValueType::Numeric, Value::from(0.5)).unwrap();
        let sub = model.subscribe(&path("Audio.Volume"), RevalidationNotifier::new(node, tx));

        model.set_value(&path("Audio.Volume"), Value::from(0.7)).unwrap();
        model.insert(&path("Audio.Volume"), ValueType::Numeric, Value::from(0.9)).unwrap();
        assert!(rx.try_recv().is_err());

        model.insert(&path("Audio.Volume"), ValueType::Text, Value::from("loud")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), node);

        assert_eq!(model.remove(&path("Audio")), 1);
        assert_eq!(rx.try_recv().unwrap(), node);

        model.unsubscribe(sub);
        assert_eq!(model.subscription_count(), 0);
        model.insert(&path("Audio.Volume"), ValueType::Bool, Value::Bool(true)).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
