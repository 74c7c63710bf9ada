// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saving and loading scripts.
//!
//! Loading constructs every node and applies its storage, initializes all
//! nodes (which may materialize dynamic pins) and only then restores
//! connections. Connections that no longer fit are dropped and counted.

use crate::context::ScriptContext;
use crate::graph::{NodeScript, ScriptError};
use crate::node::{NodeId, NodeRegistry};
use crate::nodes::exit::EXIT_NODE_KIND;
use crate::pin::{CollectionId, PinId};
use crate::value::ValueType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Newest persisted script format this build reads and writes
pub const SCRIPT_FORMAT_VERSION: u32 = 1;

/// Persisted form of a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeScriptEntity {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Script name
    pub name: String,
    /// Script description
    #[serde(default)]
    pub description: String,
    /// Nodes in construction order
    #[serde(default)]
    pub nodes: Vec<NodeEntity>,
    /// Connections
    #[serde(default)]
    pub connections: Vec<NodeConnectionEntity>,
}

fn default_version() -> u32 {
    SCRIPT_FORMAT_VERSION
}

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntity {
    /// Node ID
    pub id: NodeId,
    /// Catalog kind
    pub kind: String,
    /// Display name, when customized
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Editor X position
    #[serde(default)]
    pub x: f64,
    /// Editor Y position
    #[serde(default)]
    pub y: f64,
    /// Kind-specific storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<serde_json::Value>,
    /// Member pins of every pin collection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pin_collections: Vec<PinCollectionEntity>,
}

/// Persisted pin collection arity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCollectionEntity {
    /// Collection ID within the node
    pub id: u32,
    /// Member pin IDs in order
    pub pins: Vec<u32>,
}

/// Persisted connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnectionEntity {
    /// Source node
    pub source_node: NodeId,
    /// Source output pin
    pub source_pin: u32,
    /// Target node
    pub target_node: NodeId,
    /// Target input pin
    pub target_pin: u32,
}

/// What happened while loading a script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Nodes restored
    pub nodes_loaded: usize,
    /// Nodes skipped, with their kind
    pub skipped_nodes: Vec<(NodeId, String)>,
    /// Nodes whose storage could not be applied; they kept their defaults
    pub storage_errors: usize,
    /// Connections restored
    pub connections_restored: usize,
    /// Connections dropped because they no longer fit
    pub dropped_connections: usize,
    /// Persisted collection pin ids that could not be restored
    pub rejected_pins: usize,
}

impl LoadReport {
    /// Whether everything in the entity was restored
    pub fn is_complete(&self) -> bool {
        self.skipped_nodes.is_empty()
            && self.storage_errors == 0
            && self.dropped_connections == 0
            && self.rejected_pins == 0
    }
}

impl NodeScript {
    /// Produce the persisted form of this script
    pub fn save(&self) -> NodeScriptEntity {
        let nodes = self
            .nodes()
            .map(|node| NodeEntity {
                id: node.id(),
                kind: node.kind().to_string(),
                name: Some(node.name.clone()),
                description: node.description.clone(),
                x: node.position[0],
                y: node.position[1],
                storage: node.storage(),
                pin_collections: node
                    .pins()
                    .collections()
                    .map(|collection| PinCollectionEntity {
                        id: collection.id().0,
                        pins: collection.members().iter().map(|pin| pin.0).collect(),
                    })
                    .collect(),
            })
            .collect();

        let connections = self
            .connections()
            .map(|c| NodeConnectionEntity {
                source_node: c.from_node,
                source_pin: c.from_pin.0,
                target_node: c.to_node,
                target_pin: c.to_pin.0,
            })
            .collect();

        NodeScriptEntity {
            version: SCRIPT_FORMAT_VERSION,
            name: self.name.clone(),
            description: self.description.clone(),
            nodes,
            connections,
        }
    }

    /// Replace the contents of this script with `entity` and initialize it
    /// against `context`
    pub fn load(
        &mut self,
        entity: &NodeScriptEntity,
        context: ScriptContext,
    ) -> Result<LoadReport, ScriptError> {
        if entity.version > SCRIPT_FORMAT_VERSION {
            return Err(ScriptError::UnsupportedVersion {
                found: entity.version,
                supported: SCRIPT_FORMAT_VERSION,
            });
        }

        self.clear_for_load()?;
        self.name = entity.name.clone();
        self.description = entity.description.clone();

        let mut report = LoadReport::default();
        let registry = Arc::clone(self.registry());
        for record in &entity.nodes {
            if record.kind == EXIT_NODE_KIND {
                if self.exit_node().is_some() {
                    self.rebind_exit_node(record.id, record.name.as_deref(), [record.x, record.y]);
                } else {
                    tracing::warn!("Script '{}' has no result, skipping exit node {}", self.name, record.id);
                    report.skipped_nodes.push((record.id, record.kind.clone()));
                }
                continue;
            }

            let Some(mut node) = registry.create_node(&record.kind) else {
                tracing::warn!("Skipping node {} of unknown kind '{}'", record.id, record.kind);
                report.skipped_nodes.push((record.id, record.kind.clone()));
                continue;
            };

            node.set_id(record.id);
            node.position = [record.x, record.y];
            if let Some(name) = &record.name {
                node.name.clone_from(name);
            }
            if !record.description.is_empty() {
                node.description.clone_from(&record.description);
            }
            if let Some(storage) = &record.storage {
                if let Err(err) = node.load_storage(storage.clone()) {
                    tracing::warn!("Node {} ('{}') keeps its defaults: {err}", record.id, record.kind);
                    report.storage_errors += 1;
                }
            }
            for collection in &record.pin_collections {
                let members: Vec<PinId> = collection.pins.iter().copied().map(PinId).collect();
                let rejected = node
                    .pins_mut()
                    .restore_collection(CollectionId(collection.id), &members);
                if rejected > 0 {
                    tracing::warn!("Node {} ('{}') has {rejected} unusable pin id(s)", record.id, record.kind);
                    report.rejected_pins += rejected;
                }
            }

            if self.insert_restored(node) {
                report.nodes_loaded += 1;
            } else {
                tracing::warn!("Skipping duplicate node {}", record.id);
                report.skipped_nodes.push((record.id, record.kind.clone()));
            }
        }

        // Nodes must be initialized before connections so dynamic pins exist
        self.initialize(context)?;

        for record in &entity.connections {
            let result = self.connect(
                record.source_node,
                PinId(record.source_pin),
                record.target_node,
                PinId(record.target_pin),
            );
            match result {
                Ok(_) => report.connections_restored += 1,
                Err(err) => {
                    tracing::debug!("Dropping persisted connection: {err}");
                    report.dropped_connections += 1;
                }
            }
        }

        if report.dropped_connections > 0 {
            tracing::warn!(
                "Script '{}' loaded with {} dropped connection(s)",
                self.name,
                report.dropped_connections
            );
        }
        tracing::debug!(
            "Loaded script '{}': {} nodes, {} connections",
            self.name,
            report.nodes_loaded,
            report.connections_restored
        );
        Ok(report)
    }

    /// Build and load a script from its persisted form; a script with a
    /// `result_type` gets an exit node
    pub fn from_entity(
        entity: &NodeScriptEntity,
        registry: Arc<NodeRegistry>,
        result_type: Option<ValueType>,
        context: ScriptContext,
    ) -> Result<(Self, LoadReport), ScriptError> {
        let mut script = match result_type {
            Some(result_type) => Self::with_result(entity.name.clone(), registry, result_type),
            None => Self::new(entity.name.clone(), registry),
        };
        let report = script.load(entity, context)?;
        Ok((script, report))
    }

    /// Serialize the persisted form to pretty JSON
    pub fn export_json(&self) -> Result<String, ScriptError> {
        Ok(serde_json::to_string_pretty(&self.save())?)
    }

    /// Load the persisted form from JSON
    pub fn import_json(&mut self, json: &str, context: ScriptContext) -> Result<LoadReport, ScriptError> {
        let entity: NodeScriptEntity = serde_json::from_str(json)?;
        self.load(&entity, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PinAddress;
    use crate::datamodel::{DataModelPath, MemoryDataModel};
    use crate::nodes::create_default_registry;
    use crate::value::{Numeric, Value};
    use serde_json::json;

    fn registry() -> Arc<NodeRegistry> {
        Arc::new(create_default_registry())
    }

    fn output(script: &NodeScript, node: NodeId) -> PinId {
        script.node(node).unwrap().pins().outputs().next().unwrap().id()
    }

    #[test]
    fn test_round_trip_preserves_kinds_storage_and_connections() {
        let mut script = NodeScript::with_result("brightness", registry(), ValueType::Numeric);
        script.initialize(ScriptContext::new()).unwrap();
        let a = script.add_node_of_kind("static_numeric").unwrap();
        let b = script.add_node_of_kind("static_numeric").unwrap();
        let sum = script.add_node_of_kind("sum").unwrap();
        script.update_storage(a, json!(2)).unwrap();
        script.update_storage(b, json!(0.5)).unwrap();
        script.node_mut(sum).unwrap().position = [120.0, 40.0];

        let collection = CollectionId(0);
        let third = script.add_collection_pin(sum, collection).unwrap();
        let members = script.node(sum).unwrap().pins().collection(collection).unwrap().members().to_vec();
        script.connect(a, output(&script, a), sum, members[0]).unwrap();
        script.connect(b, output(&script, b), sum, third).unwrap();
        let exit = script.exit_node().unwrap();
        script.connect(sum, output(&script, sum), exit, PinId(0)).unwrap();

        let json = script.export_json().unwrap();
        let mut restored = NodeScript::with_result("empty", registry(), ValueType::Numeric);
        let report = restored.import_json(&json, ScriptContext::new()).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.nodes_loaded, 3);
        assert_eq!(report.connections_restored, 3);
        assert_eq!(restored.name, "brightness");
        assert_eq!(restored.exit_node(), Some(exit));
        assert_eq!(restored.node(a).unwrap().storage(), Some(json!(2)));
        assert_eq!(restored.node(sum).unwrap().position, [120.0, 40.0]);
        assert_eq!(restored.node(sum).unwrap().pins().collection(collection).unwrap().len(), 3);
        assert_eq!(restored.save(), script.save());

        assert!(restored.tick().is_evaluated());
        assert_eq!(restored.result(), Some(&Value::Numeric(Numeric::from(2.5))));
    }

    #[test]
    fn test_load_tolerates_unknown_kinds_and_bad_storage() {
        let known = NodeId::new();
        let unknown = NodeId::new();
        let entity = NodeScriptEntity {
            version: SCRIPT_FORMAT_VERSION,
            name: "drifted".to_string(),
            description: String::new(),
            nodes: vec![
                NodeEntity {
                    id: known,
                    kind: "static_boolean".to_string(),
                    name: None,
                    description: String::new(),
                    x: 0.0,
                    y: 0.0,
                    storage: Some(json!("not a bool")),
                    pin_collections: Vec::new(),
                },
                NodeEntity {
                    id: unknown,
                    kind: "plugin_gradient".to_string(),
                    name: None,
                    description: String::new(),
                    x: 0.0,
                    y: 0.0,
                    storage: None,
                    pin_collections: Vec::new(),
                },
            ],
            connections: vec![NodeConnectionEntity {
                source_node: unknown,
                source_pin: 0,
                target_node: known,
                target_pin: 0,
            }],
        };

        let (script, report) =
            NodeScript::from_entity(&entity, registry(), None, ScriptContext::new()).unwrap();
        assert_eq!(report.nodes_loaded, 1);
        assert_eq!(report.skipped_nodes, vec![(unknown, "plugin_gradient".to_string())]);
        assert_eq!(report.storage_errors, 1);
        assert_eq!(report.dropped_connections, 1);
        assert_eq!(script.node(known).unwrap().storage(), Some(json!(false)));
    }

    #[test]
    fn test_exhausted_pin_id_does_not_abort_load() {
        let sum = NodeId::new();
        let json = json!({
            "version": SCRIPT_FORMAT_VERSION,
            "name": "malformed",
            "nodes": [{
                "id": sum,
                "kind": "sum",
                "pin_collections": [{ "id": 0, "pins": [u32::MAX, 1] }],
            }],
        })
        .to_string();

        let mut script = NodeScript::new("malformed", registry());
        let report = script.import_json(&json, ScriptContext::new()).unwrap();
        assert_eq!(report.nodes_loaded, 1);
        assert_eq!(report.rejected_pins, 1);
        assert!(!report.is_complete());

        let pins = script.node(sum).unwrap().pins();
        assert_eq!(pins.collection(CollectionId(0)).unwrap().members(), &[PinId(1)]);
        assert!(script.tick().is_evaluated());
    }

    #[test]
    fn test_restored_nodes_are_keyed_by_their_ids() {
        let mut script = NodeScript::with_result("keys", registry(), ValueType::Bool);
        script.initialize(ScriptContext::new()).unwrap();
        let flag = script.add_node_of_kind("static_boolean").unwrap();
        let exit = script.exit_node().unwrap();
        script.connect(flag, output(&script, flag), exit, PinId(0)).unwrap();
        let entity = script.save();

        let (restored, report) =
            NodeScript::from_entity(&entity, registry(), Some(ValueType::Bool), ScriptContext::new())
                .unwrap();
        assert!(report.is_complete());
        assert_eq!(restored.exit_node(), Some(exit));
        for id in restored.node_ids() {
            assert_eq!(restored.node(id).unwrap().id(), id);
        }
        let saved = restored.save();
        for connection in &saved.connections {
            assert!(saved.nodes.iter().any(|n| n.id == connection.source_node));
            assert!(saved.nodes.iter().any(|n| n.id == connection.target_node));
        }
    }

    #[test]
    fn test_reloading_releases_data_model_subscriptions() {
        let model = Arc::new(MemoryDataModel::new());
        let level = DataModelPath::parse("Audio.Level").unwrap();
        model.insert(&level, ValueType::Numeric, Value::from(0.5)).unwrap();
        let context = ScriptContext::with_resolver(model.clone());

        let mut script = NodeScript::new("meter", registry());
        script.initialize(context.clone()).unwrap();
        let source = script.add_node_of_kind("data_model_value").unwrap();
        script.update_storage(source, json!({ "path": "Audio.Level" })).unwrap();
        assert_eq!(model.subscription_count(), 1);
        let entity = script.save();

        for _ in 0..3 {
            script.load(&entity, context.clone()).unwrap();
            assert_eq!(model.subscription_count(), 1);
        }
        assert!(script.tick().is_evaluated());
        assert_eq!(script.node(source).unwrap().pins().value(PinId(0)), &Value::from(0.5));

        let (copy, _) = NodeScript::from_entity(&entity, registry(), None, context).unwrap();
        assert_eq!(model.subscription_count(), 2);
        drop(copy);
        assert_eq!(model.subscription_count(), 1);

        script.dispose();
        assert_eq!(model.subscription_count(), 0);
    }

    #[test]
    fn test_newer_format_is_rejected() {
        let entity = NodeScriptEntity {
            version: SCRIPT_FORMAT_VERSION + 1,
            name: "future".to_string(),
            description: String::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
        };
        let mut script = NodeScript::new("current", registry());
        assert!(matches!(
            script.load(&entity, ScriptContext::new()),
            Err(ScriptError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn test_connection_from_retyped_path_is_dropped_on_load() {
        let model = Arc::new(MemoryDataModel::new());
        let hour = DataModelPath::parse("Time.Hour").unwrap();
        model.insert(&hour, ValueType::Integer, Value::from(9)).unwrap();
        let context = ScriptContext::with_resolver(model.clone());

        let mut script = NodeScript::new("schedule", registry());
        script.initialize(context.clone()).unwrap();
        let source = script.add_node_of_kind("data_model_value").unwrap();
        script.update_storage(source, json!({ "path": "Time.Hour" })).unwrap();
        let gt = script.add_node_of_kind("greater_than").unwrap();
        script.connect(source, PinId(0), gt, PinId(0)).unwrap();
        let difference = script.add_node_of_kind("subtract").unwrap();
        script.connect(source, PinId(0), difference, PinId(1)).unwrap();
        let entity = script.save();

        // The path is now text: still fits the Any input, no longer the numeric one
        model.insert(&hour, ValueType::Text, Value::from("nine")).unwrap();
        let (restored, report) =
            NodeScript::from_entity(&entity, registry(), None, context).unwrap();

        assert_eq!(report.connections_restored, 1);
        assert_eq!(report.dropped_connections, 1);
        assert!(restored
            .connection_to(PinAddress::new(difference, PinId(1)))
            .is_none());
        assert_eq!(
            restored.node(source).unwrap().pins().pin(PinId(0)).unwrap().value_type(),
            Some(&ValueType::Text)
        );
    }
}
