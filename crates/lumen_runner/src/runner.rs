// SPDX-License-Identifier: MIT OR Apache-2.0
//! The frame loop.
//!
//! The runner owns the data model and the script, publishes the frame
//! counter to the data model under `Runner.Frame`, and ticks the script
//! once per frame.

use crate::error::RunnerError;
use crate::settings::RunnerSettings;
use lumen_nodescript::{
    create_default_registry, DataModelPath, MemoryDataModel, NodeScript, NodeScriptEntity,
    ScriptContext, SharedNodeScript, TickOutcome, Value, ValueType,
};
use std::path::Path;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

/// Data model path of the frame counter
pub const FRAME_PATH: &str = "Runner.Frame";

/// Totals of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames ticked
    pub frames: u64,
    /// Passes in which at least one node failed
    pub failed_passes: u64,
    /// Ticks that did not evaluate
    pub skipped_passes: u64,
}

/// Drives a script at a fixed frame rate
pub struct Runner {
    settings: RunnerSettings,
    model: Arc<MemoryDataModel>,
    script: SharedNodeScript,
    frame_path: DataModelPath,
    summary: RunSummary,
}

impl Runner {
    /// Seed the data model and load the configured script, resolving its
    /// path against `base_dir`
    pub fn new(settings: RunnerSettings, base_dir: &Path) -> Result<Self, RunnerError> {
        let script_path = base_dir.join(&settings.script);
        let json = std::fs::read_to_string(&script_path).map_err(|source| RunnerError::Io {
            path: script_path.clone(),
            source,
        })?;
        let entity: NodeScriptEntity = serde_json::from_str(&json)?;
        Self::from_entity(settings, &entity)
    }

    /// Seed the data model and load `entity`
    pub fn from_entity(settings: RunnerSettings, entity: &NodeScriptEntity) -> Result<Self, RunnerError> {
        let model = Arc::new(MemoryDataModel::new());
        let frame_path = DataModelPath::parse(FRAME_PATH)?;
        model.insert(&frame_path, ValueType::Integer, Value::from(0))?;
        settings.seed(&model)?;

        let context = ScriptContext::with_resolver(model.clone());
        let (script, report) = NodeScript::from_entity(
            entity,
            Arc::new(create_default_registry()),
            settings.result_type.clone(),
            context,
        )?;
        if report.is_complete() {
            tracing::info!("Loaded script '{}' ({} nodes)", script.name, report.nodes_loaded);
        } else {
            tracing::warn!(
                "Loaded script '{}' with {} skipped node(s), {} storage error(s), {} dropped connection(s), {} rejected pin(s)",
                script.name,
                report.skipped_nodes.len(),
                report.storage_errors,
                report.dropped_connections,
                report.rejected_pins
            );
        }

        Ok(Self {
            settings,
            model,
            script: SharedNodeScript::new(script),
            frame_path,
            summary: RunSummary::default(),
        })
    }

    /// The data model scripts bind against
    pub fn data_model(&self) -> &Arc<MemoryDataModel> {
        &self.model
    }

    /// Handle to the running script
    pub fn script(&self) -> &SharedNodeScript {
        &self.script
    }

    /// Advance one frame
    pub fn step(&mut self) -> TickOutcome {
        self.summary.frames += 1;
        let frame = i64::try_from(self.summary.frames).unwrap_or(i64::MAX);
        if let Err(err) = self.model.set_value(&self.frame_path, Value::from(frame)) {
            tracing::warn!("Failed to publish frame counter: {err}");
        }

        let outcome = self.script.tick();
        match &outcome {
            TickOutcome::Evaluated(report) if !report.is_clean() => self.summary.failed_passes += 1,
            TickOutcome::Evaluated(_) => {}
            TickOutcome::Skipped(reason) => {
                tracing::debug!("Frame {frame} skipped: {reason:?}");
                self.summary.skipped_passes += 1;
            }
        }

        let log_every = self.settings.log_every;
        if log_every > 0 && self.summary.frames % log_every == 0 {
            let result = self.script.read(|script| script.result().cloned());
            match result {
                Some(value) => tracing::info!("Frame {frame}: result = {value}"),
                None => tracing::info!("Frame {frame}"),
            }
        }
        outcome
    }

    /// Tick until the frame limit is reached or Ctrl+C is pressed
    pub async fn run(mut self) -> RunSummary {
        let mut interval = tokio::time::interval(self.settings.frame_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self
                .settings
                .max_frames
                .is_some_and(|max| self.summary.frames >= max)
            {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    self.step();
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
            }
        }

        self.script.dispose();
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DataModelEntry;
    use lumen_nodescript::persistence::{NodeConnectionEntity, NodeEntity, SCRIPT_FORMAT_VERSION};
    use lumen_nodescript::NodeId;
    use serde_json::json;

    /// `Audio.Level > 0.5` as the script result
    fn threshold_script() -> NodeScriptEntity {
        let level = NodeId::new();
        let threshold = NodeId::new();
        let compare = NodeId::new();
        let exit = NodeId::new();
        let node = |id, kind: &str, storage| NodeEntity {
            id,
            kind: kind.to_string(),
            name: None,
            description: String::new(),
            x: 0.0,
            y: 0.0,
            storage,
            pin_collections: Vec::new(),
        };
        let connection = |source_node, source_pin, target_node, target_pin| NodeConnectionEntity {
            source_node,
            source_pin,
            target_node,
            target_pin,
        };

        NodeScriptEntity {
            version: SCRIPT_FORMAT_VERSION,
            name: "threshold".to_string(),
            description: String::new(),
            nodes: vec![
                node(exit, "exit", None),
                node(level, "data_model_value", Some(json!({ "path": "Audio.Level" }))),
                node(threshold, "static_numeric", Some(json!(0.5))),
                node(compare, "greater_than", None),
            ],
            connections: vec![
                connection(level, 0, compare, 0),
                connection(threshold, 0, compare, 1),
                connection(compare, 2, exit, 0),
            ],
        }
    }

    fn settings() -> RunnerSettings {
        RunnerSettings {
            frame_rate: 1000,
            result_type: Some(ValueType::Bool),
            max_frames: Some(3),
            log_every: 0,
            data_model: vec![DataModelEntry {
                path: DataModelPath::parse("Audio.Level").unwrap(),
                value_type: ValueType::Numeric,
                value: Value::from(0.25),
            }],
            ..RunnerSettings::default()
        }
    }

    #[test]
    fn test_step_follows_data_model() {
        let mut runner = Runner::from_entity(settings(), &threshold_script()).unwrap();

        assert!(runner.step().is_evaluated());
        assert_eq!(runner.script().read(|s| s.result().cloned()), Some(Value::Bool(false)));

        let level = DataModelPath::parse("Audio.Level").unwrap();
        runner.data_model().set_value(&level, Value::from(0.75)).unwrap();
        runner.step();
        assert_eq!(runner.script().read(|s| s.result().cloned()), Some(Value::Bool(true)));

        let frame = DataModelPath::parse(FRAME_PATH).unwrap();
        assert_eq!(runner.data_model().get(&frame), Some(Value::from(2)));
    }

    #[tokio::test]
    async fn test_run_stops_at_frame_limit() {
        let runner = Runner::from_entity(settings(), &threshold_script()).unwrap();
        let script = runner.script().clone();

        let summary = runner.run().await;
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.failed_passes, 0);
        assert!(!script.tick().is_evaluated());
    }

    #[test]
    fn test_demo_settings_load() {
        let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("demo");
        let settings = RunnerSettings::load(&demo.join("lumen.ron")).unwrap();
        let mut runner = Runner::new(settings, &demo).unwrap();

        assert!(runner.step().is_evaluated());
        assert_eq!(runner.script().read(|s| s.result().cloned()), Some(Value::Bool(false)));
    }

    #[test]
    fn test_missing_script_file() {
        let result = Runner::new(settings(), Path::new("/nonexistent"));
        assert!(matches!(result, Err(RunnerError::Io { .. })));
    }
}
