// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visual node scripting runtime for Lumen.
//!
//! A [`NodeScript`] is a dataflow graph of nodes connected pin to pin. Once
//! per rendering frame the tick source calls [`NodeScript::tick`], which
//! evaluates every node once in dependency order and propagates values
//! along connections.
//!
//! ## Architecture
//!
//! - Typed pins and variable-arity pin collections ([`pin`])
//! - Nodes with pluggable behavior and a kind registry ([`node`], [`nodes`])
//! - Connection validation and execution order caching ([`graph`])
//! - Per-frame evaluation ([`evaluation`])
//! - Save/load with tolerance for schema drift ([`persistence`])
//! - Nodes bound to an external data model whose pins follow the bound
//!   path's type ([`datamodel`])

pub mod connection;
pub mod context;
pub mod datamodel;
pub mod evaluation;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod persistence;
pub mod pin;
pub mod shared;
pub mod value;

pub use connection::{Connection, ConnectionId, PinAddress};
pub use context::{ContextId, ScriptContext};
pub use datamodel::{DataModelPath, MemoryDataModel, PathResolution, PathResolver};
pub use evaluation::{EvaluationError, PassReport};
pub use graph::{ConnectionError, NodeScript, ScriptError, ScriptState, SkipReason, TickOutcome};
pub use node::{Node, NodeBehavior, NodeId, NodeRegistry, NodeType};
pub use nodes::create_default_registry;
pub use persistence::{LoadReport, NodeScriptEntity};
pub use pin::{CollectionId, PinDirection, PinId, PinSet};
pub use shared::SharedNodeScript;
pub use value::{Numeric, Value, ValueType};
