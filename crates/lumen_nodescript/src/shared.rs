// SPDX-License-Identifier: MIT OR Apache-2.0
//! A script shared between the tick source and editors on other threads.
//!
//! Every access goes through one mutex, so a structural edit never runs
//! while a pass is in progress and vice versa.

use crate::graph::{NodeScript, TickOutcome};
use crate::persistence::NodeScriptEntity;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable, thread-safe handle to a [`NodeScript`]
#[derive(Debug, Clone)]
pub struct SharedNodeScript {
    inner: Arc<Mutex<NodeScript>>,
}

impl SharedNodeScript {
    /// Wrap a script
    pub fn new(script: NodeScript) -> Self {
        Self {
            inner: Arc::new(Mutex::new(script)),
        }
    }

    /// Run one pass
    pub fn tick(&self) -> TickOutcome {
        self.inner.lock().tick()
    }

    /// Edit the script; no pass runs until `f` returns
    pub fn edit<R>(&self, f: impl FnOnce(&mut NodeScript) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Inspect the script
    pub fn read<R>(&self, f: impl FnOnce(&NodeScript) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Persisted form of the script
    pub fn save(&self) -> NodeScriptEntity {
        self.inner.lock().save()
    }

    /// Dispose the script; later ticks are skipped
    pub fn dispose(&self) {
        self.inner.lock().dispose();
    }
}

impl From<NodeScript> for SharedNodeScript {
    fn from(script: NodeScript) -> Self {
        Self::new(script)
    }
}
