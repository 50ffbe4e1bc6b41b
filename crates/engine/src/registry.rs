// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The process-wide realtime graph.
//!
//! Created on first use by [`get_or_init`]. [`shutdown`] tears it down; a
//! graph that destroyed itself (all streams gone) is replaced on the next
//! [`get_or_init`].

use std::sync::Arc;

use parking_lot::Mutex;

use mediagraph_core::{AudioOutputBackend, LifecycleState, Result};

use crate::config::GraphConfig;
use crate::handle::MediaStreamGraph;

static REALTIME_GRAPH: Mutex<Option<MediaStreamGraph>> = parking_lot::const_mutex(None);

/// Returns the shared realtime graph, creating it with `config` and `backend`
/// if there is none. Both are ignored when the graph already exists.
pub fn get_or_init(config: &GraphConfig, backend: Arc<dyn AudioOutputBackend>) -> Result<MediaStreamGraph> {
    let mut slot = REALTIME_GRAPH.lock();
    if let Some(graph) = slot.as_ref() {
        if graph.lifecycle_state() < LifecycleState::WaitingForThreadShutdown {
            return Ok(graph.clone());
        }
        tracing::debug!("Replacing shut down realtime graph");
    }
    let graph = MediaStreamGraph::new_realtime(config.clone(), backend)?;
    *slot = Some(graph.clone());
    Ok(graph)
}

/// The shared realtime graph, if one is alive.
pub fn current() -> Option<MediaStreamGraph> {
    REALTIME_GRAPH
        .lock()
        .as_ref()
        .filter(|g| g.lifecycle_state() < LifecycleState::WaitingForThreadShutdown)
        .cloned()
}

/// Forces the shared graph down and waits for its thread. A no-op when no
/// graph was created.
pub fn shutdown() -> Result<()> {
    let graph = REALTIME_GRAPH.lock().take();
    match graph {
        Some(graph) => graph.shutdown(),
        None => Ok(()),
    }
}
