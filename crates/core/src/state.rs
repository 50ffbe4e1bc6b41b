// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graph lifecycle and per-stream state mirrored to the control thread.
//!
//! ## Lifecycle
//!
//! ```text
//!   ThreadNotStarted
//!          ↓
//!       Running ←──────────────┐ (revived by new messages, realtime only)
//!          ↓                   │
//!   WaitingForMainThreadCleanup┘
//!          ↓
//!   WaitingForThreadShutdown
//!          ↓
//!      Destroyed
//! ```

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::time::StreamTime;
use crate::types::StreamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Graph created, scheduler thread not running yet.
    ThreadNotStarted,
    /// Scheduler thread is iterating.
    Running,
    /// Scheduler thread has exited its loop; the control thread decides
    /// whether to revive or tear down.
    WaitingForMainThreadCleanup,
    /// Teardown in progress.
    WaitingForThreadShutdown,
    /// Scheduler thread joined and every stream destroyed.
    Destroyed,
}

/// State of one stream as published by the scheduler at the end of an iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStateUpdate {
    pub stream: StreamId,
    /// Index of the latest control-message batch in effect at the stream's current time.
    pub graph_update_index: u64,
    /// The stream's time at the graph's current time.
    pub current_time: StreamTime,
    /// Finished and the finish event has been delivered.
    pub finished: bool,
    pub timestamp: SystemTime,
}
