// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Listener contracts.
//!
//! [`StreamListener`] callbacks run on the scheduler thread in the middle of an
//! iteration: implementations must be quick and must not block. Anything
//! heavier should be handed off to another thread.
//!
//! [`MainThreadListener`] callbacks run on the control thread when it applies
//! the scheduler's state updates.

use std::sync::Arc;

use crate::segment::MediaSegment;
use crate::state::StreamStateUpdate;
use crate::time::{GraphTime, StreamTime, TrackRate, TrackTicks};
use crate::types::{TrackChanges, TrackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    Blocked,
    Unblocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Consumed,
    NotConsumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// All of the stream's data has been played. Delivered once.
    Finished,
    /// The stream was destroyed and will receive no further callbacks.
    Removed,
}

/// Data queued onto a track during the current iteration.
#[derive(Debug)]
pub struct QueuedTrackChange<'a> {
    pub track: TrackId,
    pub rate: TrackRate,
    /// Tick at which `segment` starts within the track.
    pub offset: TrackTicks,
    pub changes: TrackChanges,
    pub segment: &'a MediaSegment,
}

/// Scheduler-thread callbacks for one stream. Every method has an empty default.
pub trait StreamListener: Send + Sync {
    /// The stream is about to need data up to `desired_time` (stream time).
    /// Only sent to source streams with pulling enabled.
    fn notify_pull(&self, _desired_time: StreamTime) {}

    fn notify_blocking_changed(&self, _blocking: Blocking) {}

    /// The stream has data for the current time. Delivered once.
    fn notify_has_current_data(&self) {}

    /// Graph time advanced to `current_time` and the stream produced output.
    fn notify_output(&self, _current_time: GraphTime) {}

    fn notify_event(&self, _event: StreamEvent) {}

    fn notify_queued_track_changes(&self, _change: &QueuedTrackChange<'_>) {}

    fn notify_consumption_changed(&self, _consumption: Consumption) {}
}

/// Control-thread callback, invoked after the stream's mirrored state changed.
pub trait MainThreadListener: Send + Sync {
    fn notify_main_thread_state_changed(&self, update: &StreamStateUpdate);
}

/// Identity comparison for listener handles (the allocation, not the value).
pub fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;
    impl StreamListener for Nop {}

    #[test]
    fn test_same_listener_compares_allocation() {
        let a: Arc<dyn StreamListener> = Arc::new(Nop);
        let b: Arc<dyn StreamListener> = Arc::new(Nop);
        let a2 = Arc::clone(&a);
        assert!(same_listener(&a, &a2));
        assert!(!same_listener(&a, &b));
    }
}
