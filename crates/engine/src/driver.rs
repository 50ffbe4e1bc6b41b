// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The scheduler thread and the monitor it shares with the owning thread.
//!
//! The monitor guards everything both threads touch: lifecycle, the queue of
//! message batches, the wake-up state and the stream updates published at
//! the end of each iteration. The [`GraphEngine`] itself is owned by the
//! scheduler thread while it runs and parked in the monitor when it exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use mediagraph_core::{GraphTime, LifecycleState, StreamStateUpdate};

use crate::config::GraphConfig;
use crate::graph::{GraphEngine, StreamMemoryUsage};
use crate::messages::MessageBlock;

/// Asks the scheduler to run another iteration soon. Implemented by the
/// shared graph state; producers hold it weakly.
pub(crate) trait IterationWaker: Send + Sync {
    fn ensure_next_iteration(&self);
}

#[cfg(test)]
pub(crate) struct NoopWaker;

#[cfg(test)]
impl IterationWaker for NoopWaker {
    fn ensure_next_iteration(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitState {
    Running,
    /// Sleeping until the next period; another iteration is needed.
    WaitingForNextIteration,
    /// Sleeping until woken; nothing to do.
    WaitingIndefinitely,
    /// Notified but not yet running.
    WakingUp,
}

pub(crate) struct MonitorState {
    pub(crate) lifecycle: LifecycleState,
    pub(crate) wait_state: WaitState,
    /// Batches handed over by the owner, applied at the next iteration.
    pub(crate) message_queue: Vec<MessageBlock>,
    pub(crate) need_another_iteration: bool,
    pub(crate) force_shutdown: bool,
    /// Offline graphs only process once started.
    pub(crate) non_realtime_processing: bool,
    pub(crate) pending_end_time: Option<GraphTime>,
    pub(crate) stream_updates: Vec<StreamStateUpdate>,
    /// Set when the owner has work waiting in `run_in_stable_state`.
    pub(crate) stable_state_posted: bool,
    /// The engine while no scheduler thread owns it.
    pub(crate) engine: Option<GraphEngine>,
}

#[derive(Default)]
pub(crate) struct MemoryReportState {
    pub(crate) requested: bool,
    pub(crate) report: Option<Vec<StreamMemoryUsage>>,
}

pub(crate) struct GraphShared {
    pub(crate) monitor: Mutex<MonitorState>,
    /// Wakes the scheduler.
    pub(crate) cond: Condvar,
    /// Wakes the owner waiting for a stable-state event.
    pub(crate) owner_cond: Condvar,
    pub(crate) memory_report: Mutex<MemoryReportState>,
    pub(crate) memory_report_cond: Condvar,
    pub(crate) realtime: bool,
    pub(crate) config: GraphConfig,
    next_stream_id: AtomicU64,
    next_port_id: AtomicU64,
}

impl GraphShared {
    pub(crate) fn new(config: GraphConfig, realtime: bool) -> Self {
        Self {
            monitor: Mutex::new(MonitorState {
                lifecycle: LifecycleState::ThreadNotStarted,
                wait_state: WaitState::Running,
                message_queue: Vec::new(),
                need_another_iteration: false,
                force_shutdown: false,
                non_realtime_processing: false,
                pending_end_time: None,
                stream_updates: Vec::new(),
                stable_state_posted: false,
                engine: None,
            }),
            cond: Condvar::new(),
            owner_cond: Condvar::new(),
            memory_report: Mutex::new(MemoryReportState::default()),
            memory_report_cond: Condvar::new(),
            realtime,
            config,
            next_stream_id: AtomicU64::new(1),
            next_port_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn allocate_stream_id(&self) -> u64 {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn allocate_port_id(&self) -> u64 {
        self.next_port_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Wakes a sleeping scheduler. Call with the monitor held.
    pub(crate) fn ensure_next_iteration_locked(&self, state: &mut MonitorState) {
        state.need_another_iteration = true;
        if matches!(state.wait_state, WaitState::WaitingForNextIteration | WaitState::WaitingIndefinitely) {
            state.wait_state = WaitState::WakingUp;
            self.cond.notify_all();
        }
    }

    /// Lets the owner know there is stable-state work waiting.
    pub(crate) fn post_stable_state_event(&self, state: &mut MonitorState) {
        state.stable_state_posted = true;
        self.owner_cond.notify_all();
    }
}

impl IterationWaker for GraphShared {
    fn ensure_next_iteration(&self) {
        let mut state = self.monitor.lock();
        self.ensure_next_iteration_locked(&mut state);
    }
}

fn answer_memory_report(shared: &GraphShared, engine: &GraphEngine) {
    let mut report = shared.memory_report.lock();
    if report.requested {
        report.requested = false;
        report.report = Some(engine.memory_report());
        shared.memory_report_cond.notify_all();
    }
}

/// Body of the scheduler thread. Takes the parked engine from the monitor and
/// returns after the final update, parking it again for the owner to clean up.
#[allow(clippy::cognitive_complexity)]
pub(crate) fn run_thread(shared: &Arc<GraphShared>) {
    let target_period = Duration::from_millis(u64::try_from(shared.config.target_period_ms).unwrap_or(0));
    let max_wait = Duration::from_millis(shared.config.max_wait_ms);

    let (mut engine, mut batches) = {
        let mut state = shared.monitor.lock();
        let Some(engine) = state.engine.take() else {
            tracing::error!("Media graph thread started without an engine");
            state.lifecycle = LifecycleState::WaitingForMainThreadCleanup;
            shared.post_stable_state_event(&mut state);
            return;
        };
        (engine, std::mem::take(&mut state.message_queue))
    };
    tracing::info!(realtime = shared.realtime, current_time = engine.current_time, "Media graph thread running");
    // Time spent parked doesn't count as graph time.
    engine.current_time_stamp = Instant::now();
    engine.resume_audio_outputs();

    loop {
        answer_memory_report(shared, &engine);

        if let Some(end_time) = shared.monitor.lock().pending_end_time.take() {
            engine.end_time = end_time;
        }

        let now = Instant::now();
        engine.iterate(std::mem::take(&mut batches), now);

        let mut state = shared.monitor.lock();
        if engine.need_another_iteration {
            engine.need_another_iteration = false;
            state.need_another_iteration = true;
        }

        let final_update = state.force_shutdown
            || (engine.current_time >= engine.end_time && engine.all_finished_streams_notified())
            || (engine.is_empty() && state.message_queue.is_empty());

        if let Some(updates) = engine.prepare_updates(final_update, Instant::now()) {
            state.stream_updates.extend(updates);
        }
        if final_update || !state.stream_updates.is_empty() {
            shared.post_stable_state_event(&mut state);
        }

        if final_update {
            tracing::info!(
                current_time = engine.current_time,
                forced = state.force_shutdown,
                "Media graph waiting for owner cleanup"
            );
            state.lifecycle = LifecycleState::WaitingForMainThreadCleanup;
            state.wait_state = WaitState::Running;
            engine.pause_audio_outputs();
            answer_memory_report(shared, &engine);
            state.engine = Some(engine);
            shared.owner_cond.notify_all();
            return;
        }

        // Offline graphs churn through their input without sleeping.
        if shared.realtime {
            let mut paused_outputs = false;
            let timeout = if state.need_another_iteration {
                let elapsed = Instant::now().saturating_duration_since(engine.current_time_stamp);
                state.wait_state = WaitState::WaitingForNextIteration;
                Some(target_period.saturating_sub(elapsed).min(max_wait))
            } else {
                state.wait_state = WaitState::WaitingIndefinitely;
                engine.pause_audio_outputs();
                paused_outputs = true;
                None
            };
            match timeout {
                Some(timeout) if timeout.is_zero() => {},
                Some(timeout) => {
                    if state.wait_state != WaitState::WakingUp {
                        let _ = shared.cond.wait_for(&mut state, timeout);
                    }
                },
                None => {
                    while state.wait_state == WaitState::WaitingIndefinitely {
                        shared.cond.wait(&mut state);
                    }
                },
            }
            tracing::trace!("Media graph thread woke up");
            if paused_outputs {
                engine.resume_audio_outputs();
            }
        }

        state.wait_state = WaitState::Running;
        state.need_another_iteration = false;
        batches = std::mem::take(&mut state.message_queue);
    }
}
