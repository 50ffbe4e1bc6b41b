// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The owning thread's view of a graph.
//!
//! [`MediaStreamGraph`] is a cheap, cloneable handle. Every mutation becomes a
//! [`ControlMessage`] appended to the current task's batch; the batch is handed
//! to the scheduler by [`MediaStreamGraph::run_in_stable_state`], which is also
//! where stream state published by the scheduler reaches main-thread listeners
//! and subscribers, and where the lifecycle moves on (thread start, revival,
//! teardown).
//!
//! Lock order is owner state first, then the monitor. The scheduler thread
//! never takes the owner lock, and no listener is called with either held.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use mediagraph_core::listener::same_listener;
use mediagraph_core::segment::MediaSegment;
use mediagraph_core::time::seconds_to_media_time;
use mediagraph_core::{
    AudioOutputBackend, GraphError, LifecycleState, MainThreadListener, MixerCallback, NullAudioBackend, PortFlags,
    PortId, Result, StreamId, StreamListener, StreamStateUpdate, StreamTime, TrackId, TrackRate, TrackTicks,
    VideoSink,
};

use crate::config::GraphConfig;
use crate::constants::{GRAPH_THREAD_NAME, SHUTDOWN_TIMEOUT_MS};
use crate::driver::{run_thread, GraphShared, IterationWaker};
use crate::graph::{GraphEngine, StreamMemoryUsage};
use crate::messages::{ControlMessage, MessageBlock};
use crate::port::MediaInputPort;
use crate::processed::{ProcessedStream, ProcessorSpec};
use crate::source::{NotEnoughBufferedCallback, SourceInput, SourceStream};
use crate::stream::{AudioOutputKey, MediaStream, StreamKind};

/// Last state the scheduler published for a stream.
#[derive(Debug, Clone, Copy, Default)]
struct StreamMirror {
    current_time: StreamTime,
    finished: bool,
    graph_update_index: u64,
}

struct OwnerState {
    /// Messages appended during the current task.
    current_task_messages: Vec<ControlMessage>,
    next_graph_update_index: u64,
    /// Set once the scheduler stopped for good; messages then run immediately.
    detected_not_running: bool,
    thread: Option<JoinHandle<()>>,
    mirrors: HashMap<StreamId, StreamMirror>,
    main_thread_listeners: HashMap<StreamId, Vec<Arc<dyn MainThreadListener>>>,
    subscribers: Vec<mpsc::Sender<StreamStateUpdate>>,
}

struct GraphInner {
    shared: Arc<GraphShared>,
    owner: Mutex<OwnerState>,
}

/// Handle to a media stream graph, used from its owning thread.
#[derive(Clone)]
pub struct MediaStreamGraph {
    inner: Arc<GraphInner>,
}

impl std::fmt::Debug for MediaStreamGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamGraph")
            .field("realtime", &self.inner.shared.realtime)
            .field("lifecycle", &self.lifecycle_state())
            .finish()
    }
}

/// What the stable-state pass decided to do once the locks are released.
#[derive(Default)]
struct StablePlan {
    start_thread: bool,
    begin_shutdown: bool,
    shutdown_messages: Vec<ControlMessage>,
    notifications: Vec<(Arc<dyn MainThreadListener>, StreamStateUpdate)>,
}

impl MediaStreamGraph {
    /// Creates a realtime graph playing through `backend`. The scheduler
    /// thread starts with the first stable state that has work for it.
    pub fn new_realtime(config: GraphConfig, backend: Arc<dyn AudioOutputBackend>) -> Result<Self> {
        Self::new(config, true, backend)
    }

    /// Creates an offline graph. Nothing runs until
    /// [`start_non_realtime_processing`](Self::start_non_realtime_processing).
    pub fn create_non_realtime(config: GraphConfig) -> Result<Self> {
        Self::new(config, false, Arc::new(NullAudioBackend))
    }

    fn new(config: GraphConfig, realtime: bool, backend: Arc<dyn AudioOutputBackend>) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(GraphShared::new(config.clone(), realtime));
        let engine = GraphEngine::new(config, realtime, backend, waker_for(&shared));
        shared.monitor.lock().engine = Some(engine);
        tracing::info!(realtime, sample_rate = shared.config.sample_rate, "Created media graph");

        Ok(Self {
            inner: Arc::new(GraphInner {
                shared,
                owner: Mutex::new(OwnerState {
                    current_task_messages: Vec::new(),
                    next_graph_update_index: 1,
                    detected_not_running: false,
                    thread: None,
                    mirrors: HashMap::new(),
                    main_thread_listeners: HashMap::new(),
                    subscribers: Vec::new(),
                }),
            }),
        })
    }

    pub fn is_realtime(&self) -> bool {
        self.inner.shared.realtime
    }

    pub fn sample_rate(&self) -> TrackRate {
        self.inner.shared.config.sample_rate
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.shared.monitor.lock().lifecycle
    }

    pub(crate) fn same_graph(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn waker(&self) -> Weak<dyn IterationWaker> {
        waker_for(&self.inner.shared)
    }

    // === Control messages ===

    /// Queues a message for the current task's batch. Once the scheduler has
    /// stopped for good the message's shutdown fallback runs right away.
    pub(crate) fn append_message(&self, message: ControlMessage) {
        let mut owner = self.inner.owner.lock();
        if owner.detected_not_running {
            let lifecycle = self.inner.shared.monitor.lock().lifecycle;
            if lifecycle > LifecycleState::WaitingForMainThreadCleanup {
                drop(owner);
                self.run_during_shutdown(vec![message]);
                return;
            }
        }
        owner.current_task_messages.push(message);
    }

    /// Runs shutdown fallbacks against the parked engine, if there still is
    /// one, without holding the monitor.
    fn run_during_shutdown(&self, messages: Vec<ControlMessage>) {
        if messages.is_empty() {
            return;
        }
        let mut engine = self.inner.shared.monitor.lock().engine.take();
        for message in messages {
            message.run_during_shutdown(engine.as_mut());
        }
        if let Some(engine) = engine {
            self.inner.shared.monitor.lock().engine = Some(engine);
        }
    }

    /// Runs `f` and flushes everything it appended as one batch, applied by
    /// the scheduler at a single graph time.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> Result<R> {
        let result = f(self);
        self.run_in_stable_state()?;
        Ok(result)
    }

    /// Ends the current task: hands its messages to the scheduler as one
    /// batch, delivers published stream state and advances the lifecycle.
    #[allow(clippy::cognitive_complexity)]
    pub fn run_in_stable_state(&self) -> Result<()> {
        let shared = &self.inner.shared;
        let mut owner = self.inner.owner.lock();
        let mut plan = StablePlan::default();
        let updates = {
            let mut state = shared.monitor.lock();
            state.stable_state_posted = false;
            let updates = std::mem::take(&mut state.stream_updates);

            let has_work = !owner.current_task_messages.is_empty() || !state.message_queue.is_empty();
            if state.lifecycle == LifecycleState::ThreadNotStarted
                && !state.force_shutdown
                && ((shared.realtime && has_work) || state.non_realtime_processing)
            {
                state.lifecycle = LifecycleState::Running;
                plan.start_thread = true;
            }

            if owner.current_task_messages.is_empty() {
                if state.lifecycle == LifecycleState::WaitingForMainThreadCleanup
                    && state.message_queue.is_empty()
                    && state.engine.as_ref().is_none_or(GraphEngine::is_empty)
                {
                    tracing::info!("Media graph is empty, shutting down");
                    state.lifecycle = LifecycleState::WaitingForThreadShutdown;
                    plan.begin_shutdown = true;
                }
            } else if state.lifecycle <= LifecycleState::WaitingForMainThreadCleanup {
                let messages = std::mem::take(&mut owner.current_task_messages);
                let graph_update_index = owner.next_graph_update_index;
                owner.next_graph_update_index += 1;
                tracing::trace!(graph_update_index, count = messages.len(), "Queueing control batch");
                state.message_queue.push(MessageBlock { graph_update_index, messages });
                shared.ensure_next_iteration_locked(&mut state);

                if state.lifecycle == LifecycleState::WaitingForMainThreadCleanup
                    && shared.realtime
                    && !state.force_shutdown
                {
                    tracing::info!("Reviving media graph thread");
                    state.lifecycle = LifecycleState::Running;
                    plan.start_thread = true;
                }
            } else {
                plan.shutdown_messages.append(&mut owner.current_task_messages);
            }

            if (state.force_shutdown || !shared.realtime)
                && state.lifecycle == LifecycleState::WaitingForMainThreadCleanup
            {
                for block in std::mem::take(&mut state.message_queue) {
                    plan.shutdown_messages.extend(block.messages);
                }
                tracing::info!(forced = state.force_shutdown, "Shutting down media graph");
                state.lifecycle = LifecycleState::WaitingForThreadShutdown;
                plan.begin_shutdown = true;
            }
            owner.detected_not_running = state.lifecycle > LifecycleState::Running;
            updates
        };

        plan.notifications = Self::apply_stream_updates(&mut owner, updates);
        let previous_thread = if plan.start_thread || plan.begin_shutdown { owner.thread.take() } else { None };
        if let Some(thread) = previous_thread {
            join_thread(thread);
        }
        let spawn_result = if plan.start_thread {
            match self.spawn_thread() {
                Ok(thread) => {
                    owner.thread = Some(thread);
                    Ok(())
                },
                Err(e) => {
                    shared.monitor.lock().lifecycle = LifecycleState::WaitingForMainThreadCleanup;
                    Err(e)
                },
            }
        } else {
            Ok(())
        };
        drop(owner);

        for (listener, update) in &plan.notifications {
            listener.notify_main_thread_state_changed(update);
        }
        if plan.begin_shutdown {
            self.finish_shutdown(plan.shutdown_messages);
        } else {
            self.run_during_shutdown(plan.shutdown_messages);
        }
        spawn_result
    }

    fn spawn_thread(&self) -> Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.inner.shared);
        let thread = std::thread::Builder::new()
            .name(GRAPH_THREAD_NAME.to_string())
            .spawn(move || run_thread(&shared))?;
        Ok(thread)
    }

    /// Mirrors published state and fans it out to subscribers. Returns the
    /// main-thread listener calls to make once the owner lock is released.
    fn apply_stream_updates(
        owner: &mut OwnerState,
        updates: Vec<StreamStateUpdate>,
    ) -> Vec<(Arc<dyn MainThreadListener>, StreamStateUpdate)> {
        let mut notifications = Vec::new();
        for update in updates {
            // Destroyed since the scheduler published this.
            let Some(mirror) = owner.mirrors.get_mut(&update.stream) else {
                continue;
            };
            mirror.current_time = update.current_time;
            mirror.finished = update.finished;
            mirror.graph_update_index = update.graph_update_index;

            if let Some(listeners) = owner.main_thread_listeners.get(&update.stream) {
                notifications.extend(listeners.iter().map(|l| (Arc::clone(l), update.clone())));
            }
            owner.subscribers.retain(|subscriber| match subscriber.try_send(update.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(stream = %update.stream, "Subscriber lagging, dropping state update");
                    true
                },
                Err(TrySendError::Closed(_)) => false,
            });
        }
        notifications
    }

    /// Tears the graph down once the scheduler thread has stopped.
    fn finish_shutdown(&self, shutdown_messages: Vec<ControlMessage>) {
        let shared = &self.inner.shared;
        let engine = shared.monitor.lock().engine.take();
        if let Some(mut engine) = engine {
            for message in shutdown_messages {
                message.run_during_shutdown(Some(&mut engine));
            }
            engine.destroy_all_streams();
        } else {
            for message in shutdown_messages {
                message.run_during_shutdown(None);
            }
        }

        {
            // Mirrors keep their last published state.
            let mut owner = self.inner.owner.lock();
            owner.main_thread_listeners.clear();
            owner.subscribers.clear();
            owner.detected_not_running = true;
        }
        let mut state = shared.monitor.lock();
        state.lifecycle = LifecycleState::Destroyed;
        shared.owner_cond.notify_all();
        tracing::info!("Media graph destroyed");
    }

    /// Waits up to `timeout` for the scheduler to publish work for the owner,
    /// then runs the stable state. Returns whether anything was published.
    pub fn wait_for_stable_state_event(&self, timeout: Duration) -> Result<bool> {
        let posted = {
            let mut state = self.inner.shared.monitor.lock();
            if !state.stable_state_posted && state.lifecycle < LifecycleState::Destroyed {
                let _ = self.inner.shared.owner_cond.wait_for(&mut state, timeout);
            }
            state.stable_state_posted
        };
        self.run_in_stable_state()?;
        Ok(posted)
    }

    /// Keeps running stable states until the graph is destroyed.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_in_stable_state()?;
            let mut state = self.inner.shared.monitor.lock();
            if state.lifecycle == LifecycleState::Destroyed {
                return Ok(());
            }
            if !state.stable_state_posted
                && self.inner.shared.owner_cond.wait_until(&mut state, deadline).timed_out()
                && !state.stable_state_posted
                && state.lifecycle != LifecycleState::Destroyed
            {
                return Err(GraphError::Timeout(format!("graph still {:?} at shutdown deadline", state.lifecycle)));
            }
        }
    }

    // === Lifecycle ===

    /// Asks the scheduler to stop after its current iteration. Streams are
    /// destroyed by the stable state that follows.
    pub fn force_shutdown(&self) {
        let shared = &self.inner.shared;
        let mut state = shared.monitor.lock();
        if state.lifecycle >= LifecycleState::WaitingForThreadShutdown {
            return;
        }
        tracing::info!(lifecycle = ?state.lifecycle, "Forcing media graph shutdown");
        state.force_shutdown = true;
        if state.lifecycle == LifecycleState::ThreadNotStarted {
            // Never ran: the engine is already parked.
            state.lifecycle = LifecycleState::WaitingForMainThreadCleanup;
        }
        shared.ensure_next_iteration_locked(&mut state);
        shared.post_stable_state_event(&mut state);
    }

    /// Forces shutdown and waits until the graph is destroyed.
    pub fn shutdown(&self) -> Result<()> {
        self.force_shutdown();
        self.wait_for_shutdown(Duration::from_millis(SHUTDOWN_TIMEOUT_MS))
    }

    /// Starts an offline graph, processing `duration` of graph time as fast
    /// as possible.
    pub fn start_non_realtime_processing(&self, duration: Duration) -> Result<()> {
        if self.is_realtime() {
            return Err(GraphError::Configuration("realtime graphs start on their own".to_string()));
        }
        {
            let mut state = self.inner.shared.monitor.lock();
            if state.lifecycle > LifecycleState::Running || state.force_shutdown {
                return Err(GraphError::Shutdown("cannot start processing".to_string()));
            }
            if state.non_realtime_processing {
                return Ok(());
            }
            let start = state.engine.as_ref().map_or(0, |e| e.current_time);
            state.pending_end_time = Some(start + seconds_to_media_time(duration.as_secs_f64()));
            state.non_realtime_processing = true;
        }
        self.run_in_stable_state()
    }

    /// Shuts an offline graph down, whether or not it finished processing.
    pub fn destroy_non_realtime(&self) -> Result<()> {
        if self.is_realtime() {
            return Err(GraphError::Configuration("not an offline graph".to_string()));
        }
        self.shutdown()
    }

    // === Streams ===

    fn register_stream(&self, id: StreamId) {
        self.inner.owner.lock().mirrors.insert(id, StreamMirror::default());
    }

    fn next_stream_id(&self) -> StreamId {
        StreamId::new(self.inner.shared.allocate_stream_id())
    }

    /// Creates a stream fed by producer threads.
    pub fn create_source_stream(&self) -> SourceStreamHandle {
        let id = self.next_stream_id();
        let input = Arc::new(SourceInput::new(id, self.sample_rate(), self.waker()));
        let stream = MediaStream::new(id, StreamKind::Source(SourceStream::new(Arc::clone(&input))));
        self.register_stream(id);
        self.append_message(ControlMessage::CreateStream(Box::new(stream)));
        tracing::debug!(stream = %id, "Created source stream");
        SourceStreamHandle { stream: StreamHandle { graph: self.clone(), id }, input }
    }

    /// Creates a stream computed from its input ports.
    pub fn create_processed_stream(&self, spec: ProcessorSpec) -> ProcessedStreamHandle {
        let id = self.next_stream_id();
        let stream = MediaStream::new(id, StreamKind::Processed(ProcessedStream::new(spec, self.sample_rate())));
        self.register_stream(id);
        self.append_message(ControlMessage::CreateStream(Box::new(stream)));
        tracing::debug!(stream = %id, ?spec, "Created processed stream");
        ProcessedStreamHandle { stream: StreamHandle { graph: self.clone(), id } }
    }

    pub fn create_track_union_stream(&self) -> ProcessedStreamHandle {
        self.create_processed_stream(ProcessorSpec::TrackUnion)
    }

    pub fn create_mixer_stream(&self, channels: u16) -> ProcessedStreamHandle {
        self.create_processed_stream(ProcessorSpec::Mixer { channels })
    }

    pub fn create_delay_stream(&self, delay: Duration, channels: u16) -> ProcessedStreamHandle {
        self.create_processed_stream(ProcessorSpec::Delay { delay, channels })
    }

    // === Observation ===

    /// Receives every published [`StreamStateUpdate`]. Updates to a full
    /// channel are dropped.
    pub fn subscribe_state(&self) -> mpsc::Receiver<StreamStateUpdate> {
        let (tx, rx) = mpsc::channel(self.inner.shared.config.subscriber_capacity);
        self.inner.owner.lock().subscribers.push(tx);
        rx
    }

    pub fn add_mixer_callback(&self, callback: Arc<dyn MixerCallback>) {
        self.append_message(ControlMessage::AddMixerCallback(callback));
    }

    pub fn remove_mixer_callback(&self, callback: Arc<dyn MixerCallback>) {
        self.append_message(ControlMessage::RemoveMixerCallback(callback));
    }

    /// Memory held by every stream's buffers, measured on the scheduler
    /// thread. Waits up to `memory_report_timeout_ms`.
    pub fn collect_memory_report(&self) -> Result<Vec<StreamMemoryUsage>> {
        let shared = &self.inner.shared;
        {
            let state = shared.monitor.lock();
            if state.lifecycle == LifecycleState::Destroyed {
                return Err(GraphError::Shutdown("memory report".to_string()));
            }
            if state.lifecycle != LifecycleState::Running {
                return Ok(state.engine.as_ref().map(GraphEngine::memory_report).unwrap_or_default());
            }
        }

        {
            let mut report = shared.memory_report.lock();
            report.requested = true;
            report.report = None;
        }
        // Never hold both locks: the scheduler answers with the monitor held.
        shared.ensure_next_iteration();

        let deadline = Instant::now() + Duration::from_millis(shared.config.memory_report_timeout_ms);
        let mut report = shared.memory_report.lock();
        loop {
            if let Some(usage) = report.report.take() {
                return Ok(usage);
            }
            // Spurious wakeups just poll again.
            if shared.memory_report_cond.wait_until(&mut report, deadline).timed_out() {
                if let Some(usage) = report.report.take() {
                    return Ok(usage);
                }
                report.requested = false;
                return Err(GraphError::Timeout("memory report".to_string()));
            }
        }
    }

    fn stream_mirror(&self, id: StreamId) -> Option<StreamMirror> {
        self.inner.owner.lock().mirrors.get(&id).copied()
    }
}

fn waker_for(shared: &Arc<GraphShared>) -> Weak<dyn IterationWaker> {
    let weak: Weak<GraphShared> = Arc::downgrade(shared);
    weak
}

fn join_thread(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        tracing::error!("Media graph thread panicked");
    }
}

/// A stream of a particular graph, as seen from the owning thread.
#[derive(Clone)]
pub struct StreamHandle {
    graph: MediaStreamGraph,
    id: StreamId,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").field("id", &self.id).finish()
    }
}

impl StreamHandle {
    pub const fn id(&self) -> StreamId {
        self.id
    }

    pub const fn graph(&self) -> &MediaStreamGraph {
        &self.graph
    }

    pub fn add_listener(&self, listener: Arc<dyn StreamListener>) {
        self.graph.append_message(ControlMessage::AddListener { stream: self.id, listener });
    }

    pub fn remove_listener(&self, listener: Arc<dyn StreamListener>) {
        self.graph.append_message(ControlMessage::RemoveListener { stream: self.id, listener });
    }

    /// Called on the owning thread after each state update for this stream.
    pub fn add_main_thread_listener(&self, listener: Arc<dyn MainThreadListener>) {
        let mut owner = self.graph.inner.owner.lock();
        owner.main_thread_listeners.entry(self.id).or_default().push(listener);
    }

    pub fn remove_main_thread_listener(&self, listener: &Arc<dyn MainThreadListener>) {
        let mut owner = self.graph.inner.owner.lock();
        if let Some(listeners) = owner.main_thread_listeners.get_mut(&self.id) {
            listeners.retain(|l| !same_listener(l, listener));
        }
    }

    /// Adds (`delta > 0`) or removes explicit blockers. A stream with any
    /// blocker is blocked from the next batch's graph time on.
    pub fn change_explicit_blocker_count(&self, delta: i32) {
        self.graph.append_message(ControlMessage::ChangeExplicitBlockerCount { stream: self.id, delta });
    }

    pub fn add_audio_output(&self, key: AudioOutputKey) {
        self.graph.append_message(ControlMessage::AddAudioOutput { stream: self.id, key });
    }

    pub fn set_audio_output_volume(&self, key: AudioOutputKey, volume: f32) {
        self.graph.append_message(ControlMessage::SetAudioOutputVolume { stream: self.id, key, volume });
    }

    pub fn remove_audio_output(&self, key: AudioOutputKey) {
        self.graph.append_message(ControlMessage::RemoveAudioOutput { stream: self.id, key });
    }

    pub fn add_video_output(&self, sink: Arc<dyn VideoSink>) {
        self.graph.append_message(ControlMessage::AddVideoOutput { stream: self.id, sink });
    }

    pub fn remove_video_output(&self, sink: Arc<dyn VideoSink>) {
        self.graph.append_message(ControlMessage::RemoveVideoOutput { stream: self.id, sink });
    }

    /// Disabled tracks keep their timing but carry silence or black frames.
    pub fn set_track_enabled(&self, track: TrackId, enabled: bool) {
        self.graph.append_message(ControlMessage::SetTrackEnabled { stream: self.id, track, enabled });
    }

    /// Removes the stream from the graph. Its listeners get
    /// [`StreamEvent::Removed`](mediagraph_core::StreamEvent::Removed).
    pub fn destroy(&self) {
        self.destroy_with(None);
    }

    fn destroy_with(&self, source: Option<Arc<SourceInput>>) {
        {
            let mut owner = self.graph.inner.owner.lock();
            owner.mirrors.remove(&self.id);
            owner.main_thread_listeners.remove(&self.id);
        }
        self.graph.append_message(ControlMessage::DestroyStream { stream: self.id, source });
    }

    /// Stream time at the graph's current time, as last published.
    pub fn current_time(&self) -> StreamTime {
        self.graph.stream_mirror(self.id).map_or(0, |m| m.current_time)
    }

    /// Finished and every listener has been told.
    pub fn is_finished(&self) -> bool {
        self.graph.stream_mirror(self.id).is_some_and(|m| m.finished)
    }

    /// Latest control batch in effect at the stream's current time.
    pub fn graph_update_index(&self) -> u64 {
        self.graph.stream_mirror(self.id).map_or(0, |m| m.graph_update_index)
    }
}

/// A stream whose tracks are fed by producer threads.
///
/// The producer operations only take the source's own lock and may be called
/// from any thread. Graph mutations still go through the owning thread.
#[derive(Clone)]
pub struct SourceStreamHandle {
    stream: StreamHandle,
    input: Arc<SourceInput>,
}

impl Deref for SourceStreamHandle {
    type Target = StreamHandle;

    fn deref(&self) -> &StreamHandle {
        &self.stream
    }
}

impl std::fmt::Debug for SourceStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStreamHandle").field("id", &self.stream.id).finish()
    }
}

impl SourceStreamHandle {
    /// Adds a track whose data begins at `start` (in `rate` ticks). Audio is
    /// converted to the graph rate.
    pub fn add_track(&self, track: TrackId, rate: TrackRate, start: TrackTicks, segment: MediaSegment) {
        self.input.add_track(track, rate, start, segment);
    }

    /// Returns false once the stream is finished or the track is unknown.
    pub fn append_to_track(&self, track: TrackId, segment: MediaSegment) -> bool {
        self.input.append_to_track(track, segment)
    }

    pub fn end_track(&self, track: TrackId) {
        self.input.end_track(track);
    }

    /// Promises no new tracks will start before `time` (stream time).
    pub fn advance_known_tracks_time(&self, time: StreamTime) {
        self.input.advance_known_tracks_time(time);
    }

    pub fn finish(&self) {
        self.input.finish();
    }

    pub fn end_all_tracks_and_finish(&self) {
        self.input.end_all_tracks_and_finish();
    }

    /// With pulling enabled, listeners get `notify_pull` before data is needed.
    pub fn set_pull_enabled(&self, enabled: bool) {
        self.input.set_pull_enabled(enabled);
    }

    pub fn have_enough_buffered(&self, track: TrackId) -> bool {
        self.input.have_enough_buffered(track)
    }

    pub fn dispatch_when_not_enough_buffered(&self, track: TrackId, callback: NotEnoughBufferedCallback) {
        self.input.dispatch_when_not_enough_buffered(track, callback);
    }

    /// Makes the graph own an audio mixer while any source needs one.
    pub fn set_needs_mixing(&self, needs_mixing: bool) {
        self.stream
            .graph
            .append_message(ControlMessage::SetNeedsMixing { source: Arc::clone(&self.input), needs_mixing });
    }

    pub fn destroy(&self) {
        self.stream.destroy_with(Some(Arc::clone(&self.input)));
    }

    pub fn as_stream(&self) -> &StreamHandle {
        &self.stream
    }
}

/// A stream computed from its input ports.
#[derive(Clone, Debug)]
pub struct ProcessedStreamHandle {
    stream: StreamHandle,
}

impl Deref for ProcessedStreamHandle {
    type Target = StreamHandle;

    fn deref(&self) -> &StreamHandle {
        &self.stream
    }
}

impl ProcessedStreamHandle {
    /// Connects `source` into this stream.
    pub fn allocate_input_port(&self, source: &StreamHandle, flags: PortFlags) -> Result<InputPortHandle> {
        if !self.stream.graph.same_graph(&source.graph) {
            return Err(GraphError::UnknownStream(source.id));
        }
        let id = PortId::new(self.stream.graph.inner.shared.allocate_port_id());
        self.stream.graph.append_message(ControlMessage::CreateInputPort(MediaInputPort {
            id,
            source: source.id,
            dest: self.stream.id,
            flags,
        }));
        tracing::debug!(port = %id, source = %source.id, dest = %self.stream.id, "Allocated input port");
        Ok(InputPortHandle { graph: self.stream.graph.clone(), id })
    }

    /// Ends every output track; the stream finishes once played out.
    pub fn finish(&self) {
        self.stream.graph.append_message(ControlMessage::Finish(self.stream.id));
    }

    /// Finish automatically once every input has finished.
    pub fn set_autofinish(&self, autofinish: bool) {
        self.stream.graph.append_message(ControlMessage::SetAutofinish { stream: self.stream.id, autofinish });
    }

    pub fn as_stream(&self) -> &StreamHandle {
        &self.stream
    }
}

/// A connection between two streams.
#[derive(Clone)]
pub struct InputPortHandle {
    graph: MediaStreamGraph,
    id: PortId,
}

impl std::fmt::Debug for InputPortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPortHandle").field("id", &self.id).finish()
    }
}

impl InputPortHandle {
    pub const fn id(&self) -> PortId {
        self.id
    }

    pub fn destroy(&self) {
        self.graph.append_message(ControlMessage::DestroyInputPort(self.id));
    }
}
