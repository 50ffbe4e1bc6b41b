// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use mediagraph_core::time::{milliseconds_to_media_time, STREAM_TIME_MAX};
use mediagraph_core::{Consumption, PortFlags, StreamEvent, StreamListener, StreamTime};

use super::support::{tone, TestGraph};
use crate::messages::ControlMessage;
use crate::processed::ProcessorSpec;

#[test]
fn test_not_enough_buffered_fires_as_data_drains() {
    let mut graph = TestGraph::offline();
    // 100ms of audio; producers want 60ms buffered ahead.
    let (_source, input) = graph.add_tone_source(1, 4_800, 0.5);
    graph.iterate();
    assert!(input.have_enough_buffered(1));

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    input.dispatch_when_not_enough_buffered(1, Box::new(move || flag.store(true, Ordering::SeqCst)));
    assert!(!fired.load(Ordering::SeqCst));

    for _ in 0..8 {
        graph.iterate();
    }

    assert!(fired.load(Ordering::SeqCst));
    assert!(!input.have_enough_buffered(1));
}

#[derive(Default)]
struct PullListener {
    pulls: AtomicUsize,
    last: parking_lot::Mutex<Option<Consumption>>,
}

impl StreamListener for PullListener {
    fn notify_pull(&self, _desired_time: StreamTime) {
        self.pulls.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_consumption_changed(&self, consumption: Consumption) {
        *self.last.lock() = Some(consumption);
    }
}

#[test]
fn test_pull_and_consumption_notifications() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_source();
    input.add_track(1, 48_000, 0, tone(0, 0.0));
    input.set_pull_enabled(true);
    let listener = Arc::new(PullListener::default());
    if let Some(stream) = graph.engine.streams.get_mut(&source) {
        stream.add_listener(listener.clone());
    }

    graph.iterate();
    assert!(listener.pulls.load(Ordering::SeqCst) > 0);
    assert_eq!(*listener.last.lock(), Some(Consumption::NotConsumed));

    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    graph.iterate_with(vec![ControlMessage::AddAudioOutput { stream: union, key: 7 }]);
    assert_eq!(*listener.last.lock(), Some(Consumption::Consumed));
}

#[test]
fn test_finished_source_is_reported_once() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_tone_source(1, 480, 0.5);
    let listener = graph.listen(source);
    input.end_all_tracks_and_finish();
    assert!(!input.append_to_track(1, tone(480, 0.5)));

    for _ in 0..6 {
        graph.iterate();
    }

    assert!(graph.stream(source).notified_finished);
    assert_eq!(listener.count(StreamEvent::Finished), 1);
    let Some(updates) = graph.engine.prepare_updates(true, std::time::Instant::now()) else {
        panic!("final update is never throttled");
    };
    let Some(update) = updates.iter().find(|u| u.stream == source) else {
        panic!("missing update for source");
    };
    assert!(update.finished);
}

#[test]
fn test_destroyed_source_tells_listeners_and_producers() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_tone_source(1, 480, 0.5);
    let listener = graph.listen(source);
    graph.iterate();

    graph.iterate_with(vec![ControlMessage::DestroyStream { stream: source, source: Some(Arc::clone(&input)) }]);

    assert!(!graph.engine.streams.contains_key(&source));
    assert_eq!(listener.count(StreamEvent::Removed), 1);
    assert!(!input.append_to_track(1, tone(480, 0.5)));
    input.advance_known_tracks_time(STREAM_TIME_MAX);
    assert!(graph.engine.is_empty());
}

#[test]
fn test_output_is_reported_once_per_advancing_iteration() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 96_000, 0.5);
    let listener = graph.listen(source);
    let one_second = milliseconds_to_media_time(1_000);

    let mut advanced_to = Vec::new();
    for _ in 0..200 {
        if graph.engine.current_time >= one_second {
            break;
        }
        let before = graph.engine.current_time;
        graph.iterate();
        if graph.engine.current_time > before {
            advanced_to.push(graph.engine.current_time);
        }
    }

    assert!(graph.engine.current_time >= one_second);
    let period = milliseconds_to_media_time(10);
    assert_eq!(advanced_to.first().copied(), Some(period));
    assert!(advanced_to.windows(2).all(|w| w[1] - w[0] == period));
    let outputs = listener.outputs.lock();
    assert_eq!(*outputs, advanced_to);
    assert!(outputs.windows(2).all(|w| w[0] < w[1]));
}
