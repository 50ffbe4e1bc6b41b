// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use mediagraph_core::time::{milliseconds_to_media_time, GRAPH_TIME_MAX, STREAM_TIME_MAX};
use mediagraph_core::{Blocking, PortFlags};

use super::support::{tone, TestGraph};
use crate::messages::ControlMessage;
use crate::processed::ProcessorSpec;

#[test]
fn test_source_without_data_blocks() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_source();
    input.add_track(1, 48_000, 0, tone(0, 0.0));
    input.advance_known_tracks_time(STREAM_TIME_MAX);

    graph.iterate();

    assert!(graph.engine.state_computed_time > 0);
    assert!(*graph.stream(source).blocked.get_at(0));
}

#[test]
fn test_source_with_data_plays() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 48_000, 0.5);

    graph.iterate();

    let computed = graph.engine.state_computed_time;
    assert!(!*graph.stream(source).blocked.get_at(0));
    assert!(!*graph.stream(source).blocked.get_at(computed - 1));
}

#[test]
fn test_block_output_port_spreads_underrun_downstream() {
    let mut graph = TestGraph::offline();
    let (starved, input) = graph.add_source();
    input.add_track(1, 48_000, 0, tone(0, 0.0));
    input.advance_known_tracks_time(STREAM_TIME_MAX);
    let linked = graph.add_processed(ProcessorSpec::TrackUnion);
    let independent = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(starved, linked, PortFlags::BLOCK_OUTPUT);
    graph.connect(starved, independent, PortFlags::NONE);

    graph.iterate();

    assert!(*graph.stream(starved).blocked.get_at(0));
    assert!(*graph.stream(linked).blocked.get_at(0));
    assert!(!*graph.stream(independent).blocked.get_at(0));
}

#[test]
fn test_block_input_port_spreads_upstream() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 48_000, 0.5);
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::BLOCK_INPUT);

    graph.iterate_with(vec![ControlMessage::ChangeExplicitBlockerCount { stream: union, delta: 1 }]);

    assert!(*graph.stream(union).blocked.get_at(0));
    assert!(*graph.stream(source).blocked.get_at(0));
}

#[test]
fn test_explicit_blocker_records_batch_index() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 48_000, 0.5);

    let index = graph.iterate_with(vec![ControlMessage::ChangeExplicitBlockerCount { stream: source, delta: 1 }]);

    let stream = graph.stream(source);
    assert!(*stream.blocked.get_at(0));
    assert_eq!(*stream.graph_update_indices.get_at(0), index);
    assert_eq!(graph.engine.processing_graph_update_index, index);

    let second = graph.iterate_with(vec![ControlMessage::ChangeExplicitBlockerCount { stream: source, delta: -1 }]);
    let computed = graph.engine.state_computed_time;
    let stream = graph.stream(source);
    assert!(!*stream.blocked.get_at(computed - 1));
    assert!(second > index);
}

#[test]
fn test_blocking_changes_are_reported_once() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_source();
    input.add_track(1, 48_000, 0, tone(0, 0.0));
    input.advance_known_tracks_time(STREAM_TIME_MAX);
    let listener = graph.listen(source);

    for _ in 0..4 {
        graph.iterate();
    }

    assert_eq!(*listener.blocking.lock(), vec![Blocking::Blocked]);
}

#[test]
fn test_data_arriving_unblocks_source() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_source();
    input.add_track(1, 48_000, 0, tone(0, 0.0));
    input.advance_known_tracks_time(STREAM_TIME_MAX);
    graph.iterate();
    assert!(*graph.stream(source).blocked.get_at(0));

    assert!(input.append_to_track(1, tone(48_000, 0.25)));
    graph.iterate();

    let computed = graph.engine.state_computed_time;
    assert!(!*graph.stream(source).blocked.get_at(computed - 1));
}

#[test]
fn test_source_reblocks_when_data_runs_out_and_resumes_on_append() {
    let mut graph = TestGraph::offline();
    // 50ms of audio, with more to come.
    let (source, input) = graph.add_tone_source(1, 2_400, 0.5);
    let listener = graph.listen(source);

    graph.iterate();
    graph.iterate();
    assert!(!*graph.stream(source).blocked.get_at(graph.engine.current_time));

    for _ in 0..6 {
        graph.iterate();
    }
    let stream = graph.stream(source);
    assert!(graph.engine.current_time > milliseconds_to_media_time(50));
    assert!(*stream.blocked.get_at(graph.engine.current_time));
    assert!(*stream.blocked.get_at(graph.engine.state_computed_time - 1));
    assert_eq!(*listener.blocking.lock(), vec![Blocking::Blocked]);

    assert!(input.append_to_track(1, tone(4_800, 0.5)));
    for _ in 0..5 {
        graph.iterate();
    }
    assert!(!*graph.stream(source).blocked.get_at(graph.engine.current_time));
    assert_eq!(*listener.blocking.lock(), vec![Blocking::Blocked, Blocking::Unblocked]);
}

#[test]
fn test_finished_source_stays_blocked_after_its_end() {
    let mut graph = TestGraph::offline();
    let (source, input) = graph.add_tone_source(1, 2_400, 0.5);
    input.end_all_tracks_and_finish();
    let listener = graph.listen(source);

    for _ in 0..10 {
        graph.iterate();
    }

    let stream = graph.stream(source);
    assert!(stream.finished);
    let (blocked, end) = stream.blocked.get_at_with_end(graph.engine.current_time);
    assert!(*blocked);
    assert_eq!(end, GRAPH_TIME_MAX);
    assert_eq!(*listener.blocking.lock(), vec![Blocking::Blocked]);
}

#[test]
fn test_removing_explicit_blocker_unblocks_at_computed_time() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_tone_source(1, 48_000, 0.5);
    let listener = graph.listen(source);

    graph.iterate_with(vec![ControlMessage::ChangeExplicitBlockerCount { stream: source, delta: 1 }]);
    for _ in 0..3 {
        graph.iterate();
    }
    assert!(*graph.stream(source).blocked.get_at(graph.engine.state_computed_time - 1));

    let unblock_at = graph.engine.state_computed_time;
    graph.iterate_with(vec![ControlMessage::ChangeExplicitBlockerCount { stream: source, delta: -1 }]);
    let stream = graph.stream(source);
    assert!(graph.engine.current_time < unblock_at);
    assert!(*stream.blocked.get_at(unblock_at - 1));
    assert!(!*stream.blocked.get_at(unblock_at));

    for _ in 0..4 {
        graph.iterate();
    }
    assert!(!*graph.stream(source).blocked.get_at(graph.engine.current_time));
    assert_eq!(*listener.blocking.lock(), vec![Blocking::Blocked, Blocking::Unblocked]);
}
