// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use mediagraph_core::PortFlags;

use super::support::TestGraph;
use crate::processed::ProcessorSpec;
use crate::stream::AudioOutput;

#[test]
fn test_chain_orders_inputs_first() {
    let mut graph = TestGraph::offline();
    // Created downstream-first so the order can't come from insertion.
    let last = graph.add_processed(ProcessorSpec::TrackUnion);
    let middle = graph.add_processed(ProcessorSpec::TrackUnion);
    let (source, _input) = graph.add_source();
    graph.connect(middle, last, PortFlags::NONE);
    graph.connect(source, middle, PortFlags::NONE);

    graph.engine.update_stream_order();

    assert!(graph.position(source) < graph.position(middle));
    assert!(graph.position(middle) < graph.position(last));
    assert_eq!(graph.engine.first_cycle_breaker, 3);
    assert!(!graph.engine.stream_order_dirty);
    for id in [middle, last] {
        let Some(processed) = graph.stream(id).as_processed() else {
            panic!("expected processed stream");
        };
        assert!(!processed.in_muted_cycle());
    }
}

#[test]
fn test_cycle_without_delay_is_muted() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_source();
    let a = graph.add_processed(ProcessorSpec::TrackUnion);
    let b = graph.add_processed(ProcessorSpec::TrackUnion);
    let after = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, a, PortFlags::NONE);
    graph.connect(b, a, PortFlags::NONE);
    graph.connect(a, b, PortFlags::NONE);
    graph.connect(b, after, PortFlags::NONE);

    graph.engine.update_stream_order();

    for id in [a, b] {
        let Some(processed) = graph.stream(id).as_processed() else {
            panic!("expected processed stream");
        };
        assert!(processed.in_muted_cycle(), "{id} should be muted");
    }
    let Some(after_processed) = graph.stream(after).as_processed() else {
        panic!("expected processed stream");
    };
    assert!(!after_processed.in_muted_cycle());
    assert!(graph.position(a) < graph.position(after));
    assert!(graph.position(b) < graph.position(after));
    assert_eq!(graph.engine.stream_order.len(), 4);
}

#[test]
fn test_delay_breaks_cycle_and_moves_to_tail() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_source();
    let mixer = graph.add_processed(ProcessorSpec::Mixer { channels: 1 });
    let delay = graph.add_processed(ProcessorSpec::Delay { delay: Duration::from_millis(10), channels: 1 });
    graph.connect(source, mixer, PortFlags::NONE);
    graph.connect(delay, mixer, PortFlags::NONE);
    graph.connect(mixer, delay, PortFlags::NONE);

    graph.engine.update_stream_order();

    assert_eq!(graph.engine.stream_order, vec![source, mixer, delay]);
    assert_eq!(graph.engine.first_cycle_breaker, 2);
    for id in [mixer, delay] {
        let Some(processed) = graph.stream(id).as_processed() else {
            panic!("expected processed stream");
        };
        assert!(!processed.in_muted_cycle(), "{id} should not be muted");
    }
}

#[test]
fn test_playing_a_stream_consumes_its_inputs() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_source();
    let (unused, _unused_input) = graph.add_source();
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    graph.connect(source, union, PortFlags::NONE);
    if let Some(stream) = graph.engine.streams.get_mut(&union) {
        stream.audio_outputs.push(AudioOutput { key: 1, volume: 1.0 });
    }

    graph.engine.update_stream_order();

    assert!(graph.stream(union).is_consumed);
    assert!(graph.stream(source).is_consumed);
    assert!(!graph.stream(unused).is_consumed);
}

#[test]
fn test_removing_stream_disconnects_ports() {
    let mut graph = TestGraph::offline();
    let (source, _input) = graph.add_source();
    let union = graph.add_processed(ProcessorSpec::TrackUnion);
    let port = graph.connect(source, union, PortFlags::NONE);

    graph.engine.remove_stream(source);

    assert!(!graph.engine.ports.contains_key(&port));
    let Some(processed) = graph.stream(union).as_processed() else {
        panic!("expected processed stream");
    };
    assert!(processed.inputs.is_empty());
    assert!(graph.engine.stream_order_dirty);
    graph.engine.update_stream_order();
    assert_eq!(graph.engine.stream_order, vec![union]);
}
