// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Blocking decisions between the computed horizon and the next one.
//!
//! Streams connected through ports that propagate blocking form a set whose
//! blocking is decided together: if one of them blocks, the block spreads
//! along `BLOCK_OUTPUT` ports downstream and `BLOCK_INPUT` ports upstream.

use mediagraph_core::time::GRAPH_TIME_MAX;
use mediagraph_core::{GraphTime, StreamId, TrailingBlocked};

use crate::graph::GraphEngine;
use crate::stream::MediaStream;

impl GraphEngine {
    /// Decides blocking for every stream over `[state_computed_time,
    /// end_blocking_decisions)` and advances the computed horizon.
    pub(crate) fn recompute_blocking(&mut self, end_blocking_decisions: GraphTime) {
        let mut decisions_will_change = false;
        let order = self.stream_order.clone();
        for stream in self.streams.values_mut() {
            stream.in_blocking_set = false;
        }

        for id in &order {
            let in_set = self.streams.get(id).is_some_and(|s| s.in_blocking_set);
            if !in_set {
                let set = self.blocking_related_streams(*id);
                let mut t = self.state_computed_time;
                while t < end_blocking_decisions {
                    let mut end = GRAPH_TIME_MAX;
                    self.recompute_blocking_at(&set, t, end_blocking_decisions, &mut end);
                    if end < GRAPH_TIME_MAX {
                        decisions_will_change = true;
                    }
                    // Always make progress.
                    t = if end > t { end } else { end_blocking_decisions };
                }
            }

            if let Some(stream) = self.streams.get(id) {
                let (_, end) = stream.blocked.get_at_with_end(self.current_time);
                if end < GRAPH_TIME_MAX {
                    decisions_will_change = true;
                }
            }
        }

        tracing::trace!(
            from = self.state_computed_time,
            to = end_blocking_decisions,
            "Computed blocking decisions"
        );
        self.state_computed_time = end_blocking_decisions;

        if decisions_will_change {
            self.ensure_next_iteration();
        }
    }

    /// Collects the streams whose blocking is linked to `id`'s and flags them
    /// as belonging to a blocking set.
    fn blocking_related_streams(&mut self, id: StreamId) -> Vec<StreamId> {
        let mut set = Vec::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            if stream.in_blocking_set {
                continue;
            }
            stream.in_blocking_set = true;
            set.push(id);
            for port in stream.consumers.iter().filter_map(|p| self.ports.get(p)) {
                if port.flags.propagates_blocking() {
                    pending.push(port.dest);
                }
            }
            if let Some(processed) = stream.as_processed() {
                for port in processed.inputs.iter().filter_map(|p| self.ports.get(p)) {
                    if port.flags.propagates_blocking() {
                        pending.push(port.source);
                    }
                }
            }
        }
        set
    }

    /// Blocks `id` for this phase and spreads the block along ports that
    /// carry it.
    fn mark_stream_blocking(&mut self, id: StreamId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            if stream.block_in_this_phase {
                continue;
            }
            stream.block_in_this_phase = true;
            for port in stream.consumers.iter().filter_map(|p| self.ports.get(p)) {
                if port.flags.block_output {
                    pending.push(port.dest);
                }
            }
            if let Some(processed) = stream.as_processed() {
                for port in processed.inputs.iter().filter_map(|p| self.ports.get(p)) {
                    if port.flags.block_input {
                        pending.push(port.source);
                    }
                }
            }
        }
    }

    /// Decides blocking at `time` for one blocking set. `end` is lowered to
    /// the earliest time at which the decision may change.
    fn recompute_blocking_at(
        &mut self,
        set: &[StreamId],
        time: GraphTime,
        end_blocking_decisions: GraphTime,
        end: &mut GraphTime,
    ) {
        for id in set {
            if let Some(stream) = self.streams.get_mut(id) {
                stream.block_in_this_phase = false;
            }
        }

        let clock = self.clock();
        for id in set {
            let Some(stream) = self.streams.get(id) else {
                continue;
            };

            if stream.finished {
                let end_time = clock.stream_time_to_graph_time(
                    stream.timeline(),
                    stream.buffer.get_all_tracks_end(),
                    TrailingBlocked::Exclude,
                );
                if end_time <= time {
                    tracing::trace!(stream = %id, time, "Blocking finished stream forever");
                    self.mark_stream_blocking(*id);
                    *end = (*end).min(end_blocking_decisions);
                    continue;
                }
                *end = (*end).min(end_time);
            }

            let (count, count_end) = stream.explicit_blocker_count.get_at_with_end(time);
            *end = (*end).min(count_end);
            if *count > 0 {
                tracing::trace!(stream = %id, time, "Stream is explicitly blocked");
                self.mark_stream_blocking(*id);
                continue;
            }

            if self.will_underrun(stream, time, end_blocking_decisions, end) {
                self.mark_stream_blocking(*id);
                *end = (*end).min(end_blocking_decisions);
            }
        }
        debug_assert!(*end > time, "blocking decision failed to advance");

        for id in set {
            if let Some(stream) = self.streams.get_mut(id) {
                let block = stream.block_in_this_phase;
                stream.blocked.set_at_and_after(time, block);
            }
        }
    }

    /// Whether a source stream runs out of buffered data at `time`, or is
    /// already blocked and would run out before the decision horizon.
    fn will_underrun(
        &self,
        stream: &MediaStream,
        time: GraphTime,
        end_blocking_decisions: GraphTime,
        end: &mut GraphTime,
    ) -> bool {
        // Finished streams can't underrun; processed streams always produce.
        if stream.finished || !stream.is_source() {
            return false;
        }
        let buffer_end = self.clock().stream_time_to_graph_time(
            stream.timeline(),
            stream.buffer.get_end(),
            TrailingBlocked::Include,
        );

        if buffer_end <= time {
            tracing::trace!(stream = %stream.id, time, buffer_end, "Stream underrun");
            self.count_underrun();
            return true;
        }
        // Stay blocked rather than play a fragment that ends before the horizon.
        let horizon = end_blocking_decisions + self.config.speculative_underrun_margin();
        if self.config.speculative_underrun && buffer_end <= horizon && *stream.blocked.get_before(time) {
            tracing::trace!(stream = %stream.id, time, buffer_end, "Stream stays blocked, not enough data");
            return true;
        }
        *end = (*end).min(buffer_end);
        false
    }
}
