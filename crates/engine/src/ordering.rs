// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Stream ordering and cycle detection.
//!
//! Streams are ordered so that every stream is processed after its inputs.
//! Cycles are found with an iterative variant of Tarjan's strongly connected
//! components search (Pearce's formulation, which needs only one marker per
//! node). Each processed stream's `cycle_marker` doubles as the visited flag
//! and as its position on the visit stack:
//!
//! - [`NOT_VISITED`]: not yet reached by the search.
//! - values above [`IN_MUTED_CYCLE`]: on the visit stack, decreasing with depth.
//! - `0`: ordered and not in a cycle.
//! - [`IN_MUTED_CYCLE`]: ordered, part of a cycle without a delay node.
//!
//! When a component contains delay nodes they are moved to the tail of the
//! order and excluded from the graph, and the rest of the component is
//! searched again. A component without delay nodes is muted.

use std::collections::VecDeque;

use mediagraph_core::StreamId;

use crate::graph::GraphEngine;
use crate::mixer::AudioMixer;
use crate::stream::StreamKind;

pub(crate) const NOT_VISITED: u32 = u32::MAX;
pub(crate) const IN_MUTED_CYCLE: u32 = 1;

fn remove_from(stack: &mut VecDeque<StreamId>, id: StreamId) {
    if let Some(index) = stack.iter().position(|s| *s == id) {
        stack.remove(index);
    }
}

impl GraphEngine {
    fn cycle_marker(&self, id: StreamId) -> Option<u32> {
        self.streams.get(&id).and_then(|s| s.as_processed()).map(|p| p.cycle_marker)
    }

    fn set_cycle_marker(&mut self, id: StreamId, marker: u32) {
        if let Some(processed) = self.streams.get_mut(&id).and_then(|s| s.as_processed_mut()) {
            processed.cycle_marker = marker;
        }
    }

    fn is_cycle_breaker(&self, id: StreamId) -> bool {
        self.streams
            .get(&id)
            .and_then(|s| s.as_processed())
            .is_some_and(|p| p.processor.is_cycle_breaker())
    }

    /// Streams feeding `id` through its input ports, in port order.
    pub(crate) fn input_sources(&self, id: StreamId) -> Vec<StreamId> {
        self.streams
            .get(&id)
            .and_then(|s| s.as_processed())
            .map(|p| p.inputs.iter().filter_map(|port| self.ports.get(port)).map(|port| port.source).collect())
            .unwrap_or_default()
    }

    /// Marks `id` and everything upstream of it as consumed.
    pub(crate) fn mark_consumed(&mut self, id: StreamId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            if stream.is_consumed {
                continue;
            }
            stream.is_consumed = true;
            if let StreamKind::Processed(processed) = &stream.kind {
                pending.extend(processed.inputs.iter().filter_map(|p| self.ports.get(p)).map(|p| p.source));
            }
        }
    }

    /// Recomputes the processing order, cycle membership, consumption and
    /// whether the graph needs an audio mixer.
    #[allow(clippy::cognitive_complexity)]
    pub(crate) fn update_stream_order(&mut self) {
        self.stream_order_dirty = false;

        let mut should_mix = false;
        for stream in self.streams.values_mut() {
            stream.is_consumed = false;
            if let StreamKind::Source(source) = &stream.kind {
                should_mix |= source.input.needs_mixing();
            }
        }
        match (self.mixer.is_some(), should_mix) {
            (false, true) => {
                tracing::debug!("Creating audio mixer");
                self.mixer = Some(AudioMixer::new(self.sample_rate));
            },
            (true, false) => {
                tracing::debug!("Dropping audio mixer");
                self.mixer = None;
            },
            _ => {},
        }

        let previous = std::mem::take(&mut self.stream_order);
        let mut ordered = Vec::with_capacity(previous.len());
        let mut breakers = Vec::new();
        let mut dfs_stack = VecDeque::new();
        let mut scc_stack: VecDeque<StreamId> = VecDeque::new();
        let mut consumed_roots = Vec::new();

        for id in previous {
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            if stream.is_intrinsically_consumed() {
                consumed_roots.push(id);
            }
            match &mut stream.kind {
                StreamKind::Processed(processed) => {
                    processed.cycle_marker = NOT_VISITED;
                    dfs_stack.push_back(id);
                },
                // Sources have no inputs and can be ordered right away.
                StreamKind::Source(_) => ordered.push(id),
            }
        }
        for id in consumed_roots {
            self.mark_consumed(id);
        }

        let mut next_stack_marker = NOT_VISITED - 1;
        while let Some(&id) = dfs_stack.front() {
            let inputs = self.input_sources(id);
            let marker = self.cycle_marker(id).unwrap_or(0);

            if marker == NOT_VISITED {
                self.set_cycle_marker(id, next_stack_marker);
                next_stack_marker -= 1;
                for source in inputs.iter().rev() {
                    if self.cycle_marker(*source) == Some(NOT_VISITED) {
                        remove_from(&mut dfs_stack, *source);
                        dfs_stack.push_front(*source);
                    }
                }
                continue;
            }

            // Returning from the search upstream of `id`.
            dfs_stack.pop_front();

            // Highest stack marker among the inputs: anything above
            // IN_MUTED_CYCLE means an input is still on the visit stack, so
            // `id` feeds back into it.
            let cycle_stack_marker =
                inputs.iter().filter_map(|s| self.cycle_marker(*s)).max().unwrap_or(0);

            if cycle_stack_marker <= IN_MUTED_CYCLE {
                self.set_cycle_marker(id, 0);
                ordered.push(id);
                continue;
            }

            scc_stack.push_front(id);

            if cycle_stack_marker > marker {
                // Part of a component whose root is still on the stack.
                self.set_cycle_marker(id, cycle_stack_marker);
                continue;
            }

            // `id` is the root of a complete strongly connected component.
            let members: Vec<StreamId> = scc_stack
                .iter()
                .take_while(|s| self.cycle_marker(**s).is_some_and(|m| m <= cycle_stack_marker))
                .copied()
                .collect();
            scc_stack.drain(..members.len());

            let (delays, others): (Vec<StreamId>, Vec<StreamId>) =
                members.into_iter().partition(|s| self.is_cycle_breaker(*s));
            let have_delay = !delays.is_empty();
            for delay in delays {
                self.set_cycle_marker(delay, 0);
                breakers.push(delay);
            }
            for member in others {
                if have_delay {
                    // Search the component again without its delay nodes.
                    self.set_cycle_marker(member, NOT_VISITED);
                    dfs_stack.push_front(member);
                } else {
                    self.set_cycle_marker(member, IN_MUTED_CYCLE);
                    tracing::debug!(stream = %member, "Stream is in a cycle without a delay node, muting");
                    ordered.push(member);
                }
            }
        }

        breakers.reverse();
        self.first_cycle_breaker = ordered.len();
        ordered.extend(breakers);
        self.stream_order = ordered;
        tracing::trace!(order = ?self.stream_order, first_cycle_breaker = self.first_cycle_breaker, "Updated stream order");
    }
}
