// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Input ports: directed connections from a source stream into a processed stream.

use mediagraph_core::{GraphTime, PortFlags, PortId, StreamId, TimeVarying};

use crate::graph::GraphEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MediaInputPort {
    pub(crate) id: PortId,
    pub(crate) source: StreamId,
    pub(crate) dest: StreamId,
    pub(crate) flags: PortFlags,
}

/// A run of graph time during which the destination is unblocked and the
/// source's blocking state does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputInterval {
    pub(crate) start: GraphTime,
    pub(crate) end: GraphTime,
    pub(crate) input_is_blocked: bool,
}

impl GraphEngine {
    /// Next interval at or after `time` over which `port`'s destination
    /// consumes input. Returns an empty interval when there is none before the
    /// computed horizon.
    pub(crate) fn next_input_interval(&self, port: &MediaInputPort, time: GraphTime) -> InputInterval {
        match (self.streams.get(&port.source), self.streams.get(&port.dest)) {
            (Some(source), Some(dest)) => {
                next_input_interval(&source.blocked, &dest.blocked, self.state_computed_time, time)
            },
            _ => InputInterval::empty(self.state_computed_time),
        }
    }
}

impl InputInterval {
    const fn empty(horizon: GraphTime) -> Self {
        Self { start: horizon, end: horizon, input_is_blocked: true }
    }
}

/// Same as [`GraphEngine::next_input_interval`], for callers that already
/// hold the two streams' blocking timelines.
pub(crate) fn next_input_interval(
    source_blocked: &TimeVarying<bool>,
    dest_blocked: &TimeVarying<bool>,
    horizon: GraphTime,
    time: GraphTime,
) -> InputInterval {
    let mut t = time;
    while t < horizon {
        let (dest_is_blocked, dest_end) = dest_blocked.get_at_with_end(t);
        if !*dest_is_blocked {
            let (source_is_blocked, source_end) = source_blocked.get_at_with_end(t);
            return InputInterval {
                start: t,
                end: dest_end.min(source_end).min(horizon),
                input_is_blocked: *source_is_blocked,
            };
        }
        t = dest_end;
    }
    InputInterval::empty(horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_skips_blocked_destination() {
        let mut source = TimeVarying::new(false);
        let mut dest = TimeVarying::new(true);
        dest.set_at_and_after(100, false);
        source.set_at_and_after(150, true);

        let first = next_input_interval(&source, &dest, 1000, 0);
        assert_eq!(first, InputInterval { start: 100, end: 150, input_is_blocked: false });

        let second = next_input_interval(&source, &dest, 1000, 150);
        assert_eq!(second, InputInterval { start: 150, end: 1000, input_is_blocked: true });
    }

    #[test]
    fn test_interval_empty_when_blocked_until_horizon() {
        let source = TimeVarying::new(false);
        let dest = TimeVarying::new(true);
        let interval = next_input_interval(&source, &dest, 500, 0);
        assert!(interval.start >= interval.end);
    }
}
