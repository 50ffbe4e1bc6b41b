// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Time algebra for the media graph.
//!
//! All times are fixed-point seconds stored in an `i64` with
//! [`MEDIA_TIME_FRAC_BITS`] fractional bits. Three timelines exist:
//!
//! - **Graph time** ([`GraphTime`]): the scheduler's single global clock.
//! - **Stream time** ([`StreamTime`]): a stream's own timeline. It only advances
//!   while the stream is not blocked.
//! - **Track ticks** ([`TrackTicks`]): integer sample (or frame) counts at a
//!   track's rate.
//!
//! Conversions between graph and stream time depend on the stream's blocking
//! history and live on [`GraphClock`].

use crate::time_varying::TimeVarying;

pub type MediaTime = i64;
pub type GraphTime = MediaTime;
pub type StreamTime = MediaTime;
pub type TrackTicks = i64;
pub type TrackRate = i32;

pub const MEDIA_TIME_FRAC_BITS: u32 = 20;
pub const MEDIA_TIME_MAX: MediaTime = i64::MAX;
pub const GRAPH_TIME_MAX: GraphTime = MEDIA_TIME_MAX;
pub const STREAM_TIME_MAX: StreamTime = MEDIA_TIME_MAX;
/// Largest tick count representable as a media time at rate 1.
pub const TRACK_TICKS_MAX: TrackTicks = i64::MAX >> MEDIA_TIME_FRAC_BITS;
/// Rates must stay below one tick per fractional unit of media time.
pub const TRACK_RATE_MAX: TrackRate = 1 << MEDIA_TIME_FRAC_BITS;

/// Audio is processed in blocks of `1 << AUDIO_BLOCK_SIZE_BITS` frames.
pub const AUDIO_BLOCK_SIZE_BITS: u32 = 7;
pub const AUDIO_BLOCK_SIZE: TrackTicks = 1 << AUDIO_BLOCK_SIZE_BITS;

const ONE_SECOND: i128 = 1 << MEDIA_TIME_FRAC_BITS;

fn debug_check_rate(rate: TrackRate) {
    debug_assert!(
        rate > 0 && rate <= TRACK_RATE_MAX,
        "track rate {rate} outside (0, {TRACK_RATE_MAX}]"
    );
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

pub const fn milliseconds_to_media_time(ms: i64) -> MediaTime {
    (ms << MEDIA_TIME_FRAC_BITS) / 1000
}

pub fn seconds_to_media_time(seconds: f64) -> MediaTime {
    #[allow(clippy::cast_possible_truncation)]
    let t = (seconds * f64::from(1u32 << MEDIA_TIME_FRAC_BITS)) as i64;
    t
}

#[allow(clippy::cast_precision_loss)]
pub fn media_time_to_seconds(time: MediaTime) -> f64 {
    time as f64 / f64::from(1u32 << MEDIA_TIME_FRAC_BITS)
}

pub const fn media_time_to_milliseconds(time: MediaTime) -> i64 {
    (time * 1000) >> MEDIA_TIME_FRAC_BITS
}

pub fn time_to_ticks_round_down(rate: TrackRate, time: MediaTime) -> TrackTicks {
    debug_check_rate(rate);
    debug_assert!(time >= 0, "negative time {time}");
    if time >= MEDIA_TIME_MAX {
        return TRACK_TICKS_MAX;
    }
    saturate((i128::from(time) * i128::from(rate)) >> MEDIA_TIME_FRAC_BITS)
}

pub fn time_to_ticks_round_up(rate: TrackRate, time: MediaTime) -> TrackTicks {
    debug_check_rate(rate);
    debug_assert!(time >= 0, "negative time {time}");
    if time >= MEDIA_TIME_MAX {
        return TRACK_TICKS_MAX;
    }
    saturate((i128::from(time) * i128::from(rate) + ONE_SECOND - 1) >> MEDIA_TIME_FRAC_BITS)
}

pub fn ticks_to_time_round_down(rate: TrackRate, ticks: TrackTicks) -> MediaTime {
    debug_check_rate(rate);
    debug_assert!(ticks >= 0, "negative ticks {ticks}");
    if ticks >= TRACK_TICKS_MAX {
        return MEDIA_TIME_MAX;
    }
    saturate((i128::from(ticks) << MEDIA_TIME_FRAC_BITS) / i128::from(rate))
}

pub fn ticks_to_time_round_up(rate: TrackRate, ticks: TrackTicks) -> MediaTime {
    debug_check_rate(rate);
    debug_assert!(ticks >= 0, "negative ticks {ticks}");
    if ticks >= TRACK_TICKS_MAX {
        return MEDIA_TIME_MAX;
    }
    saturate(((i128::from(ticks) << MEDIA_TIME_FRAC_BITS) + i128::from(rate) - 1) / i128::from(rate))
}

/// Converts a tick count between rates, rounding down.
pub fn rate_convert_ticks_round_down(
    out_rate: TrackRate,
    in_rate: TrackRate,
    ticks: TrackTicks,
) -> TrackTicks {
    saturate(i128::from(ticks) * i128::from(out_rate) / i128::from(in_rate))
}

/// Converts a tick count between rates, rounding up.
pub fn rate_convert_ticks_round_up(
    out_rate: TrackRate,
    in_rate: TrackRate,
    ticks: TrackTicks,
) -> TrackTicks {
    saturate(
        (i128::from(ticks) * i128::from(out_rate) + i128::from(in_rate) - 1) / i128::from(in_rate),
    )
}

/// Returns the graph time of the first audio block boundary strictly after `time`.
pub fn round_up_to_next_audio_block(rate: TrackRate, time: GraphTime) -> GraphTime {
    let ticks = time_to_ticks_round_up(rate, time);
    let block = ticks >> AUDIO_BLOCK_SIZE_BITS;
    let next_block = block.saturating_add(1).min(TRACK_TICKS_MAX >> AUDIO_BLOCK_SIZE_BITS);
    ticks_to_time_round_down(rate, next_block << AUDIO_BLOCK_SIZE_BITS)
}

/// How a stream-time to graph-time conversion treats a blocked interval that
/// starts exactly where the requested stream time is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingBlocked {
    /// Return the earliest graph time at which the stream time is reached.
    Exclude,
    /// Skip any blocked interval starting at that point and return the next
    /// unblocked graph time.
    Include,
}

/// The parts of a stream that the graph/stream time conversions depend on.
#[derive(Debug, Clone, Copy)]
pub struct StreamTimeline<'a> {
    /// Graph time corresponding to stream time zero, after accounting for all
    /// blocking before the current time.
    pub buffer_start_time: GraphTime,
    pub blocked: &'a TimeVarying<bool>,
}

/// The scheduler's view of graph time: everything before `current_time` has
/// been played, blocking decisions are final up to `state_computed_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphClock {
    pub current_time: GraphTime,
    pub state_computed_time: GraphTime,
}

impl GraphClock {
    pub const fn new(current_time: GraphTime, state_computed_time: GraphTime) -> Self {
        Self { current_time, state_computed_time }
    }

    /// Converts a graph time in `[0, state_computed_time]` to the stream's time.
    pub fn graph_time_to_stream_time(&self, stream: StreamTimeline<'_>, time: GraphTime) -> StreamTime {
        debug_assert!(
            time <= self.state_computed_time,
            "graph time {time} beyond computed state {}",
            self.state_computed_time
        );
        if time <= self.current_time {
            return (time - stream.buffer_start_time).max(0);
        }
        let mut t = self.current_time;
        let mut stream_time = t - stream.buffer_start_time;
        while t < time {
            let (blocked, end) = stream.blocked.get_at_with_end(t);
            let end = end.min(time);
            if !*blocked {
                stream_time += end - t;
            }
            t = end;
        }
        stream_time.max(0)
    }

    /// Like [`Self::graph_time_to_stream_time`] but accepts times beyond the
    /// computed horizon, assuming the stream stays unblocked there.
    pub fn graph_time_to_stream_time_optimistic(
        &self,
        stream: StreamTimeline<'_>,
        time: GraphTime,
    ) -> StreamTime {
        let computed = time.min(self.state_computed_time);
        let stream_time = self.graph_time_to_stream_time(stream, computed);
        stream_time.saturating_add(time - computed)
    }

    /// Converts a stream time to the graph time at which the stream reaches it.
    ///
    /// Blocking beyond `state_computed_time` is unknown and treated as unblocked.
    pub fn stream_time_to_graph_time(
        &self,
        stream: StreamTimeline<'_>,
        time: StreamTime,
        trailing: TrailingBlocked,
    ) -> GraphTime {
        if time >= STREAM_TIME_MAX {
            return GRAPH_TIME_MAX;
        }
        let buffer_elapsed = self.current_time - stream.buffer_start_time;
        if time < buffer_elapsed || (time == buffer_elapsed && trailing == TrailingBlocked::Exclude) {
            return time + stream.buffer_start_time;
        }
        let mut stream_amount = time - buffer_elapsed;
        debug_assert!(stream_amount >= 0, "can't answer queries before current time");

        let mut t = self.current_time;
        while t < GRAPH_TIME_MAX {
            if trailing == TrailingBlocked::Exclude && stream_amount == 0 {
                return t;
            }
            let (blocked, end) = if t < self.state_computed_time {
                let (blocked, end) = stream.blocked.get_at_with_end(t);
                (*blocked, end.min(self.state_computed_time))
            } else {
                (false, GRAPH_TIME_MAX)
            };
            if blocked {
                t = end;
                continue;
            }
            if stream_amount == 0 {
                return t;
            }
            let consume = (end - t).min(stream_amount);
            stream_amount -= consume;
            t += consume;
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: TrackRate = 48_000;

    #[test]
    fn test_millisecond_conversion() {
        assert_eq!(milliseconds_to_media_time(1000), 1 << MEDIA_TIME_FRAC_BITS);
        assert_eq!(seconds_to_media_time(2.0), 2 << MEDIA_TIME_FRAC_BITS);
        assert_eq!(media_time_to_milliseconds(milliseconds_to_media_time(1000)), 1000);
        assert!((media_time_to_seconds(seconds_to_media_time(0.5)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ticks_round_trip() {
        for rate in [8_000, 44_100, 48_000, 90_000] {
            for ticks in [0, 1, 127, 128, 4_410, 1_000_003] {
                let up = ticks_to_time_round_up(rate, ticks);
                assert_eq!(time_to_ticks_round_down(rate, up), ticks, "rate {rate} ticks {ticks}");
                let down = ticks_to_time_round_down(rate, ticks);
                assert_eq!(time_to_ticks_round_up(rate, down), ticks, "rate {rate} ticks {ticks}");
            }
        }
    }

    #[test]
    fn test_max_values_saturate() {
        assert_eq!(time_to_ticks_round_down(RATE, MEDIA_TIME_MAX), TRACK_TICKS_MAX);
        assert_eq!(time_to_ticks_round_up(RATE, MEDIA_TIME_MAX), TRACK_TICKS_MAX);
        assert_eq!(ticks_to_time_round_down(RATE, TRACK_TICKS_MAX), MEDIA_TIME_MAX);
        assert_eq!(ticks_to_time_round_up(RATE, TRACK_TICKS_MAX), MEDIA_TIME_MAX);
    }

    #[test]
    fn test_rate_conversion() {
        assert_eq!(rate_convert_ticks_round_down(48_000, 44_100, 441), 480);
        assert_eq!(rate_convert_ticks_round_down(44_100, 48_000, 1), 0);
        assert_eq!(rate_convert_ticks_round_up(44_100, 48_000, 1), 1);
    }

    #[test]
    fn test_round_up_to_next_audio_block() {
        let zero = round_up_to_next_audio_block(RATE, 0);
        assert_eq!(time_to_ticks_round_up(RATE, zero), AUDIO_BLOCK_SIZE);

        let on_boundary = ticks_to_time_round_down(RATE, 256);
        let next = round_up_to_next_audio_block(RATE, on_boundary);
        assert_eq!(time_to_ticks_round_up(RATE, next), 384);

        let inside = ticks_to_time_round_down(RATE, 300);
        let next = round_up_to_next_audio_block(RATE, inside);
        assert_eq!(time_to_ticks_round_up(RATE, next), 384);
        assert!(next > inside);
    }

    fn timeline(blocked: &TimeVarying<bool>, start: GraphTime) -> StreamTimeline<'_> {
        StreamTimeline { buffer_start_time: start, blocked }
    }

    #[test]
    fn test_graph_to_stream_before_current_time() {
        let blocked = TimeVarying::new(false);
        let clock = GraphClock::new(1000, 2000);
        assert_eq!(clock.graph_time_to_stream_time(timeline(&blocked, 400), 900), 500);
        assert_eq!(clock.graph_time_to_stream_time(timeline(&blocked, 400), 100), 0);
    }

    #[test]
    fn test_graph_to_stream_skips_blocked_spans() {
        let mut blocked = TimeVarying::new(false);
        blocked.set_at_and_after(1200, true);
        blocked.set_at_and_after(1500, false);
        let clock = GraphClock::new(1000, 2000);
        let tl = timeline(&blocked, 0);
        assert_eq!(clock.graph_time_to_stream_time(tl, 1200), 1200);
        assert_eq!(clock.graph_time_to_stream_time(tl, 1400), 1200);
        assert_eq!(clock.graph_time_to_stream_time(tl, 1600), 1300);
        assert_eq!(clock.graph_time_to_stream_time_optimistic(tl, 2500), 2200);
    }

    #[test]
    fn test_stream_to_graph_trailing_blocked() {
        let mut blocked = TimeVarying::new(false);
        blocked.set_at_and_after(1200, true);
        blocked.set_at_and_after(1500, false);
        let clock = GraphClock::new(1000, 2000);
        let tl = timeline(&blocked, 0);

        assert_eq!(clock.stream_time_to_graph_time(tl, 900, TrailingBlocked::Exclude), 900);
        assert_eq!(clock.stream_time_to_graph_time(tl, 1100, TrailingBlocked::Exclude), 1100);
        assert_eq!(clock.stream_time_to_graph_time(tl, 1200, TrailingBlocked::Exclude), 1200);
        assert_eq!(clock.stream_time_to_graph_time(tl, 1200, TrailingBlocked::Include), 1500);
        assert_eq!(clock.stream_time_to_graph_time(tl, 1300, TrailingBlocked::Exclude), 1600);
        // Beyond the computed horizon the stream is assumed unblocked.
        assert_eq!(clock.stream_time_to_graph_time(tl, 1800, TrailingBlocked::Exclude), 2100);
        assert_eq!(
            clock.stream_time_to_graph_time(tl, STREAM_TIME_MAX, TrailingBlocked::Exclude),
            GRAPH_TIME_MAX
        );
    }

    #[test]
    fn test_stream_graph_round_trip_off_boundaries() {
        let mut blocked = TimeVarying::new(false);
        blocked.set_at_and_after(1200, true);
        blocked.set_at_and_after(1500, false);
        let clock = GraphClock::new(1000, 2000);
        let tl = timeline(&blocked, 100);
        for stream_time in [950, 1050, 1150, 1250, 1400] {
            let g = clock.stream_time_to_graph_time(tl, stream_time, TrailingBlocked::Exclude);
            assert_eq!(clock.graph_time_to_stream_time(tl, g), stream_time);
        }
    }
}
