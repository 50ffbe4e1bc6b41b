// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Tracks and the per-stream buffer that holds them.
//!
//! Every track's segment starts at stream time zero; a track created later in
//! the stream's life begins with null data up to its start tick.

use smallvec::SmallVec;

use crate::segment::MediaSegment;
use crate::time::{
    ticks_to_time_round_down, time_to_ticks_round_down, StreamTime, TrackRate, TrackTicks,
    STREAM_TIME_MAX,
};
use crate::types::{MediaType, TrackId};

#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    rate: TrackRate,
    start: TrackTicks,
    segment: MediaSegment,
    ended: bool,
}

impl Track {
    pub fn new(id: TrackId, rate: TrackRate, start: TrackTicks, segment: MediaSegment) -> Self {
        Self { id, rate, start, segment, ended: false }
    }

    pub const fn id(&self) -> TrackId {
        self.id
    }

    pub const fn rate(&self) -> TrackRate {
        self.rate
    }

    /// Tick at which the track's real data starts.
    pub const fn start(&self) -> TrackTicks {
        self.start
    }

    pub fn start_time_round_down(&self) -> StreamTime {
        ticks_to_time_round_down(self.rate, self.start)
    }

    pub const fn segment(&self) -> &MediaSegment {
        &self.segment
    }

    pub fn segment_mut(&mut self) -> &mut MediaSegment {
        &mut self.segment
    }

    pub const fn media_type(&self) -> MediaType {
        self.segment.media_type()
    }

    /// Tick just past the last buffered tick.
    pub const fn end(&self) -> TrackTicks {
        self.segment.duration()
    }

    pub fn end_time_round_down(&self) -> StreamTime {
        ticks_to_time_round_down(self.rate, self.end())
    }

    pub const fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn set_ended(&mut self) {
        self.ended = true;
    }

    pub fn time_to_ticks_round_down(&self, time: StreamTime) -> TrackTicks {
        time_to_ticks_round_down(self.rate, time)
    }

    pub fn forget_up_to(&mut self, time: StreamTime) {
        let ticks = self.time_to_ticks_round_down(time);
        self.segment.forget_up_to(ticks);
    }
}

/// All tracks of one stream plus the horizon up to which the track set is known.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    tracks: SmallVec<[Track; 2]>,
    /// No tracks will be added starting before this stream time.
    tracks_known_time: StreamTime,
    forgotten_time: StreamTime,
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self { tracks: SmallVec::new(), tracks_known_time: 0, forgotten_time: 0 }
    }

    /// Adds a track. The segment must already contain any leading null data
    /// up to `start`.
    pub fn add_track(
        &mut self,
        id: TrackId,
        rate: TrackRate,
        start: TrackTicks,
        segment: MediaSegment,
    ) -> &mut Track {
        debug_assert!(self.find_track(id).is_none(), "track {id} already exists");
        if ticks_to_time_round_down(rate, start) < self.tracks_known_time {
            tracing::warn!(
                track = id,
                start,
                tracks_known_time = self.tracks_known_time,
                "Track added before the known-tracks horizon"
            );
        }
        let index = self.tracks.len();
        self.tracks.push(Track::new(id, rate, start, segment));
        &mut self.tracks[index]
    }

    pub fn find_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn find_track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn tracks_of_type(&self, media_type: MediaType) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.media_type() == media_type)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub const fn tracks_known_time(&self) -> StreamTime {
        self.tracks_known_time
    }

    pub fn advance_known_tracks_time(&mut self, time: StreamTime) {
        debug_assert!(time >= self.tracks_known_time, "known tracks time can't go backwards");
        self.tracks_known_time = self.tracks_known_time.max(time);
    }

    /// Earliest end among tracks that have not ended, capped by the known-tracks
    /// horizon. Data is available for every track up to this time.
    pub fn get_end(&self) -> StreamTime {
        self.tracks
            .iter()
            .filter(|t| !t.is_ended())
            .map(Track::end_time_round_down)
            .fold(self.tracks_known_time, StreamTime::min)
    }

    /// Time at which every track has ended, or `STREAM_TIME_MAX` while new
    /// tracks may still appear or any track is still open.
    pub fn get_all_tracks_end(&self) -> StreamTime {
        if self.tracks_known_time < STREAM_TIME_MAX {
            return STREAM_TIME_MAX;
        }
        let mut end = 0;
        for track in &self.tracks {
            if !track.is_ended() {
                return STREAM_TIME_MAX;
            }
            end = end.max(track.end_time_round_down());
        }
        end
    }

    pub const fn forgotten_time(&self) -> StreamTime {
        self.forgotten_time
    }

    /// Releases data before `time`. Does nothing unless at least
    /// `minimum_forget` has elapsed since the last call that did work.
    /// Ended tracks that lie entirely in the past are removed.
    pub fn forget_up_to(&mut self, time: StreamTime, minimum_forget: StreamTime) {
        if time <= self.forgotten_time + minimum_forget {
            return;
        }
        self.forgotten_time = time;
        self.tracks.retain(|t| !(t.is_ended() && t.end_time_round_down() <= time));
        for track in &mut self.tracks {
            let forget = time.min(track.end_time_round_down());
            track.forget_up_to(forget);
        }
    }

    pub fn byte_size(&self) -> usize {
        self.tracks.iter().map(|t| t.segment.byte_size()).sum()
    }
}
