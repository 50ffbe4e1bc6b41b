// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Media segments: ordered runs of chunks with a known duration in ticks.
//!
//! A segment is the unit of data that producers append to tracks and that the
//! scheduler slices, copies and forgets. Sample payloads are reference counted
//! (`Arc<[f32]>`) so slicing and copying between tracks never copies audio.
//!
//! Null chunks stand for silence (audio) or "no frame" (video) and are merged
//! eagerly so long stretches of silence cost a single chunk.

use std::sync::Arc;

use crate::time::{TrackRate, TrackTicks};
use crate::types::MediaType;

/// Behaviour shared by audio and video chunks.
pub trait Chunk: Clone {
    fn null(duration: TrackTicks) -> Self;
    fn duration(&self) -> TrackTicks;
    fn set_duration(&mut self, duration: TrackTicks);
    fn is_null(&self) -> bool;
    /// Restricts the chunk to `[start, end)` ticks of its current contents.
    fn slice_to(&mut self, start: TrackTicks, end: TrackTicks);
    /// Whether `next` continues this chunk seamlessly and can be merged into it.
    fn can_combine_with_following(&self, next: &Self) -> bool;
    /// Approximate heap footprint attributable to this chunk.
    fn byte_size(&self) -> usize;
}

/// A run of chunks of one media type.
#[derive(Debug, Clone)]
pub struct Segment<C> {
    chunks: Vec<C>,
    duration: TrackTicks,
}

impl<C: Chunk> Default for Segment<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Chunk> Segment<C> {
    pub const fn new() -> Self {
        Self { chunks: Vec::new(), duration: 0 }
    }

    pub const fn duration(&self) -> TrackTicks {
        self.duration
    }

    pub fn chunks(&self) -> &[C] {
        &self.chunks
    }

    pub const fn is_empty(&self) -> bool {
        self.duration == 0
    }

    pub fn append_chunk(&mut self, chunk: C) {
        if chunk.duration() <= 0 {
            return;
        }
        self.duration += chunk.duration();
        if let Some(last) = self.chunks.last_mut() {
            if last.can_combine_with_following(&chunk) {
                last.set_duration(last.duration() + chunk.duration());
                return;
            }
        }
        self.chunks.push(chunk);
    }

    pub fn append_null_data(&mut self, ticks: TrackTicks) {
        self.append_chunk(C::null(ticks));
    }

    pub fn insert_null_data_at_start(&mut self, ticks: TrackTicks) {
        if ticks <= 0 {
            return;
        }
        self.duration += ticks;
        match self.chunks.first_mut() {
            Some(first) if first.is_null() => first.set_duration(first.duration() + ticks),
            _ => self.chunks.insert(0, C::null(ticks)),
        }
    }

    /// Moves every chunk of `other` onto the end of this segment.
    pub fn append_from(&mut self, other: &mut Self) {
        for chunk in other.chunks.drain(..) {
            self.append_chunk(chunk);
        }
        other.duration = 0;
    }

    /// Appends a copy of `[start, end)` of `source`. Any part of the range
    /// past the end of `source` is filled with null data so exactly
    /// `end - start` ticks are appended.
    pub fn append_slice(&mut self, source: &Self, start: TrackTicks, end: TrackTicks) {
        if end <= start {
            return;
        }
        let mut offset = 0;
        for chunk in &source.chunks {
            let chunk_end = offset + chunk.duration();
            if chunk_end > start && offset < end {
                let mut copy = chunk.clone();
                copy.slice_to(start.max(offset) - offset, end.min(chunk_end) - offset);
                self.append_chunk(copy);
            }
            offset = chunk_end;
            if offset >= end {
                break;
            }
        }
        if source.duration < end {
            self.append_null_data(end - source.duration.max(start));
        }
    }

    pub fn slice(&self, start: TrackTicks, end: TrackTicks) -> Self {
        let mut out = Self::new();
        out.append_slice(self, start, end);
        out
    }

    /// Drops the first `ticks` ticks of data.
    pub fn remove_leading(&mut self, ticks: TrackTicks) {
        let mut remaining = ticks.min(self.duration);
        self.duration -= remaining;
        let mut drop_count = 0;
        for chunk in &mut self.chunks {
            if remaining <= 0 {
                break;
            }
            if chunk.duration() <= remaining {
                remaining -= chunk.duration();
                drop_count += 1;
            } else {
                let duration = chunk.duration();
                chunk.slice_to(remaining, duration);
                remaining = 0;
            }
        }
        self.chunks.drain(..drop_count);
    }

    /// Releases the payload of the first `ticks` ticks while keeping the
    /// timeline intact.
    pub fn forget_up_to(&mut self, ticks: TrackTicks) {
        let ticks = ticks.min(self.duration);
        if ticks <= 0 {
            return;
        }
        self.remove_leading(ticks);
        self.insert_null_data_at_start(ticks);
    }

    pub fn replace_with_null(&mut self) {
        let duration = self.duration;
        self.chunks.clear();
        self.duration = 0;
        self.append_null_data(duration);
    }

    pub fn byte_size(&self) -> usize {
        self.chunks.iter().map(Chunk::byte_size).sum::<usize>()
            + self.chunks.capacity() * std::mem::size_of::<C>()
    }
}

/// Interleaved sample payload shared between chunks.
#[derive(Debug, Clone)]
pub struct AudioData {
    samples: Arc<[f32]>,
    channels: u16,
    /// Offset into `samples`, in frames.
    offset: usize,
}

#[derive(Debug, Clone)]
pub struct AudioChunk {
    duration: TrackTicks,
    data: Option<AudioData>,
    volume: f32,
}

impl AudioChunk {
    pub fn channels(&self) -> u16 {
        self.data.as_ref().map_or(0, |d| d.channels)
    }

    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Sample for `frame` (relative to the chunk) on output channel `channel`,
    /// with the chunk volume applied. Missing channels repeat the last one.
    fn sample(&self, frame: usize, channel: u16) -> f32 {
        self.data.as_ref().map_or(0.0, |d| {
            let ch = channel.min(d.channels.saturating_sub(1));
            let index = (d.offset + frame) * usize::from(d.channels) + usize::from(ch);
            d.samples.get(index).copied().unwrap_or(0.0) * self.volume
        })
    }
}

fn ticks_to_usize(ticks: TrackTicks) -> usize {
    usize::try_from(ticks).unwrap_or(0)
}

impl Chunk for AudioChunk {
    fn null(duration: TrackTicks) -> Self {
        Self { duration, data: None, volume: 1.0 }
    }

    fn duration(&self) -> TrackTicks {
        self.duration
    }

    fn set_duration(&mut self, duration: TrackTicks) {
        self.duration = duration;
    }

    fn is_null(&self) -> bool {
        self.data.is_none()
    }

    fn slice_to(&mut self, start: TrackTicks, end: TrackTicks) {
        debug_assert!(0 <= start && start <= end && end <= self.duration, "bad slice");
        if let Some(data) = &mut self.data {
            data.offset += ticks_to_usize(start);
        }
        self.duration = end - start;
    }

    fn can_combine_with_following(&self, next: &Self) -> bool {
        match (&self.data, &next.data) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                Arc::ptr_eq(&a.samples, &b.samples)
                    && a.channels == b.channels
                    && a.offset + ticks_to_usize(self.duration) == b.offset
                    && (self.volume - next.volume).abs() < f32::EPSILON
            },
            _ => false,
        }
    }

    fn byte_size(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.samples.len() * std::mem::size_of::<f32>())
    }
}

pub type AudioSegment = Segment<AudioChunk>;

impl Segment<AudioChunk> {
    /// Appends interleaved samples. Trailing samples that do not form a whole
    /// frame are ignored.
    pub fn append_frames(&mut self, samples: Arc<[f32]>, channels: u16) {
        if channels == 0 {
            return;
        }
        let frames = samples.len() / usize::from(channels);
        let duration = TrackTicks::try_from(frames).unwrap_or(0);
        self.append_chunk(AudioChunk {
            duration,
            data: Some(AudioData { samples, channels, offset: 0 }),
            volume: 1.0,
        });
    }

    pub fn append_interleaved(&mut self, samples: Vec<f32>, channels: u16) {
        self.append_frames(Arc::from(samples), channels);
    }

    pub fn apply_volume(&mut self, volume: f32) {
        for chunk in &mut self.chunks {
            chunk.volume *= volume;
        }
    }

    pub fn max_channels(&self) -> u16 {
        self.chunks.iter().map(AudioChunk::channels).max().unwrap_or(0)
    }

    /// Renders the segment as interleaved `channels`-channel samples onto `out`.
    /// Null chunks render as silence.
    pub fn write_interleaved(&self, channels: u16, out: &mut Vec<f32>) {
        out.reserve(ticks_to_usize(self.duration) * usize::from(channels));
        for chunk in &self.chunks {
            for frame in 0..ticks_to_usize(chunk.duration) {
                for ch in 0..channels {
                    out.push(chunk.sample(frame, ch));
                }
            }
        }
    }

    /// Nearest-neighbour rate conversion.
    pub fn resample(&self, in_rate: TrackRate, out_rate: TrackRate) -> Self {
        self.resample_from(in_rate, out_rate, &mut ResampleCursor::default())
    }

    /// Nearest-neighbour rate conversion of input that continues where
    /// `cursor` left off. Output ticks are placed on the whole stream's
    /// timeline, so converting in pieces yields the same frames as converting
    /// everything at once.
    pub fn resample_from(&self, in_rate: TrackRate, out_rate: TrackRate, cursor: &mut ResampleCursor) -> Self {
        if self.duration == 0 {
            return Self::new();
        }
        let input_end = cursor.input + self.duration;
        if in_rate == out_rate {
            cursor.input = input_end;
            cursor.output = input_end;
            return self.clone();
        }
        let output_end = crate::time::rate_convert_ticks_round_down(out_rate, in_rate, input_end);

        let mut out = Self::new();
        let mut chunk_index = 0;
        let mut chunk_start = cursor.input;
        let mut run = Vec::new();
        let mut run_ticks = 0;
        for tick in cursor.output..output_end {
            let src = crate::time::rate_convert_ticks_round_down(in_rate, out_rate, tick)
                .clamp(cursor.input, input_end - 1);
            while chunk_index + 1 < self.chunks.len() && src >= chunk_start + self.chunks[chunk_index].duration {
                out.append_resampled(&self.chunks[chunk_index], std::mem::take(&mut run), run_ticks);
                run_ticks = 0;
                chunk_start += self.chunks[chunk_index].duration;
                chunk_index += 1;
            }
            let chunk = &self.chunks[chunk_index];
            if let Some(data) = &chunk.data {
                let channels = usize::from(data.channels);
                let base = (data.offset + ticks_to_usize(src - chunk_start)) * channels;
                run.extend((0..channels).map(|c| data.samples.get(base + c).copied().unwrap_or(0.0)));
            }
            run_ticks += 1;
        }
        if let Some(chunk) = self.chunks.get(chunk_index) {
            out.append_resampled(chunk, run, run_ticks);
        }

        cursor.input = input_end;
        cursor.output = output_end.max(cursor.output);
        out
    }

    /// Appends `ticks` converted frames taken from `like`.
    fn append_resampled(&mut self, like: &AudioChunk, samples: Vec<f32>, ticks: TrackTicks) {
        match &like.data {
            None => self.append_null_data(ticks),
            Some(data) => self.append_chunk(AudioChunk {
                duration: ticks,
                data: Some(AudioData { samples: Arc::from(samples), channels: data.channels, offset: 0 }),
                volume: like.volume,
            }),
        }
    }
}

/// Input and output ticks converted so far on one rate-converted stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResampleCursor {
    pub input: TrackTicks,
    pub output: TrackTicks,
}

/// A decoded picture. Producers keep ownership semantics through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoFrame {
    image: Option<Arc<VideoImage>>,
    force_black: bool,
}

impl VideoFrame {
    pub const fn new(image: Arc<VideoImage>) -> Self {
        Self { image: Some(image), force_black: false }
    }

    pub const fn image(&self) -> Option<&Arc<VideoImage>> {
        self.image.as_ref()
    }

    pub const fn force_black(&self) -> bool {
        self.force_black
    }

    pub fn intrinsic_size(&self) -> (u32, u32) {
        self.image.as_ref().map_or((0, 0), |i| (i.width, i.height))
    }
}

impl PartialEq for VideoFrame {
    fn eq(&self, other: &Self) -> bool {
        let same_image = match (&self.image, &other.image) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_image && self.force_black == other.force_black
    }
}

#[derive(Debug, Clone)]
pub struct VideoChunk {
    duration: TrackTicks,
    frame: VideoFrame,
}

impl VideoChunk {
    pub const fn frame(&self) -> &VideoFrame {
        &self.frame
    }
}

impl Chunk for VideoChunk {
    fn null(duration: TrackTicks) -> Self {
        Self { duration, frame: VideoFrame::default() }
    }

    fn duration(&self) -> TrackTicks {
        self.duration
    }

    fn set_duration(&mut self, duration: TrackTicks) {
        self.duration = duration;
    }

    fn is_null(&self) -> bool {
        self.frame.image.is_none()
    }

    fn slice_to(&mut self, start: TrackTicks, end: TrackTicks) {
        debug_assert!(0 <= start && start <= end && end <= self.duration, "bad slice");
        self.duration = end - start;
    }

    fn can_combine_with_following(&self, next: &Self) -> bool {
        self.frame == next.frame
    }

    fn byte_size(&self) -> usize {
        // Images are shared with the producer; only count the chunk itself.
        0
    }
}

pub type VideoSegment = Segment<VideoChunk>;

impl Segment<VideoChunk> {
    pub fn append_frame(&mut self, image: Arc<VideoImage>, duration: TrackTicks) {
        self.append_chunk(VideoChunk { duration, frame: VideoFrame::new(image) });
    }

    /// Frame showing at `ticks`, and the tick at which its chunk starts.
    pub fn frame_at(&self, ticks: TrackTicks) -> Option<(&VideoFrame, TrackTicks)> {
        let mut offset = 0;
        for chunk in &self.chunks {
            if ticks < offset + chunk.duration {
                return Some((&chunk.frame, offset));
            }
            offset += chunk.duration;
        }
        None
    }

    /// Turns every frame black, keeping sizes and durations.
    pub fn replace_with_black(&mut self) {
        for chunk in &mut self.chunks {
            chunk.frame.force_black = true;
        }
    }
}

/// A segment of either media type, as stored in a track.
#[derive(Debug, Clone)]
pub enum MediaSegment {
    Audio(AudioSegment),
    Video(VideoSegment),
}

impl MediaSegment {
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::Audio(_) => MediaType::Audio,
            Self::Video(_) => MediaType::Video,
        }
    }

    pub const fn duration(&self) -> TrackTicks {
        match self {
            Self::Audio(s) => s.duration(),
            Self::Video(s) => s.duration(),
        }
    }

    pub fn create_empty_clone(&self) -> Self {
        match self {
            Self::Audio(_) => Self::Audio(AudioSegment::new()),
            Self::Video(_) => Self::Video(VideoSegment::new()),
        }
    }

    pub fn append_null_data(&mut self, ticks: TrackTicks) {
        match self {
            Self::Audio(s) => s.append_null_data(ticks),
            Self::Video(s) => s.append_null_data(ticks),
        }
    }

    pub fn insert_null_data_at_start(&mut self, ticks: TrackTicks) {
        match self {
            Self::Audio(s) => s.insert_null_data_at_start(ticks),
            Self::Video(s) => s.insert_null_data_at_start(ticks),
        }
    }

    /// Moves the contents of `other` onto this segment. Segments of a
    /// different media type are dropped.
    pub fn append_from(&mut self, other: &mut Self) {
        match (self, other) {
            (Self::Audio(a), Self::Audio(b)) => a.append_from(b),
            (Self::Video(a), Self::Video(b)) => a.append_from(b),
            (this, other) => {
                tracing::warn!(
                    dest_type = ?this.media_type(),
                    source_type = ?other.media_type(),
                    "Dropping segment of mismatched media type"
                );
            },
        }
    }

    pub fn append_slice(&mut self, source: &Self, start: TrackTicks, end: TrackTicks) {
        match (self, source) {
            (Self::Audio(a), Self::Audio(b)) => a.append_slice(b, start, end),
            (Self::Video(a), Self::Video(b)) => a.append_slice(b, start, end),
            (this, source) => {
                tracing::warn!(
                    dest_type = ?this.media_type(),
                    source_type = ?source.media_type(),
                    "Dropping slice of mismatched media type"
                );
            },
        }
    }

    pub fn forget_up_to(&mut self, ticks: TrackTicks) {
        match self {
            Self::Audio(s) => s.forget_up_to(ticks),
            Self::Video(s) => s.forget_up_to(ticks),
        }
    }

    /// Replaces the contents with silence (audio) or black frames (video).
    pub fn replace_with_disabled(&mut self) {
        match self {
            Self::Audio(s) => s.replace_with_null(),
            Self::Video(s) => s.replace_with_black(),
        }
    }

    pub fn byte_size(&self) -> usize {
        match self {
            Self::Audio(s) => s.byte_size(),
            Self::Video(s) => s.byte_size(),
        }
    }

    pub const fn as_audio(&self) -> Option<&AudioSegment> {
        match self {
            Self::Audio(s) => Some(s),
            Self::Video(_) => None,
        }
    }

    pub const fn as_video(&self) -> Option<&VideoSegment> {
        match self {
            Self::Video(s) => Some(s),
            Self::Audio(_) => None,
        }
    }
}

impl From<AudioSegment> for MediaSegment {
    fn from(segment: AudioSegment) -> Self {
        Self::Audio(segment)
    }
}

impl From<VideoSegment> for MediaSegment {
    fn from(segment: VideoSegment) -> Self {
        Self::Video(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> AudioSegment {
        let mut seg = AudioSegment::new();
        #[allow(clippy::cast_precision_loss)]
        seg.append_interleaved((0..frames).map(|i| i as f32).collect(), 1);
        seg
    }

    fn render(seg: &AudioSegment) -> Vec<f32> {
        let mut out = Vec::new();
        seg.write_interleaved(1, &mut out);
        out
    }

    #[test]
    fn test_null_chunks_merge() {
        let mut seg = AudioSegment::new();
        seg.append_null_data(10);
        seg.append_null_data(5);
        seg.insert_null_data_at_start(3);
        assert_eq!(seg.duration(), 18);
        assert_eq!(seg.chunks().len(), 1);
    }

    #[test]
    fn test_append_slice_shares_and_pads() {
        let source = ramp(8);
        let mut seg = AudioSegment::new();
        seg.append_slice(&source, 2, 5);
        seg.append_slice(&source, 5, 10);
        assert_eq!(seg.duration(), 8);
        // Contiguous slices of the same buffer collapse into one chunk plus padding.
        assert_eq!(seg.chunks().len(), 2);
        assert_eq!(render(&seg), vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0, 0.0]);
    }

    #[test]
    fn test_forget_keeps_timeline() {
        let mut seg = ramp(6);
        seg.forget_up_to(4);
        assert_eq!(seg.duration(), 6);
        assert_eq!(render(&seg), vec![0.0, 0.0, 0.0, 0.0, 4.0, 5.0]);
    }

    #[test]
    fn test_volume_and_channel_mapping() {
        let mut seg = AudioSegment::new();
        seg.append_interleaved(vec![1.0, 2.0], 1);
        seg.apply_volume(0.5);
        let mut out = Vec::new();
        seg.write_interleaved(2, &mut out);
        assert_eq!(out, vec![0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_resample_nearest() {
        let seg = ramp(4);
        let up = seg.resample(1, 2);
        assert_eq!(up.duration(), 8);
        assert_eq!(render(&up), vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_resample_in_pieces_matches_whole() {
        let whole = ramp(441).resample(44_100, 48_000);

        let mut cursor = ResampleCursor::default();
        let mut pieces = AudioSegment::new();
        let source = ramp(441);
        for start in (0..441).step_by(10) {
            let end = (start + 10).min(441);
            let mut piece = AudioSegment::new();
            piece.append_slice(&source, start, end);
            pieces.append_from(&mut piece.resample_from(44_100, 48_000, &mut cursor));
        }

        assert_eq!(whole.duration(), 480);
        assert_eq!(pieces.duration(), 480);
        assert_eq!(cursor, ResampleCursor { input: 441, output: 480 });
        assert_eq!(render(&pieces), render(&whole));
    }

    #[test]
    fn test_video_frame_lookup_and_black() {
        let image = Arc::new(VideoImage { width: 4, height: 2, data: vec![0; 8] });
        let mut seg = VideoSegment::new();
        seg.append_null_data(5);
        seg.append_frame(image.clone(), 10);
        seg.append_frame(image, 10);
        assert_eq!(seg.chunks().len(), 2);

        let (frame, start) = seg.frame_at(12).unwrap();
        assert_eq!(start, 5);
        assert_eq!(frame.intrinsic_size(), (4, 2));
        assert!(seg.frame_at(25).is_none());

        seg.replace_with_black();
        assert!(seg.frame_at(12).unwrap().0.force_black());
    }

    #[test]
    fn test_mismatched_types_are_dropped() {
        let mut audio = MediaSegment::from(ramp(4));
        let mut video = MediaSegment::from(VideoSegment::new());
        video.append_null_data(3);
        audio.append_from(&mut video);
        assert_eq!(audio.duration(), 4);
    }
}
