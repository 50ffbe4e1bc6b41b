// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: The media stream graph scheduler.
//!
//! A [`MediaStreamGraph`] owns a set of streams connected by input ports and
//! runs them on a dedicated scheduler thread: source streams are fed by
//! producer threads, processed streams (track unions, mixers, delays) compute
//! their output from their inputs, and played streams are written to audio and
//! video outputs. The owning thread mutates the graph only through batched
//! control messages and observes it through published state updates.
//!
//! ## Module map
//!
//! - [`handle`]: owner-thread API ([`MediaStreamGraph`], stream and port handles)
//! - `driver`: scheduler thread and the monitor shared with the owner
//! - `graph`: one scheduler iteration over the [`GraphEngine`](graph::GraphEngine)
//! - `ordering`, `blocking`: stream order with cycle detection, blocking decisions
//! - `track_union`, `audio_node`: processed stream kinds
//! - `playback`, `mixer`: output dispatch
//! - [`registry`]: the process-wide realtime graph

// --- Public Modules ---

pub mod config;
pub mod constants;
pub mod handle;
pub mod registry;

mod audio_node;
mod blocking;
mod driver;
mod graph;
mod messages;
mod mixer;
mod ordering;
mod playback;
mod port;
mod processed;
mod source;
mod stream;
mod track_union;

// Re-exports
pub use config::GraphConfig;
pub use graph::StreamMemoryUsage;
pub use handle::{InputPortHandle, MediaStreamGraph, ProcessedStreamHandle, SourceStreamHandle, StreamHandle};
pub use processed::{ProcessorSpec, AUDIO_NODE_TRACK};
pub use source::NotEnoughBufferedCallback;
pub use stream::AudioOutputKey;

#[cfg(test)]
mod tests;
