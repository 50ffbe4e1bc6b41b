// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Identifiers and small value types shared by every part of the graph.
//!
//! - [`StreamId`] / [`PortId`]: opaque handles into the scheduler's stream and port tables
//! - [`TrackId`]: per-stream track identifier chosen by the producer
//! - [`PortFlags`]: blocking propagation rules attached to an input port
//! - [`TrackChanges`]: what happened to a track in a queued-changes notification
//! - [`MediaType`]: audio or video

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a track inside one stream. Producers choose their own ids;
/// processed streams allocate fresh ones when an input id is already taken.
pub type TrackId = u32;

/// Opaque identifier of a stream. Allocated on the control thread, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(u64);

impl StreamId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Opaque identifier of an input port connecting two streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u64);

impl PortId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Blocking propagation flags of an input port.
///
/// `block_input`: when the destination blocks, the source is blocked too.
/// `block_output`: when the source blocks, the destination is blocked too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortFlags {
    pub block_input: bool,
    pub block_output: bool,
}

impl PortFlags {
    pub const NONE: Self = Self { block_input: false, block_output: false };
    pub const BLOCK_INPUT: Self = Self { block_input: true, block_output: false };
    pub const BLOCK_OUTPUT: Self = Self { block_input: false, block_output: true };
    pub const BLOCK_BOTH: Self = Self { block_input: true, block_output: true };

    /// Whether the port takes part in blocking at all.
    pub const fn propagates_blocking(self) -> bool {
        self.block_input || self.block_output
    }
}

/// Track events carried by a queued-track-changes notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackChanges {
    pub created: bool,
    pub ended: bool,
}

impl TrackChanges {
    pub const NONE: Self = Self { created: false, ended: false };
    pub const CREATED: Self = Self { created: true, ended: false };
    pub const ENDED: Self = Self { created: false, ended: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Audio,
    Video,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(StreamId::new(12).to_string(), "stream#12");
        assert_eq!(PortId::new(4).to_string(), "port#4");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&StreamId::new(9)).unwrap();
        assert_eq!(json, "9");
        let id: PortId = serde_json::from_str("11").unwrap();
        assert_eq!(id, PortId::new(11));
    }

    #[test]
    fn test_port_flags() {
        assert!(!PortFlags::NONE.propagates_blocking());
        assert!(PortFlags::BLOCK_INPUT.propagates_blocking());
        assert!(PortFlags::BLOCK_BOTH.block_output);
        assert_eq!(PortFlags::default(), PortFlags::NONE);
    }
}
