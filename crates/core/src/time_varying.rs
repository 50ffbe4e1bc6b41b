// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A value that changes at known points in time.
//!
//! [`TimeVarying`] holds the value at the "current time" plus an ordered list
//! of future changes. The scheduler uses it for per-stream blocking state,
//! explicit blocker counts and graph-update indices.

use crate::time::MediaTime;

#[derive(Debug, Clone, PartialEq)]
struct Change<T> {
    time: MediaTime,
    value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeVarying<T> {
    current: T,
    /// Strictly increasing in time; adjacent values always differ.
    changes: Vec<Change<T>>,
}

impl<T: Clone + PartialEq> TimeVarying<T> {
    pub const fn new(initial: T) -> Self {
        Self { current: initial, changes: Vec::new() }
    }

    /// Sets the value for every time at or after `time`, discarding any
    /// changes scheduled at or after it.
    pub fn set_at_and_after(&mut self, time: MediaTime, value: T) {
        while let Some(last) = self.changes.last_mut() {
            if time > last.time {
                if last.value != value {
                    self.changes.push(Change { time, value });
                }
                return;
            }
            if time == last.time {
                let len = self.changes.len();
                let previous = if len > 1 { &self.changes[len - 2].value } else { &self.current };
                if *previous == value {
                    self.changes.pop();
                } else if let Some(last) = self.changes.last_mut() {
                    last.value = value;
                }
                return;
            }
            self.changes.pop();
        }
        if self.current != value {
            self.changes.push(Change { time, value });
        }
    }

    /// Index of the last change at or before `time`.
    fn last_change_at_or_before(&self, time: MediaTime) -> Option<usize> {
        self.changes.iter().rposition(|c| c.time <= time)
    }

    pub fn get_at(&self, time: MediaTime) -> &T {
        self.last_change_at_or_before(time)
            .map_or(&self.current, |i| &self.changes[i].value)
    }

    /// Returns the value at `time` and the time of the next change after it
    /// (`MediaTime::MAX` when the value never changes again).
    pub fn get_at_with_end(&self, time: MediaTime) -> (&T, MediaTime) {
        let index = self.last_change_at_or_before(time);
        let next = index.map_or(0, |i| i + 1);
        let end = self.changes.get(next).map_or(MediaTime::MAX, |c| c.time);
        let value = index.map_or(&self.current, |i| &self.changes[i].value);
        (value, end)
    }

    /// Returns the value just before `time`.
    pub fn get_before(&self, time: MediaTime) -> &T {
        self.changes
            .iter()
            .rposition(|c| c.time < time)
            .map_or(&self.current, |i| &self.changes[i].value)
    }

    /// Value after the last scheduled change, and the time of that change.
    pub fn get_last(&self) -> (&T, Option<MediaTime>) {
        self.changes
            .last()
            .map_or((&self.current, None), |c| (&c.value, Some(c.time)))
    }

    /// Applies every change at or before `time` to the current value.
    pub fn advance_current_time(&mut self, time: MediaTime) {
        let applied = self.changes.iter().take_while(|c| c.time <= time).count();
        if applied == 0 {
            return;
        }
        if let Some(change) = self.changes.drain(..applied).last() {
            self.current = change.value;
        }
    }

    /// Shifts every scheduled change later by `delta`.
    pub fn insert_time_at_start(&mut self, delta: MediaTime) {
        for change in &mut self.changes {
            change.time += delta;
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}
