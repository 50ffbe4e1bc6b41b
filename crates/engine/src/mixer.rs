// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;

use mediagraph_core::{MixerCallback, TrackRate};

use crate::constants::AUDIO_OUTPUT_CHANNELS;

/// Sums everything written to audio outputs during one iteration and hands
/// the result to the registered [`MixerCallback`]s.
pub(crate) struct AudioMixer {
    rate: TrackRate,
    frames: usize,
    mixed: Vec<f32>,
}

impl AudioMixer {
    pub(crate) const fn new(rate: TrackRate) -> Self {
        Self { rate, frames: 0, mixed: Vec::new() }
    }

    /// Adds `frames` frames of interleaved output-layout audio.
    pub(crate) fn mix(&mut self, interleaved: &[f32], frames: usize) {
        let channels = usize::from(AUDIO_OUTPUT_CHANNELS);
        let len = frames * channels;
        if self.mixed.len() < len {
            self.mixed.resize(len, 0.0);
        }
        self.frames = self.frames.max(frames);
        for (out, sample) in self.mixed.iter_mut().zip(interleaved.iter().take(len)) {
            *out += sample;
        }
    }

    pub(crate) fn finish_mixing(&mut self, callbacks: &[Arc<dyn MixerCallback>]) {
        if self.frames == 0 {
            return;
        }
        for callback in callbacks {
            callback.mixer_callback(&self.mixed, AUDIO_OUTPUT_CHANNELS, self.frames, self.rate);
        }
        self.frames = 0;
        self.mixed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Vec<f32>, usize)>>);

    impl MixerCallback for Capture {
        fn mixer_callback(&self, mixed: &[f32], channels: u16, frames: usize, rate: TrackRate) {
            assert_eq!(channels, 2);
            assert_eq!(rate, 48_000);
            self.0.lock().push((mixed.to_vec(), frames));
        }
    }

    #[test]
    fn test_mix_sums_and_resets() {
        let capture = Arc::new(Capture::default());
        let callbacks: Vec<Arc<dyn MixerCallback>> = vec![capture.clone()];
        let mut mixer = AudioMixer::new(48_000);

        mixer.mix(&[0.25, 0.25, 0.5, 0.5], 2);
        mixer.mix(&[0.25, 0.25], 1);
        mixer.finish_mixing(&callbacks);
        // Nothing mixed since the last call: no callback.
        mixer.finish_mixing(&callbacks);

        let calls = capture.0.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (vec![0.5, 0.5, 0.5, 0.5], 2));
    }
}
