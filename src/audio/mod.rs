pub mod file;
pub mod pitch;
pub mod playback;

use crate::audio::pitch::{PitchSettings, PitchTrack, pyin};
use tracing::debug;

/// Stereo audio held as separate left and right channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Audio {
    sample_rate: u32,
    length: usize,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Audio {
    pub fn new(sample_rate: u32, left: Vec<f32>, right: Vec<f32>) -> Self {
        assert_eq!(
            left.len(),
            right.len(),
            "Left and right channel lengths must match"
        );
        let length = left.len();
        Self {
            sample_rate,
            length,
            left,
            right,
        }
    }

    /// Sine tone of the given frequency and duration, identical on both channels.
    pub fn tone(frequency: f64, seconds: f64, sample_rate: u32, amplitude: f32) -> Self {
        let n_samples = (f64::from(sample_rate) * seconds.max(0.0)).round() as usize;
        let step = 2.0 * std::f64::consts::PI * frequency / f64::from(sample_rate);
        let samples: Vec<f32> = (0..n_samples)
            .map(|n| amplitude * (step * n as f64).sin() as f32)
            .collect();
        Self::new(sample_rate, samples.clone(), samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length as f64 / f64::from(self.sample_rate)
    }

    /// Average of left and right.
    pub fn mono(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .map(|(l, r)| 0.5 * (l + r))
            .collect()
    }

    /// Returns interleaved stereo samples as a Vec<f32>
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.length * 2];
        interleave_stereo(&self.left, &self.right, &mut out);
        out
    }

    /// Linear-interpolation resample, used to match the output device rate.
    pub fn resampled(&self, target_rate: u32) -> Audio {
        if target_rate == self.sample_rate || self.sample_rate == 0 || self.is_empty() {
            return Audio::new(target_rate, self.left.clone(), self.right.clone());
        }
        let ratio = f64::from(self.sample_rate) / f64::from(target_rate);
        let out_len = ((self.length as f64) / ratio).round() as usize;
        debug!(
            from = self.sample_rate,
            to = target_rate,
            in_len = self.length,
            out_len,
            "Resampling audio"
        );
        let left = resample_channel(&self.left, ratio, out_len);
        let right = resample_channel(&self.right, ratio, out_len);
        Audio::new(target_rate, left, right)
    }

    /// Runs pitch tracking on both channels in parallel and keeps, per frame, whichever
    /// channel is more confidently voiced. Identical channels are only analysed once.
    pub fn track_pitch(&self, settings: &PitchSettings) -> PitchTrack {
        if self.left == self.right {
            debug!("Channels are identical, running a single pitch track");
            return pyin(&self.left, self.sample_rate, settings);
        }
        let (left_track, right_track) = rayon::join(
            || pyin(&self.left, self.sample_rate, settings),
            || pyin(&self.right, self.sample_rate, settings),
        );
        debug!(
            left_len = left_track.len(),
            right_len = right_track.len(),
            "Completed pitch tracking for both channels"
        );
        PitchTrack::combine(&left_track, &right_track)
    }
}

fn resample_channel(channel: &[f32], ratio: f64, out_len: usize) -> Vec<f32> {
    let last = channel.len().saturating_sub(1);
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64).clamp(0.0, 1.0) as f32;
            channel[idx] + (channel[next] - channel[idx]) * frac
        })
        .collect()
}

/// Helper function to interleave two stereo channels into a single output buffer.
/// Assumes `out` has enough space to hold interleaved samples.
pub(crate) fn interleave_stereo(left: &[f32], right: &[f32], out: &mut [f32]) {
    for (i, frame) in out.chunks_exact_mut(2).enumerate() {
        frame[0] = left.get(i).copied().unwrap_or(0.0);
        frame[1] = right.get(i).copied().unwrap_or(0.0);
    }
}
