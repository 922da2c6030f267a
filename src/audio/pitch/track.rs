use crate::audio::pitch::PitchSettings;
use tracing::debug;

/// Per-frame pitch estimates. All three vectors have one entry per analysis frame;
/// unvoiced frames carry an f0 of 0.0.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTrack {
    f0: Vec<f32>,
    voiced_flag: Vec<bool>,
    voiced_prob: Vec<f32>,
    sample_rate: u32,
    frame_length: usize,
    hop_length: usize,
}

impl PitchTrack {
    fn empty(sample_rate: u32, frame_length: usize, hop_length: usize) -> Self {
        Self {
            f0: Vec::new(),
            voiced_flag: Vec::new(),
            voiced_prob: Vec::new(),
            sample_rate,
            frame_length,
            hop_length,
        }
    }

    pub fn f0(&self) -> &[f32] {
        &self.f0
    }

    pub fn voiced_flag(&self) -> &[bool] {
        &self.voiced_flag
    }

    pub fn voiced_prob(&self) -> &[f32] {
        &self.voiced_prob
    }

    pub fn len(&self) -> usize {
        self.f0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f0.is_empty()
    }

    /// Time in seconds of the centre of frame `index`.
    pub fn frame_time(&self, index: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (index * self.hop_length + self.frame_length / 2) as f64 / f64::from(self.sample_rate)
    }

    /// `(time_seconds, f0)` for every frame, voiced or not.
    pub fn frames(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.f0
            .iter()
            .enumerate()
            .map(|(i, &f0)| (self.frame_time(i), f0))
    }

    pub fn voiced_frequencies(&self) -> Vec<f32> {
        self.f0
            .iter()
            .zip(&self.voiced_flag)
            .filter(|&(&f0, &voiced)| voiced && f0 > 0.0)
            .map(|(&f0, _)| f0)
            .collect()
    }

    /// Median of the voiced frames, or `None` when nothing was voiced.
    pub fn median_f0(&self) -> Option<f64> {
        let mut voiced = self.voiced_frequencies();
        if voiced.is_empty() {
            return None;
        }
        voiced.sort_by(|a, b| a.total_cmp(b));
        let mid = voiced.len() / 2;
        let median = if voiced.len() % 2 == 0 {
            0.5 * (f64::from(voiced[mid - 1]) + f64::from(voiced[mid]))
        } else {
            f64::from(voiced[mid])
        };
        Some(median)
    }

    /// Merges two channel tracks, keeping per frame the one with the higher voicing probability.
    pub fn combine(left: &PitchTrack, right: &PitchTrack) -> PitchTrack {
        let length = left.len().max(right.len());
        let mut f0 = vec![0.0; length];
        let mut voiced_flag = vec![false; length];
        let mut voiced_prob = vec![0.0; length];
        for i in 0..length {
            let left_prob = left.voiced_prob.get(i).copied().unwrap_or(0.0);
            let right_prob = right.voiced_prob.get(i).copied().unwrap_or(0.0);
            let source = if left_prob >= right_prob { left } else { right };
            f0[i] = source.f0.get(i).copied().unwrap_or(0.0);
            voiced_flag[i] = source.voiced_flag.get(i).copied().unwrap_or(false);
            voiced_prob[i] = source.voiced_prob.get(i).copied().unwrap_or(0.0);
        }
        PitchTrack {
            f0,
            voiced_flag,
            voiced_prob,
            sample_rate: left.sample_rate,
            frame_length: left.frame_length,
            hop_length: left.hop_length,
        }
    }
}

/// Simple RMS energy of a frame, used for voicing / silence detection.
fn frame_rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = frame.iter().map(|x| x * x).sum();
    (sum_sq / frame.len() as f32).sqrt()
}

fn difference_function(frame: &[f32], max_lag: usize) -> Vec<f32> {
    let n = frame.len();
    let mut d = vec![0.0; max_lag];

    for (tau, slot) in d.iter_mut().enumerate().skip(1) {
        *slot = frame[..n - tau]
            .iter()
            .zip(&frame[tau..])
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
    }
    d
}

fn cumulative_mean_normalized_difference(d: &[f32]) -> Vec<f32> {
    let mut cmnd = vec![0.0; d.len()];
    let mut running_sum = 0.0;

    for tau in 1..d.len() {
        running_sum += d[tau];
        cmnd[tau] = if running_sum > 0.0 {
            d[tau] * (tau as f32) / running_sum
        } else {
            0.0
        };
    }

    cmnd
}

fn parabolic_interp(cmnd: &[f32], tau: usize) -> f32 {
    let x0 = cmnd[tau - 1];
    let x1 = cmnd[tau];
    let x2 = cmnd[tau + 1];
    let denom = 2.0 * (2.0 * x1 - x2 - x0);
    if denom.abs() < 1e-9 {
        tau as f32
    } else {
        tau as f32 + (x2 - x0) / denom
    }
}

/// First dip of the CMND below `threshold`, refined to sub-sample lag.
/// Returns `(f0, probability)` pairs; empty when no dip exists.
fn find_pitch_candidates(
    cmnd: &[f32],
    threshold: f32,
    min_lag: usize,
    max_lag: usize,
    sample_rate: u32,
) -> Vec<(f32, f32)> {
    let first = min_lag.max(1) + 1;
    let last = max_lag.min(cmnd.len()).saturating_sub(1);
    (first..last)
        .find(|&tau| {
            let v = cmnd[tau];
            v < threshold && v < cmnd[tau - 1] && v <= cmnd[tau + 1]
        })
        .map(|tau| {
            let refined_tau = parabolic_interp(cmnd, tau);
            let f0 = sample_rate as f32 / refined_tau;
            let p = (1.0 - cmnd[tau]).clamp(0.0, 1.0);
            vec![(f0, p)]
        })
        .unwrap_or_default()
}

/// Picks the candidate with the best probability weighted by continuity with the
/// previous frame. Returns `(f0, voiced, score)`.
fn probabilistic_f0_selection(
    candidates: &[(f32, f32)],
    sigma: f32,
    previous_f0: Option<f32>,
) -> (f32, bool, f32) {
    let mut best: Option<(f32, f32)> = None;
    let sigma2 = sigma * sigma;

    for &(candidate, prob) in candidates {
        let continuity = match previous_f0 {
            Some(pf0) if pf0 > 0.0 && candidate > 0.0 => {
                let ratio = candidate / pf0;
                // Octave jumps and subharmonics are never continuous
                if !(0.7..=1.5).contains(&ratio) {
                    continue;
                }
                let octave_distance = ratio.log2();
                (-0.5 * (octave_distance * octave_distance) / sigma2).exp()
            }
            _ => 1.0,
        };
        let score = prob * continuity;
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    match best {
        Some((f0, score)) => (f0, score > 0.5, score),
        None => (0.0, false, 0.0),
    }
}

/// YIN-style pitch tracking with probabilistic, continuity-weighted candidate selection.
///
/// The frame is widened when the lowest searched frequency needs a longer lag than the
/// configured frame length allows.
pub fn pyin(signal: &[f32], sample_rate: u32, settings: &PitchSettings) -> PitchTrack {
    let hop_length = settings.hop_length.max(1);
    let fmin = settings.fmin;
    let fmax = settings.fmax;
    if sample_rate == 0 || !(fmin > 0.0 && fmax > fmin) {
        return PitchTrack::empty(sample_rate, settings.frame_length, hop_length);
    }
    let min_lag = (sample_rate as f32 / fmax).floor() as usize;
    let max_lag = (sample_rate as f32 / fmin).ceil() as usize;
    let frame_length = settings.frame_length.max((2 * max_lag).next_power_of_two());
    let threshold = settings.threshold;
    let sigma = settings.sigma;
    debug!(
        sample_rate,
        frame_length, hop_length, fmin, fmax, min_lag, max_lag, threshold, sigma, "PYIN parameters"
    );

    if signal.len() < frame_length || max_lag <= min_lag + 2 {
        return PitchTrack::empty(sample_rate, frame_length, hop_length);
    }

    let n_frames = (signal.len() - frame_length) / hop_length + 1;

    let mut f0 = vec![0.0; n_frames];
    let mut voiced_flag = vec![false; n_frames];
    let mut voiced_prob = vec![0.0; n_frames];
    let mut previous_f0: Option<f32> = None;

    // Simple global RMS to derive a silence threshold.
    let global_rms = frame_rms(signal);
    let silence_rms_threshold = global_rms * 0.02 + 1e-6;
    for i in 0..n_frames {
        let start = i * hop_length;
        let frame = &signal[start..start + frame_length];

        if frame_rms(frame) < silence_rms_threshold {
            previous_f0 = None;
            continue;
        }

        let d = difference_function(frame, max_lag);
        let cmnd = cumulative_mean_normalized_difference(&d);
        let candidates = find_pitch_candidates(&cmnd, threshold, min_lag, max_lag, sample_rate);
        let (best_f0, is_voiced, best_prob) =
            probabilistic_f0_selection(&candidates, sigma, previous_f0);

        // Reject obviously out-of-range estimates as unvoiced.
        if !is_voiced || best_f0 <= 0.0 || best_f0 < fmin * 0.8 || best_f0 > fmax * 1.2 {
            previous_f0 = None;
            continue;
        }
        previous_f0 = Some(best_f0);
        f0[i] = best_f0;
        voiced_flag[i] = true;
        voiced_prob[i] = best_prob;
    }

    debug!(
        n_frames,
        voiced = voiced_flag.iter().filter(|&&v| v).count(),
        "PYIN complete"
    );
    PitchTrack {
        f0,
        voiced_flag,
        voiced_prob,
        sample_rate,
        frame_length,
        hop_length,
    }
}
