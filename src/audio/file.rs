use crate::audio::Audio;
use anyhow::{Context, Result, anyhow};
use cpal::Sample;
use hound::{WavSpec, WavWriter};
use rodio::{Decoder, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Audio file with interleaved samples:
/// layout = [ch0_f0, ch1_f0, ..., ch{n-1}_f0, ch0_f1, ch1_f1, ...]
#[derive(Debug, Clone)]
pub struct AudioFileData {
    samples: Vec<f32>,
    n_samples: usize,
    sample_rate: u32,
    n_channels: usize,
}

impl AudioFileData {
    /// Uses rodio::Decoder, which yields interleaved samples for multichannel audio.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("decoding {}", path.display()))?;

        let sample_rate = source.sample_rate();
        let n_channels = source.channels() as usize;
        let samples: Vec<f32> = source.map(Sample::to_sample::<f32>).collect();

        let data = Self::new(samples, sample_rate, n_channels as u16)
            .with_context(|| format!("reading {}", path.display()))?;
        debug!(
            path = %path.display(),
            sample_rate,
            n_channels,
            n_samples = data.n_samples,
            "Loaded audio file"
        );
        Ok(data)
    }

    /// Construct from already-interleaved samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(anyhow!("channels must be > 0"));
        }
        if sample_rate == 0 {
            return Err(anyhow!("sample rate must be > 0"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(anyhow!(
                "samples length {} is not divisible by channels {}",
                samples.len(),
                channels
            ));
        }

        let n_channels = channels as usize;
        let n_samples = samples.len() / n_channels;

        Ok(AudioFileData {
            samples,
            sample_rate,
            n_channels,
            n_samples,
        })
    }

    /// Stereo file holding the given audio.
    pub fn from_audio(audio: &Audio) -> Self {
        AudioFileData {
            samples: audio.interleaved(),
            sample_rate: audio.sample_rate(),
            n_channels: 2,
            n_samples: audio.length(),
        }
    }

    /// Save audio data to a WAV file (16-bit PCM, interleaved channels).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let is_wav = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(anyhow!("Unsupported file format; only .wav is supported."));
        }

        let spec = WavSpec {
            channels: self.n_channels as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)
            .with_context(|| format!("creating {}", path.display()))?;
        for &sample in &self.samples {
            // Clamp to [-1.0, 1.0] before scaling to i16
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Splits into left/right. Mono is duplicated; channels past the second are dropped.
    pub fn to_audio(&self) -> Audio {
        if self.n_channels == 1 {
            return Audio::new(self.sample_rate, self.samples.clone(), self.samples.clone());
        }
        let (left, right) = self
            .samples
            .chunks_exact(self.n_channels)
            .map(|frame| (frame[0], frame[1]))
            .unzip();
        Audio::new(self.sample_rate, left, right)
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}
