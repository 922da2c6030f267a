use crate::audio::{Audio, interleave_stereo};
use anyhow::{Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Amplitude of synthesized reference tones.
pub const TONE_AMPLITUDE: f32 = 0.5;

/// Something that can make noise. Calls block until playback has finished.
pub trait Playback {
    fn play_audio(&mut self, audio: &Audio) -> Result<()>;
    fn play_tone(&mut self, frequency: f64, duration: Duration) -> Result<()>;
}

/// Plays nothing. Used when audio is disabled or no device is available.
#[derive(Debug, Default)]
pub struct Silent;

impl Playback for Silent {
    fn play_audio(&mut self, audio: &Audio) -> Result<()> {
        info!(
            seconds = audio.duration_secs(),
            "Audio output disabled, skipping playback"
        );
        Ok(())
    }

    fn play_tone(&mut self, frequency: f64, duration: Duration) -> Result<()> {
        info!(
            frequency,
            seconds = duration.as_secs_f64(),
            "Audio output disabled, skipping tone"
        );
        Ok(())
    }
}

/// Read cursor shared with the CPAL callback.
struct Cursor {
    audio: Audio,
    position: usize,
    finished: bool,
}

/// Plays through the default CPAL output device.
pub struct DevicePlayer {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl DevicePlayer {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        debug!(audio_host = ?host.id(), "Using audio host");
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let supported_config = device.default_output_config()?;
        debug!("Default output config: {:?}", supported_config);
        let sample_format = supported_config.sample_format();
        if sample_format != cpal::SampleFormat::F32 {
            bail!("Unsupported sample format: {sample_format:?}");
        }
        let config = supported_config.config();
        if config.channels == 0 {
            bail!("Output device reports no channels");
        }
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Fills one CPAL output buffer from the cursor, writing silence once the audio runs out.
    fn fill_output_buffer(cursor: &Arc<Mutex<Cursor>>, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        // Panicking out of a callback is bad, so handle mutex poisoning gracefully
        let mut cursor = match cursor.lock() {
            Ok(g) => g,
            Err(e) => {
                error!("playback cursor mutex poisoned: {e}");
                return;
            }
        };

        let start = cursor.position;
        let frames_out = output.len() / channels;
        let remaining = cursor.audio.length().saturating_sub(start);
        let frames_to_write = frames_out.min(remaining);
        if frames_to_write == 0 {
            cursor.finished = true;
            return;
        }

        let end = start + frames_to_write;
        let left = &cursor.audio.left()[start..end];
        let right = &cursor.audio.right()[start..end];
        match channels {
            1 => {
                for (out, (l, r)) in output.iter_mut().zip(left.iter().zip(right)) {
                    *out = 0.5 * (l + r);
                }
            }
            2 => interleave_stereo(left, right, &mut output[..frames_to_write * 2]),
            _ => {
                let frames = output.chunks_exact_mut(channels).take(frames_to_write);
                for (i, frame) in frames.enumerate() {
                    frame[0] = left[i];
                    frame[1] = right[i];
                }
            }
        }
        cursor.position = end;
    }
}

impl Playback for DevicePlayer {
    fn play_audio(&mut self, audio: &Audio) -> Result<()> {
        let audio = audio.resampled(self.sample_rate());
        let seconds = audio.duration_secs();
        let channels = self.config.channels as usize;
        let cursor = Arc::new(Mutex::new(Cursor {
            audio,
            position: 0,
            finished: false,
        }));

        let cursor_for_callback = Arc::clone(&cursor);
        let stream = self.device.build_output_stream(
            &self.config,
            move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                Self::fill_output_buffer(&cursor_for_callback, output, channels);
            },
            move |err| {
                error!("CPAL stream error: {err}");
            },
            None,
        )?;
        stream.play()?;
        debug!(seconds, channels, "Playback started");

        // A device that stops calling back must not hang the caller forever.
        let deadline = Instant::now() + Duration::from_secs_f64(seconds) + Duration::from_secs(2);
        loop {
            let finished = cursor
                .lock()
                .map_err(|e| anyhow!("playback cursor mutex poisoned: {e}"))?
                .finished;
            if finished {
                break;
            }
            if Instant::now() > deadline {
                bail!("Playback did not finish within {:.1}s", seconds + 2.0);
            }
            thread::sleep(Duration::from_millis(10));
        }
        debug!("Playback finished");
        Ok(())
    }

    fn play_tone(&mut self, frequency: f64, duration: Duration) -> Result<()> {
        let tone = Audio::tone(
            frequency,
            duration.as_secs_f64(),
            self.sample_rate(),
            TONE_AMPLITUDE,
        );
        self.play_audio(&tone)
    }
}
