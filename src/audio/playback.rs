// playback.rs — Speech synthesis playback: decode raw PCM from the TTS
// sub-call and drive it through the default audio output device.
//
// The TTS endpoint returns raw 16-bit little-endian mono PCM at 24kHz with
// no container, so the bytes are decoded by hand. Playback runs on a
// dedicated OS thread because cpal streams are !Send on some backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::PipelineError;

/// Sample rate of the raw PCM the TTS endpoint emits.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// Decoded mono audio, samples normalized to [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Interpret bytes as signed 16-bit little-endian mono samples and normalize
/// each to [-1, 1] by dividing by 32768.
pub fn decode_pcm16(bytes: &[u8]) -> Result<SampleBuffer, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::AudioDecode("empty PCM payload".into()));
    }
    if bytes.len() % 2 != 0 {
        return Err(PipelineError::AudioDecode(format!(
            "odd byte count {} for 16-bit samples",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect();

    Ok(SampleBuffer {
        samples,
        sample_rate: TTS_SAMPLE_RATE,
    })
}

/// Audio output sink. The orchestrator submits at most one buffer per
/// analysis cycle, so implementations need no internal queueing.
pub trait SpeechSink: Send + Sync {
    fn play(&self, buffer: SampleBuffer) -> Result<(), PipelineError>;
}

/// Plays through the host's default output device via cpal.
#[derive(Default)]
pub struct CpalSpeechSink;

impl CpalSpeechSink {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechSink for CpalSpeechSink {
    fn play(&self, buffer: SampleBuffer) -> Result<(), PipelineError> {
        std::thread::Builder::new()
            .name("speech-playback".into())
            .spawn(move || {
                if let Err(e) = run_playback(buffer) {
                    log::error!("Speech playback failed: {e}");
                }
            })
            .map_err(|e| PipelineError::Device(format!("spawn playback thread: {e}")))?;
        Ok(())
    }
}

/// Plays one buffer to completion on the calling (dedicated) thread.
fn run_playback(buffer: SampleBuffer) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Default output device and its native format.
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No default output device found")?;

    let supported_config = device.default_output_config()?;
    let device_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels() as usize;
    let sample_format = supported_config.sample_format();

    log::debug!(
        "Playback device: {}Hz, {} ch, {:?}",
        device_rate,
        channels,
        sample_format
    );

    // 2. Resample to the device rate, replicate mono across channels.
    let mono = resample(&buffer.samples, buffer.sample_rate, device_rate);
    let mut interleaved = Vec::with_capacity(mono.len() * channels);
    for &s in &mono {
        for _ in 0..channels {
            interleaved.push(s);
        }
    }

    let total = interleaved.len();
    let samples: Arc<Vec<f32>> = Arc::new(interleaved);
    let position = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();

    let stream_config: cpal::StreamConfig = supported_config.into();

    // 3. Build the output stream in the device's native sample format.
    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let start = position.fetch_add(data.len(), Ordering::SeqCst);
                    for (i, out) in data.iter_mut().enumerate() {
                        *out = samples.get(start + i).copied().unwrap_or(0.0);
                    }
                    if start + data.len() >= total {
                        let _ = done_tx.send(());
                    }
                },
                |err| log::error!("Playback stream error: {err}"),
                None,
            )?
        }
        cpal::SampleFormat::I16 => {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let start = position.fetch_add(data.len(), Ordering::SeqCst);
                    for (i, out) in data.iter_mut().enumerate() {
                        let s = samples.get(start + i).copied().unwrap_or(0.0);
                        *out = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    }
                    if start + data.len() >= total {
                        let _ = done_tx.send(());
                    }
                },
                |err| log::error!("Playback stream error: {err}"),
                None,
            )?
        }
        other => return Err(format!("Unsupported output sample format: {other:?}").into()),
    };

    // 4. Play and wait until the callback has consumed the whole buffer.
    stream.play()?;
    let deadline = Duration::from_secs_f64(
        total as f64 / channels as f64 / device_rate as f64 + 1.0,
    );
    let _ = done_rx.recv_timeout(deadline);

    // Let the tail of the hardware buffer drain before dropping the stream.
    std::thread::sleep(Duration::from_millis(150));
    Ok(())
}

/// Resample audio using linear interpolation. Good enough for speech.
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = ((input.len() as f64) / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < input.len() {
            input[idx] as f64 * (1.0 - frac) + input[idx + 1] as f64 * frac
        } else {
            input.get(idx).copied().unwrap_or(0.0) as f64
        };

        output.push(sample as f32);
    }

    output
}
