// Audio: synthesis playback and single-shot speech recognition.

pub mod playback;
pub mod recognition;

pub use playback::{decode_pcm16, CpalSpeechSink, SampleBuffer, SpeechSink, TTS_SAMPLE_RATE};
pub use recognition::{RecognitionSession, RecognitionState, SpeechRecognizer, TranscriptRx};
