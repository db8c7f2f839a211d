// orchestrator.rs — Ties the pipeline together: capture → request → crop →
// transcript update → speech playback, behind a single busy guard.
//
// Each transition replaces one immutable PipelineSnapshot on a watch
// channel; presentation subscribes read-only and never mutates state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::sync::watch;

use crate::ai::{FocusMode, SceneAnalysis, SceneProvider, VoiceOption, AUTONOMOUS_SCAN_PROMPT};
use crate::audio::{decode_pcm16, RecognitionSession, SpeechSink};
use crate::capture::camera::{encode_frame, CameraController, CameraDevice, Facing};
use crate::capture::crop::generate_thumbnails;
use crate::conversation::Transcript;
use crate::error::PipelineError;
use crate::settings::Settings;

/// Status line published before the first cycle.
pub const STANDBY_STATUS: &str = "STANDING BY. OPTICAL LINK STABLE.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Capturing,
    AwaitingResult,
    Rendering,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "IDLE",
            PipelineState::Capturing => "CAPTURING",
            PipelineState::AwaitingResult => "AWAITING_RESULT",
            PipelineState::Rendering => "RENDERING",
        }
    }
}

/// One immutable view of the pipeline, replaced wholesale on each
/// transition. The ROI batch inside `analysis` is only ever swapped as a
/// unit, never merged.
#[derive(Clone)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub status: String,
    pub analysis: Option<Arc<SceneAnalysis>>,
    pub transcript_len: usize,
    pub facing: Facing,
}

/// The scene analysis pipeline state machine.
///
/// At most one of CAPTURING / AWAITING_RESULT / RENDERING is active at any
/// time; a trigger received while non-IDLE is dropped, not queued. An
/// in-flight analysis request always runs to completion or failure — there
/// is no mid-flight cancellation.
pub struct ScenePipeline {
    provider: Arc<dyn SceneProvider>,
    camera: CameraController,
    sink: Arc<dyn SpeechSink>,
    recognition: Option<RecognitionSession>,
    transcript: Mutex<Transcript>,
    busy: AtomicBool,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
    focus: Mutex<FocusMode>,
    voice: Mutex<VoiceOption>,
    speech_enabled: AtomicBool,
    jpeg_quality: u8,
    crop_fraction: f64,
    thumb_size: u32,
}

impl ScenePipeline {
    pub fn new(
        provider: Arc<dyn SceneProvider>,
        camera: CameraController,
        sink: Arc<dyn SpeechSink>,
        settings: &Settings,
    ) -> Self {
        let initial = PipelineSnapshot {
            state: PipelineState::Idle,
            status: STANDBY_STATUS.into(),
            analysis: None,
            transcript_len: 0,
            facing: camera.facing(),
        };
        let (snapshot_tx, _) = watch::channel(initial);
        log::info!("ScenePipeline ready (provider={})", provider.name());

        Self {
            provider,
            camera,
            sink,
            recognition: None,
            transcript: Mutex::new(Transcript::new(settings.history_cap)),
            busy: AtomicBool::new(false),
            snapshot_tx,
            focus: Mutex::new(settings.focus_mode),
            voice: Mutex::new(settings.voice),
            speech_enabled: AtomicBool::new(settings.speech_enabled),
            jpeg_quality: settings.frame_jpeg_quality,
            crop_fraction: settings.crop_fraction,
            thumb_size: settings.thumb_size,
        }
    }

    /// Build the pipeline with a camera controller wired from `settings`:
    /// initial facing mode and the release-to-reacquire settle delay.
    pub fn from_settings(
        provider: Arc<dyn SceneProvider>,
        device: Box<dyn CameraDevice>,
        sink: Arc<dyn SpeechSink>,
        settings: &Settings,
    ) -> Self {
        let camera = CameraController::with_settle(
            device,
            settings.facing,
            Duration::from_millis(settings.settle_ms),
        );
        Self::new(provider, camera, sink, settings)
    }

    /// Attach a speech recognition session for [`ScenePipeline::listen_and_scan`].
    pub fn with_recognition(mut self, session: RecognitionSession) -> Self {
        self.recognition = Some(session);
        self
    }

    /// Read-only subscription to pipeline snapshots.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> PipelineState {
        self.snapshot_tx.borrow().state
    }

    pub fn transcript_len(&self) -> usize {
        self.transcript.lock().unwrap().len()
    }

    pub fn set_focus_mode(&self, focus: FocusMode) {
        *self.focus.lock().unwrap() = focus;
        log::info!("Focus mode set to {}", focus.as_str());
    }

    pub fn focus_mode(&self) -> FocusMode {
        *self.focus.lock().unwrap()
    }

    pub fn set_voice(&self, voice: VoiceOption) {
        *self.voice.lock().unwrap() = voice;
    }

    pub fn set_speech_enabled(&self, enabled: bool) {
        self.speech_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn recognition(&self) -> Option<&RecognitionSession> {
        self.recognition.as_ref()
    }

    /// One full analysis cycle. `command` is the user's voice/text command;
    /// `None` (or empty) means an autonomous sweep.
    ///
    /// Triggers received while any cycle is active fail with
    /// [`PipelineError::Busy`] and are dropped. Every failure resolves back
    /// to IDLE with a recoverable status; nothing retries automatically.
    pub async fn scan(&self, command: Option<String>) -> Result<(), PipelineError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Scan trigger dropped while a cycle is active");
            return Err(PipelineError::Busy);
        }

        let result = self.run_cycle(command.unwrap_or_default()).await;
        if let Err(ref e) = result {
            log::error!("Analysis cycle failed: {e}");
            self.publish(PipelineState::Idle, e.status_line());
        }
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle(&self, command: String) -> Result<(), PipelineError> {
        self.publish(PipelineState::Capturing, "CAPTURING");
        let frame = self.camera.snapshot().await?;
        let frame_b64 = encode_frame(&frame, self.jpeg_quality)?;

        // The request sees the transcript as it was when the cycle started.
        let history = self.transcript.lock().unwrap().snapshot();
        let focus = *self.focus.lock().unwrap();
        let voice = *self.voice.lock().unwrap();

        self.publish(PipelineState::AwaitingResult, "ANALYZING");
        let outcome = self
            .provider
            .analyze_scene(&frame_b64, &command, &history, focus, voice)
            .await?;

        self.publish(PipelineState::Rendering, "RENDERING");
        let mut analysis = outcome.analysis;
        analysis.roi = generate_thumbnails(&frame, analysis.roi, self.crop_fraction, self.thumb_size);
        // Frame and its derived ROIs are cycle-scoped; nothing outlives this.
        drop(frame);

        {
            let mut transcript = self.transcript.lock().unwrap();
            let user_text = if command.is_empty() {
                AUTONOMOUS_SCAN_PROMPT
            } else {
                command.as_str()
            };
            transcript.append(user_text, &analysis.verbal);
        }

        if self.speech_enabled.load(Ordering::SeqCst) {
            if let Some(audio_b64) = outcome.audio_b64.as_deref() {
                self.play_speech(audio_b64);
            }
        }

        log::info!(
            "Cycle complete: {} roi, ambient {:.0}",
            analysis.roi.len(),
            analysis.ambient_score
        );
        self.publish_analysis(analysis);
        Ok(())
    }

    /// Enter LISTENING (only reachable from IDLE), wait for one finalized
    /// transcript, then feed it into a scan. Returns `Ok(false)` when the
    /// session was stopped without a transcript.
    pub async fn listen_and_scan(&self) -> Result<bool, PipelineError> {
        let session = self.recognition.as_ref().ok_or_else(|| {
            PipelineError::Device("no speech recognizer configured".into())
        })?;
        if self.busy.load(Ordering::SeqCst) {
            return Err(PipelineError::Busy);
        }

        self.publish(PipelineState::Idle, "LISTENING");
        let mut rx = session.start()?;

        match rx.recv().await {
            Some(Ok(text)) => {
                log::info!("Voice command: {text:?}");
                self.scan(Some(text)).await?;
                Ok(true)
            }
            Some(Err(e)) => {
                log::error!("Speech recognition failed: {e}");
                self.publish(PipelineState::Idle, e.status_line());
                Err(e)
            }
            None => {
                self.publish(PipelineState::Idle, "IDLE");
                Ok(false)
            }
        }
    }

    /// Switch camera facing. Rejected while a cycle is active so a
    /// half-switched camera can never feed an in-flight analysis.
    pub async fn toggle_facing(&self) -> Result<Facing, PipelineError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::Busy);
        }

        self.publish(PipelineState::Idle, "SWITCHING LENS");
        let result = self.camera.switch_facing().await;
        match &result {
            Ok(facing) => {
                self.publish(PipelineState::Idle, format!("LINK OK. CAM {}", facing.as_str()))
            }
            Err(e) => self.publish(PipelineState::Idle, e.status_line()),
        }
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    /// Decode and submit the speech payload. Any failure here is logged and
    /// skipped — audio never fails a cycle that already has a valid result.
    fn play_speech(&self, audio_b64: &str) {
        let bytes = match BASE64.decode(audio_b64) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping playback, bad audio base64: {e}");
                return;
            }
        };
        match decode_pcm16(&bytes) {
            Ok(buffer) => {
                log::debug!("Submitting {:?} of speech", buffer.duration());
                if let Err(e) = self.sink.play(buffer) {
                    log::warn!("Skipping playback: {e}");
                }
            }
            Err(e) => log::warn!("Skipping playback: {e}"),
        }
    }

    fn publish(&self, state: PipelineState, status: impl Into<String>) {
        let snap = PipelineSnapshot {
            state,
            status: status.into(),
            analysis: self.snapshot_tx.borrow().analysis.clone(),
            transcript_len: self.transcript.lock().unwrap().len(),
            facing: self.camera.facing(),
        };
        self.snapshot_tx.send_replace(snap);
    }

    fn publish_analysis(&self, analysis: SceneAnalysis) {
        let snap = PipelineSnapshot {
            state: PipelineState::Idle,
            status: "IDLE".into(),
            analysis: Some(Arc::new(analysis)),
            transcript_len: self.transcript.lock().unwrap().len(),
            facing: self.camera.facing(),
        };
        self.snapshot_tx.send_replace(snap);
    }
}
