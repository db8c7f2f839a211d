use async_trait::async_trait;

pub mod gemini;
pub mod types;
pub use types::*;

use crate::conversation::ConversationTurn;
use crate::error::PipelineError;

/// Default command text for an autonomous sweep (no voice/text command given).
pub const AUTONOMOUS_SCAN_PROMPT: &str = "Initialize full spectrum tactical scan.";

/// Outcome of one analysis request: the validated result of the primary call,
/// plus the raw base64 PCM from the optional speech sub-call. The speech
/// sub-call failing never fails the outcome.
#[derive(Debug)]
pub struct SceneOutcome {
    pub analysis: SceneAnalysis,
    pub audio_b64: Option<String>,
}

/// Trait for vision-language analysis providers.
/// The orchestrator enforces that at most one request is outstanding.
#[async_trait]
pub trait SceneProvider: Send + Sync {
    /// Analyze a captured frame in the context of the conversation so far.
    /// `frame_b64` is base64-encoded JPEG. An empty `prompt` means
    /// "autonomous sweep" and is substituted with [`AUTONOMOUS_SCAN_PROMPT`].
    async fn analyze_scene(
        &self,
        frame_b64: &str,
        prompt: &str,
        history: &[ConversationTurn],
        focus: FocusMode,
        voice: VoiceOption,
    ) -> Result<SceneOutcome, PipelineError>;

    /// Provider name for logging/display.
    fn name(&self) -> &str;
}
