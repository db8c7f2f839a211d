// PRISM scene analysis pipeline.
//
// Capture a camera frame, run one in-flight vision-language analysis
// request with conversational context, validate the structured result,
// derive pixel crops from normalized ROI coordinates, and drive speech
// playback from raw PCM. Presentation is the host's concern; it observes
// pipeline snapshots over a watch channel and never mutates state.

pub mod ai;
pub mod audio;
pub mod capture;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod settings;

pub use ai::gemini::GeminiSceneClient;
pub use ai::{
    FocusMode, Roi, SceneAnalysis, SceneOutcome, SceneProvider, Severity, VoiceOption,
};
pub use audio::{CpalSpeechSink, RecognitionSession, SpeechRecognizer, SpeechSink};
pub use capture::camera::{CameraController, CameraDevice, CameraHandle, Facing, Frame};
pub use conversation::{ConversationTurn, Role, Transcript};
pub use error::PipelineError;
pub use orchestrator::{PipelineSnapshot, PipelineState, ScenePipeline};
pub use settings::Settings;
