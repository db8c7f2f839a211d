use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::{
    decode_analysis, FocusMode, SceneOutcome, SceneProvider, VoiceOption, AUTONOMOUS_SCAN_PROMPT,
};
use crate::conversation::ConversationTurn;
use crate::error::PipelineError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Scene analysis client for the Gemini `generateContent` REST surface.
///
/// Two independent calls per cycle: the primary vision/analysis request
/// (JSON response mode, thinking disabled) and an optional speech-synthesis
/// request for the verbal report. The second is best-effort.
pub struct GeminiSceneClient {
    api_base: String,
    api_key: String,
    analysis_model: String,
    tts_model: String,
    client: Client,
}

impl GeminiSceneClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            client: Client::new(),
        }
    }

    /// Override the API base, e.g. for a regional endpoint or a proxy.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, PipelineError> {
        Url::parse(base).map_err(|e| PipelineError::Service(format!("bad API base URL: {e}")))?;
        self.api_base = base.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_models(
        mut self,
        analysis_model: impl Into<String>,
        tts_model: impl Into<String>,
    ) -> Self {
        self.analysis_model = analysis_model.into();
        self.tts_model = tts_model.into();
        self
    }

    fn model_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        )
    }

    fn build_analysis_body(
        &self,
        frame_b64: &str,
        prompt: &str,
        history: &[ConversationTurn],
        focus: FocusMode,
    ) -> Value {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": wire_role(turn),
                    "parts": [{ "text": turn.text }]
                })
            })
            .collect();

        let user_text = if prompt.is_empty() {
            AUTONOMOUS_SCAN_PROMPT
        } else {
            prompt
        };
        contents.push(json!({
            "role": "user",
            "parts": [
                { "text": user_text },
                { "inlineData": { "mimeType": "image/jpeg", "data": frame_b64 } }
            ]
        }));

        json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{ "text": system_instruction(focus, !prompt.is_empty()) }]
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "thinkingConfig": { "thinkingBudget": 0 }
            }
        })
    }

    fn build_tts_body(verbal: &str, voice: VoiceOption) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": verbal }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.voice_name() }
                    }
                }
            }
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, PipelineError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());
            return Err(PipelineError::Service(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::Schema(format!("malformed response body: {e}")))
    }
}

fn wire_role(turn: &ConversationTurn) -> &'static str {
    match turn.role {
        crate::conversation::Role::User => "user",
        crate::conversation::Role::Model => "model",
    }
}

/// Fixed persona and output-contract instruction, parameterized by focus mode
/// and whether this cycle was commanded or autonomous.
fn system_instruction(focus: FocusMode, commanded: bool) -> String {
    format!(
        "SYSTEM: You are PRISM, an advanced 'Environmental Intelligence' tactical interface.
PERSONALITY: Elite, cinematic, and data-driven. Your analysis is sharp and decisive.
FOCUS: {focus_instruction}
MODE: {mode}

CRITICAL INSTRUCTIONS:
1. NO GENERIC LABELS: Do not use labels like \"Primary Subject\", \"Neutral Backdrop\", or \"Object\". You MUST identify the specific noun (e.g., \"Herman Miller Chair\", \"Dell 4K Monitor\", \"Ceramic Coffee Mug\").
2. TACTICAL RECOMMENDATIONS: Every recommendation must be a specific ACTION the user should take based on the {focus_name} mode.
3. LOGIC TRACE: Provide a technical 2-part rationale for how you identified the object.

OUTPUT PROTOCOL:
Return a JSON object with:
- \"verbal\": A cinematic tactical report (max 15 words).
- \"summaryRationale\": A brief tactical overview.
- \"ambientScore\": 0-100 environmental efficiency.
- \"moodDescriptor\": One sophisticated word for the atmosphere.
- \"roi\": An array of exactly 3 tactical points.

Each ROI must include:
- \"label\": Specific name of the item.
- \"x\", \"y\": Normalized coordinates (0-100).
- \"description\": Tactical summary.
- \"safetyRating\": SECURE, ADVISORY, or ATTENTION.
- \"category\": ELECTRONIC, ORGANIC, STRUCTURAL, TOOL, or UNKNOWN.
- \"confidence\": percentage.
- \"rationale\": 2 specific logic points.
- \"whyItMatters\": Contextual significance.
- \"recommendation\": A specific ACTIONABLE instruction.",
        focus_instruction = focus.instruction(),
        focus_name = focus.as_str(),
        mode = if commanded { "COMMANDED" } else { "AUTONOMOUS" },
    )
}

/// Concatenate all text parts of the first candidate.
fn extract_text(resp: &Value) -> Result<String, PipelineError> {
    let parts = resp
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| PipelineError::Schema("response has no content parts".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(PipelineError::Schema("response carried no text".into()));
    }
    Ok(text)
}

/// Pull the inline base64 audio out of a speech response, if present.
fn extract_inline_audio(resp: &Value) -> Option<String> {
    resp.pointer("/candidates/0/content/parts/0/inlineData/data")
        .and_then(|d| d.as_str())
        .map(str::to_string)
}

#[async_trait]
impl SceneProvider for GeminiSceneClient {
    async fn analyze_scene(
        &self,
        frame_b64: &str,
        prompt: &str,
        history: &[ConversationTurn],
        focus: FocusMode,
        voice: VoiceOption,
    ) -> Result<SceneOutcome, PipelineError> {
        let body = self.build_analysis_body(frame_b64, prompt, history, focus);
        let resp = self.post(&self.model_url(&self.analysis_model), &body).await?;
        let analysis = decode_analysis(&extract_text(&resp)?)?;

        // Best-effort speech synthesis; a failure here is non-fatal.
        let tts_body = Self::build_tts_body(&analysis.verbal, voice);
        let audio_b64 = match self.post(&self.model_url(&self.tts_model), &tts_body).await {
            Ok(tts_resp) => {
                let audio = extract_inline_audio(&tts_resp);
                if audio.is_none() {
                    log::warn!("TTS response carried no inline audio, bypassing speech");
                }
                audio
            }
            Err(e) => {
                log::warn!("TTS bypass active: {e}");
                None
            }
        };

        Ok(SceneOutcome { analysis, audio_b64 })
    }

    fn name(&self) -> &str {
        "gemini-scene-analysis"
    }
}
